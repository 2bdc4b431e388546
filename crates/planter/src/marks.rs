//! Annotation marks over the sample axis.

use std::str::FromStr;

use log::debug;

use crate::error::{PlanterError, Result};
use crate::handle::ContainerHandle;
use crate::records::{fit_fixed, Mark};

/// Which string column `remove_marks` matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkField {
    /// `Marks.Group`.
    #[default]
    Group,
    /// `Marks.Channel`.
    Channel,
    /// `Marks.Info`.
    Info,
}

impl MarkField {
    pub const ALL: [&'static str; 3] = ["group", "channel", "info"];

    fn value(self, mark: &Mark) -> &str {
        match self {
            MarkField::Group => &mark.group,
            MarkField::Channel => &mark.channel,
            MarkField::Info => &mark.info,
        }
    }
}

impl FromStr for MarkField {
    type Err = PlanterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "group" => Ok(MarkField::Group),
            "channel" => Ok(MarkField::Channel),
            "info" => Ok(MarkField::Info),
            _ => Err(PlanterError::InvalidField {
                field: s.to_string(),
                allowed: &Self::ALL,
            }),
        }
    }
}

/// Tags attached to a new mark.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkTags {
    pub group: String,
    /// Stored as-is; Signal Plant uses `0.0` and `1.0`.
    pub validity: f32,
    /// Name of the channel the mark refers to, empty for all.
    pub channel: String,
    /// Free text.
    pub info: String,
}

impl MarkTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn validity(mut self, validity: f32) -> Self {
        self.validity = validity;
        self
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }
}

/// Editor over `Marks`.
pub struct MarkEditor<'a> {
    handle: &'a mut ContainerHandle,
}

impl<'a> MarkEditor<'a> {
    pub(crate) fn new(handle: &'a mut ContainerHandle) -> Self {
        MarkEditor { handle }
    }

    /// Append one mark. Nothing happens without a start sample; a missing
    /// end sample equals the start.
    pub fn add_mark(&mut self, start: Option<i32>, end: Option<i32>, tags: &MarkTags) -> Result<()> {
        self.handle.ensure_writable()?;
        let Some(start) = start else {
            return Ok(());
        };
        let end = end.unwrap_or(start);
        if end < start {
            return Err(PlanterError::InvalidMarkRange {
                start: start.into(),
                end: end.into(),
            });
        }
        let mark = Mark {
            sample_left: start,
            sample_right: end,
            group: fit_fixed(&tags.group),
            validity: tags.validity,
            channel: fit_fixed(&tags.channel),
            info: fit_fixed(&tags.info),
        };
        let container = self.handle.container_mut()?;
        container.marks.get_or_insert_with(Vec::new).push(mark);
        debug!("added mark [{start}, {end}]");
        Ok(())
    }

    /// Remove the marks whose `field` equals `value`, or every mark when
    /// `value` is `None`. `Marks` is deleted once no mark survives.
    /// Returns how many marks were removed.
    pub fn remove_marks(&mut self, value: Option<&str>, field: MarkField) -> Result<usize> {
        self.handle.ensure_writable()?;
        let Some(marks) = self.handle.container().marks.as_ref() else {
            return Ok(0);
        };
        let total = marks.len();
        let survivors: Option<Vec<Mark>> = value.map(|value| {
            marks
                .iter()
                .filter(|m| field.value(m) != value)
                .cloned()
                .collect()
        });
        let container = self.handle.container_mut()?;
        container.marks = survivors.filter(|s| !s.is_empty());
        let removed = total - container.marks.as_ref().map_or(0, Vec::len);
        debug!("removed {removed} of {total} marks");
        Ok(removed)
    }

    pub fn list(&self) -> Option<&[Mark]> {
        self.handle.container().marks.as_deref()
    }

    pub fn len(&self) -> usize {
        self.list().map_or(0, <[Mark]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
