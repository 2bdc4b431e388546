//! The sample matrix and its per-channel metadata.

use std::ops::Range;
use std::str::FromStr;

use log::debug;

use crate::config::PlanterConfig;
use crate::container::Container;
use crate::error::{PlanterError, Result};
use crate::handle::ContainerHandle;
use crate::matrix::{Axis, Matrix};
use crate::records::{Channel, ChannelInfo, ChannelSettings};

/// Which `Info` column `remove_channels` matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelField {
    /// `Info.ChannelName`.
    #[default]
    Channel,
    /// `Info.DatacacheName`.
    Datacache,
}

impl ChannelField {
    pub const ALL: [&'static str; 2] = ["channel", "datacache"];
}

impl FromStr for ChannelField {
    type Err = PlanterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "channel" => Ok(ChannelField::Channel),
            "datacache" => Ok(ChannelField::Datacache),
            _ => Err(PlanterError::InvalidField {
                field: s.to_string(),
                allowed: &Self::ALL,
            }),
        }
    }
}

/// A per-channel label: one value for every channel, one value per
/// channel, or the configured default.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Labels {
    /// The configured default for every channel.
    #[default]
    Default,
    /// One label shared by every channel.
    Same(String),
    /// One label per channel, in channel order.
    PerChannel(Vec<String>),
}

impl From<&str> for Labels {
    fn from(s: &str) -> Self {
        Labels::Same(s.to_string())
    }
}

impl From<String> for Labels {
    fn from(s: String) -> Self {
        Labels::Same(s)
    }
}

impl<S: AsRef<str>> From<&[S]> for Labels {
    fn from(v: &[S]) -> Self {
        Labels::PerChannel(v.iter().map(|s| s.as_ref().to_string()).collect())
    }
}

impl From<Vec<String>> for Labels {
    fn from(v: Vec<String>) -> Self {
        Labels::PerChannel(v)
    }
}

impl Labels {
    fn resolve(&self, n: usize, default: &str, what: &'static str) -> Result<Vec<String>> {
        match self {
            Labels::Default => Ok(vec![default.to_string(); n]),
            Labels::Same(s) => Ok(vec![s.clone(); n]),
            Labels::PerChannel(v) if v.len() == n => Ok(v.clone()),
            Labels::PerChannel(v) => Err(PlanterError::LabelCount {
                what,
                expected: n,
                actual: v.len(),
            }),
        }
    }
}

/// Names and labels for channels being created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSpec {
    /// `None` numbers the channels.
    pub names: Option<Vec<String>>,
    /// Goes to `Info.DatacacheName`.
    pub datacache: Labels,
    /// Goes to `Info.Units`.
    pub units: Labels,
}

impl ChannelSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.names = Some(names.iter().map(|s| s.as_ref().to_string()).collect());
        self
    }

    pub fn datacache(mut self, datacache: impl Into<Labels>) -> Self {
        self.datacache = datacache.into();
        self
    }

    pub fn units(mut self, units: impl Into<Labels>) -> Self {
        self.units = units.into();
        self
    }

    /// Build the metadata rows for `n` channels, numbering unnamed ones
    /// from `first`.
    fn channels(&self, n: usize, first: usize, config: &PlanterConfig) -> Result<Vec<Channel>> {
        let names = match &self.names {
            Some(names) if names.len() != n => {
                return Err(PlanterError::LabelCount {
                    what: "channel names",
                    expected: n,
                    actual: names.len(),
                })
            }
            Some(names) => names.clone(),
            None => (first..first + n).map(|i| i.to_string()).collect(),
        };
        let caches = self.datacache.resolve(n, &config.datacache_name, "datacache names")?;
        let units = self.units.resolve(n, &config.data_units, "units")?;
        Ok(names
            .iter()
            .zip(caches)
            .zip(units)
            .map(|((name, cache), unit)| Channel {
                settings: ChannelSettings::from_template(&config.channel_template, name),
                info: ChannelInfo::new(name, &cache, &unit),
            })
            .collect())
    }
}

/// Editor over `Data`, `ChannelSettings` and `Info`.
pub struct SeriesEditor<'a> {
    handle: &'a mut ContainerHandle,
    config: &'a PlanterConfig,
}

impl<'a> SeriesEditor<'a> {
    pub(crate) fn new(handle: &'a mut ContainerHandle, config: &'a PlanterConfig) -> Self {
        SeriesEditor { handle, config }
    }

    fn container(&self) -> &Container {
        self.handle.container()
    }

    /// Replace `Data` and all channel metadata with `matrix`.
    pub fn create_dataset(&mut self, matrix: Matrix, spec: &ChannelSpec) -> Result<()> {
        self.handle.ensure_writable()?;
        let channels = spec.channels(matrix.rows(), 0, self.config)?;
        let container = self.handle.container_mut()?;
        debug!("creating {:?} dataset with {} channels", matrix.shape(), channels.len());
        container.data = Some(matrix);
        container.channels = Some(channels);
        Ok(())
    }

    /// Append `block` along `axis`. The block must match the current data
    /// along the other axis. New channels get default metadata.
    pub fn add_samples(&mut self, block: Matrix, axis: Axis) -> Result<()> {
        self.handle.ensure_writable()?;
        if self.container().data.is_none() {
            return self.create_dataset(block, &ChannelSpec::default());
        }
        if axis == Axis::Channels {
            return self.add_channels(block, &ChannelSpec::default());
        }
        let container = self.handle.container_mut()?;
        if let Some(data) = container.data.as_mut() {
            data.append(&block, Axis::Samples)?;
            debug!("appended {} samples, data is now {:?}", block.cols(), data.shape());
        }
        Ok(())
    }

    /// Append `block` as new channels, with metadata rows for them only.
    pub fn add_channels(&mut self, block: Matrix, spec: &ChannelSpec) -> Result<()> {
        self.handle.ensure_writable()?;
        let before = self.container().channel_count();
        if self.container().data.is_none() {
            return self.create_dataset(block, spec);
        }
        let new_channels = spec.channels(block.rows(), before, self.config)?;
        let container = self.handle.container_mut()?;
        let (Some(data), Some(channels)) = (container.data.as_mut(), container.channels.as_mut()) else {
            return Ok(());
        };
        data.append(&block, Axis::Channels)?;
        channels.extend(new_channels);
        debug!("added {} channels, data is now {:?}", block.rows(), data.shape());
        Ok(())
    }

    /// Delete the sample columns in `range`, clamped to the data. Returns
    /// how many columns were removed.
    pub fn remove_samples(&mut self, range: Range<usize>) -> Result<usize> {
        self.handle.ensure_writable()?;
        if self.container().data.is_none() {
            return Ok(0);
        }
        let container = self.handle.container_mut()?;
        let removed = container.data.as_mut().map_or(0, |d| d.remove_columns(range.clone()));
        debug!("removed {removed} samples in {range:?}");
        Ok(removed)
    }

    /// Delete every channel whose `field` equals one of `values`. Removing
    /// all channels deletes `Data` and its metadata. Returns how many
    /// channels were removed.
    pub fn remove_channels<I, S>(&mut self, values: I, field: ChannelField) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.handle.ensure_writable()?;
        let Some(channels) = self.container().channels.as_ref() else {
            return Ok(0);
        };
        let values: Vec<S> = values.into_iter().collect();
        let matched: Vec<usize> = channels
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                let key = match field {
                    ChannelField::Channel => &c.info.channel_name,
                    ChannelField::Datacache => &c.info.datacache_name,
                };
                values.iter().any(|v| v.as_ref() == key.as_str())
            })
            .map(|(i, _)| i)
            .collect();
        if matched.is_empty() {
            return Ok(0);
        }
        let total = channels.len();

        let container = self.handle.container_mut()?;
        if matched.len() == total {
            container.data = None;
            container.channels = None;
            debug!("removed all {total} channels");
            return Ok(total);
        }
        if let Some(data) = container.data.as_mut() {
            data.remove_rows(&matched);
        }
        if let Some(channels) = container.channels.as_mut() {
            let mut index = 0;
            channels.retain(|_| {
                let keep = !matched.contains(&index);
                index += 1;
                keep
            });
        }
        debug!("removed {} of {total} channels", matched.len());
        Ok(matched.len())
    }

    /// Delete every channel of datacache `name`.
    pub fn remove_datacache(&mut self, name: &str) -> Result<usize> {
        self.remove_channels([name], ChannelField::Datacache)
    }

    /// Channel names in row order, `None` without `Data`.
    pub fn list_channels(&self) -> Option<Vec<String>> {
        self.channels()
            .map(|channels| channels.iter().map(|c| c.name().to_string()).collect())
    }

    pub fn data(&self) -> Option<&Matrix> {
        self.container().data.as_ref()
    }

    /// `(channels, samples)`.
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.data().map(Matrix::shape)
    }

    pub fn channels(&self) -> Option<&[Channel]> {
        self.container().channels.as_deref()
    }

    pub fn channel_infos(&self) -> Option<Vec<&ChannelInfo>> {
        self.channels().map(|channels| channels.iter().map(|c| &c.info).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_selectors() {
        assert_eq!("datacache".parse::<ChannelField>().unwrap(), ChannelField::Datacache);
        let err = "units".parse::<ChannelField>().unwrap_err();
        assert_eq!(err.to_string(), "field `units` does not exist; use one of: channel, datacache");
    }

    #[test]
    fn generated_metadata_uses_config_defaults() {
        let config = PlanterConfig::default().with_data_units("uV");
        let channels = ChannelSpec::new().channels(2, 3, &config).unwrap();
        assert_eq!(channels[0].name(), "3");
        assert_eq!(channels[1].info, ChannelInfo::new("4", "RAW", "uV"));
        assert_eq!(channels[1].settings.values(), ChannelSettings::default().values());
    }

    #[test]
    fn per_channel_labels_must_match() {
        let config = PlanterConfig::default();
        let spec = ChannelSpec::new().names(&["a", "b"]).datacache(&["RAW", "FILT"][..]);
        let channels = spec.channels(2, 0, &config).unwrap();
        assert_eq!(channels[1].info.datacache_name, "FILT");

        let err = ChannelSpec::new().units(&["mV"][..]).channels(2, 0, &config).unwrap_err();
        assert!(matches!(
            err,
            PlanterError::LabelCount {
                what: "units",
                expected: 2,
                actual: 1
            }
        ));
        assert!(ChannelSpec::new().names(&["a"]).channels(2, 0, &config).is_err());
    }
}
