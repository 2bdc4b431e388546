//! Fixed-layout records of the `ChannelSettings`, `Info` and `Marks`
//! datasets, and their packed compound encoding.
//!
//! Every string field is a 256-byte, NUL-padded buffer. Longer values are
//! truncated on a UTF-8 character boundary.

use log::warn;
use serde::{Deserialize, Serialize};

use planter_format::data_read::{read_as_f32, read_as_i32, read_as_strings, read_compound_field};
use planter_format::datatype::Datatype;
use planter_format::type_builders::CompoundTypeBuilder;
use planter_format::DatasetData;

use crate::error::{PlanterError, Result};

/// Capacity of every string field.
pub const FIXED_STRING_LEN: usize = 256;

/// Float columns of `ChannelSettings`, in on-disk order. The misspelled
/// `ActiveLAyer` is the name existing files use.
pub const SETTINGS_FLOAT_COLUMNS: [&str; 13] = [
    "Visible",
    "Valid",
    "Line_R",
    "Line_G",
    "Line_B",
    "Back_R",
    "Back_G",
    "Back_B",
    "ActiveLAyer",
    "YRangeManual",
    "YRangeMin",
    "YRangeMax",
    "PanelHeight",
];

const ACTIVE_LAYER_ALIAS: &str = "ActiveLayer";

/// Append `value` to `buf` as a fixed-size NUL-padded field.
pub(crate) fn push_fixed(buf: &mut Vec<u8>, value: &str) {
    let mut end = value.len().min(FIXED_STRING_LEN);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let start = buf.len();
    buf.extend_from_slice(&value.as_bytes()[..end]);
    buf.resize(start + FIXED_STRING_LEN, 0);
}

/// Truncate `value` the way it will be stored.
pub fn fit_fixed(value: &str) -> String {
    let mut buf = Vec::with_capacity(FIXED_STRING_LEN);
    push_fixed(&mut buf, value);
    let end = buf.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Per-channel display configuration read by Signal Plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub channel: String,
    pub visible: f32,
    pub valid: f32,
    pub line_r: f32,
    pub line_g: f32,
    pub line_b: f32,
    pub back_r: f32,
    pub back_g: f32,
    pub back_b: f32,
    pub active_layer: f32,
    pub y_range_manual: f32,
    pub y_range_min: f32,
    pub y_range_max: f32,
    pub panel_height: f32,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        ChannelSettings {
            channel: String::new(),
            visible: 1.0,
            valid: 1.0,
            line_r: 127.0,
            line_g: 100.0,
            line_b: 192.0,
            back_r: 192.0,
            back_g: 192.0,
            back_b: 192.0,
            active_layer: 0.0,
            y_range_manual: 0.0,
            y_range_min: -1.0,
            y_range_max: 1.0,
            panel_height: 100.0,
        }
    }
}

impl ChannelSettings {
    /// A copy of `template` for channel `name`.
    pub fn from_template(template: &ChannelSettings, name: &str) -> Self {
        ChannelSettings {
            channel: fit_fixed(name),
            ..template.clone()
        }
    }

    /// Float fields in [`SETTINGS_FLOAT_COLUMNS`] order.
    pub fn values(&self) -> [f32; 13] {
        [
            self.visible,
            self.valid,
            self.line_r,
            self.line_g,
            self.line_b,
            self.back_r,
            self.back_g,
            self.back_b,
            self.active_layer,
            self.y_range_manual,
            self.y_range_min,
            self.y_range_max,
            self.panel_height,
        ]
    }

    fn set_values(&mut self, v: [f32; 13]) {
        [
            self.visible,
            self.valid,
            self.line_r,
            self.line_g,
            self.line_b,
            self.back_r,
            self.back_g,
            self.back_b,
            self.active_layer,
            self.y_range_manual,
            self.y_range_min,
            self.y_range_max,
            self.panel_height,
        ] = v;
    }
}

/// Per-channel provenance stored in `Info`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelInfo {
    pub channel_name: String,
    pub datacache_name: String,
    pub units: String,
}

impl ChannelInfo {
    pub fn new(channel_name: &str, datacache_name: &str, units: &str) -> Self {
        ChannelInfo {
            channel_name: fit_fixed(channel_name),
            datacache_name: fit_fixed(datacache_name),
            units: fit_fixed(units),
        }
    }
}

/// One channel: its `ChannelSettings` row and its `Info` row, kept
/// together so the two datasets cannot drift apart.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub settings: ChannelSettings,
    pub info: ChannelInfo,
}

impl Channel {
    pub fn name(&self) -> &str {
        &self.settings.channel
    }
}

/// An annotated interval over the sample axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Mark {
    pub sample_left: i32,
    pub sample_right: i32,
    pub group: String,
    pub validity: f32,
    pub channel: String,
    pub info: String,
}

pub(crate) fn settings_datatype() -> Datatype {
    SETTINGS_FLOAT_COLUMNS
        .iter()
        .fold(
            CompoundTypeBuilder::new().string_field("Channel", FIXED_STRING_LEN as u32),
            |b, name| b.f32_field(name),
        )
        .build()
}

pub(crate) fn info_datatype() -> Datatype {
    CompoundTypeBuilder::new()
        .string_field("ChannelName", FIXED_STRING_LEN as u32)
        .string_field("DatacacheName", FIXED_STRING_LEN as u32)
        .string_field("Units", FIXED_STRING_LEN as u32)
        .build()
}

pub(crate) fn marks_datatype() -> Datatype {
    CompoundTypeBuilder::new()
        .i32_field("SampleLeft")
        .i32_field("SampleRight")
        .string_field("Group", FIXED_STRING_LEN as u32)
        .f32_field("Validity")
        .string_field("Channel", FIXED_STRING_LEN as u32)
        .string_field("Info", FIXED_STRING_LEN as u32)
        .build()
}

pub(crate) fn encode_settings<'a>(rows: impl IntoIterator<Item = &'a ChannelSettings>) -> Vec<u8> {
    let mut buf = Vec::new();
    for s in rows {
        push_fixed(&mut buf, &s.channel);
        for v in s.values() {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }
    buf
}

pub(crate) fn encode_infos<'a>(rows: impl IntoIterator<Item = &'a ChannelInfo>) -> Vec<u8> {
    let mut buf = Vec::new();
    for i in rows {
        push_fixed(&mut buf, &i.channel_name);
        push_fixed(&mut buf, &i.datacache_name);
        push_fixed(&mut buf, &i.units);
    }
    buf
}

pub(crate) fn encode_marks(marks: &[Mark]) -> Vec<u8> {
    let mut buf = Vec::new();
    for m in marks {
        buf.extend_from_slice(&m.sample_left.to_le_bytes());
        buf.extend_from_slice(&m.sample_right.to_le_bytes());
        push_fixed(&mut buf, &m.group);
        buf.extend_from_slice(&m.validity.to_le_bytes());
        push_fixed(&mut buf, &m.channel);
        push_fixed(&mut buf, &m.info);
    }
    buf
}

fn unexpected(d: &DatasetData, reason: impl Into<String>) -> PlanterError {
    PlanterError::UnexpectedDataset {
        name: d.name.clone(),
        reason: reason.into(),
    }
}

fn record_count(d: &DatasetData) -> Result<usize> {
    if !matches!(d.datatype, Datatype::Compound { .. }) {
        return Err(unexpected(d, "not a compound dataset"));
    }
    if d.shape.len() > 1 {
        return Err(unexpected(d, format!("expected one dimension, found {:?}", d.shape)));
    }
    Ok(d.num_elements() as usize)
}

fn string_column(d: &DatasetData, name: &str) -> Result<Option<Vec<String>>> {
    match read_compound_field(&d.raw, &d.datatype, name)? {
        Some((t, raw)) => Ok(Some(read_as_strings(&raw, &t)?)),
        None => Ok(None),
    }
}

fn f32_column(d: &DatasetData, name: &str) -> Result<Option<Vec<f32>>> {
    match read_compound_field(&d.raw, &d.datatype, name)? {
        Some((t, raw)) => Ok(Some(read_as_f32(&raw, &t)?)),
        None => Ok(None),
    }
}

fn i32_column(d: &DatasetData, name: &str) -> Result<Option<Vec<i32>>> {
    match read_compound_field(&d.raw, &d.datatype, name)? {
        Some((t, raw)) => Ok(Some(read_as_i32(&raw, &t)?)),
        None => Ok(None),
    }
}

fn required_strings(d: &DatasetData, name: &str) -> Result<Vec<String>> {
    string_column(d, name)?.ok_or_else(|| unexpected(d, format!("missing `{name}` field")))
}

fn optional_strings(d: &DatasetData, name: &str, n: usize) -> Result<Vec<String>> {
    Ok(string_column(d, name)?.unwrap_or_else(|| {
        warn!("`{}` has no `{name}` field; using empty strings", d.name);
        vec![String::new(); n]
    }))
}

pub(crate) fn decode_settings(d: &DatasetData, template: &ChannelSettings) -> Result<Vec<ChannelSettings>> {
    let n = record_count(d)?;
    let names = required_strings(d, "Channel")?;
    let defaults = template.values();
    let mut columns = Vec::with_capacity(SETTINGS_FLOAT_COLUMNS.len());
    for (i, &column) in SETTINGS_FLOAT_COLUMNS.iter().enumerate() {
        let mut values = f32_column(d, column)?;
        if values.is_none() && column == "ActiveLAyer" {
            values = f32_column(d, ACTIVE_LAYER_ALIAS)?;
        }
        columns.push(values.unwrap_or_else(|| {
            warn!("`{}` has no `{column}` field; using {}", d.name, defaults[i]);
            vec![defaults[i]; n]
        }));
    }
    Ok(names
        .into_iter()
        .enumerate()
        .map(|(row, channel)| {
            let mut s = ChannelSettings {
                channel,
                ..ChannelSettings::default()
            };
            let mut v = [0f32; 13];
            for (slot, column) in v.iter_mut().zip(&columns) {
                *slot = column[row];
            }
            s.set_values(v);
            s
        })
        .collect())
}

pub(crate) fn decode_infos(d: &DatasetData) -> Result<Vec<ChannelInfo>> {
    let n = record_count(d)?;
    let names = required_strings(d, "ChannelName")?;
    let caches = optional_strings(d, "DatacacheName", n)?;
    let units = optional_strings(d, "Units", n)?;
    Ok(names
        .into_iter()
        .zip(caches)
        .zip(units)
        .map(|((channel_name, datacache_name), units)| ChannelInfo {
            channel_name,
            datacache_name,
            units,
        })
        .collect())
}

pub(crate) fn decode_marks(d: &DatasetData) -> Result<Vec<Mark>> {
    let n = record_count(d)?;
    let left = i32_column(d, "SampleLeft")?.ok_or_else(|| unexpected(d, "missing `SampleLeft` field"))?;
    let right = i32_column(d, "SampleRight")?.unwrap_or_else(|| left.clone());
    let validity = f32_column(d, "Validity")?.unwrap_or_else(|| vec![0.0; n]);
    let groups = optional_strings(d, "Group", n)?;
    let channels = optional_strings(d, "Channel", n)?;
    let infos = optional_strings(d, "Info", n)?;
    Ok((0..n)
        .map(|i| Mark {
            sample_left: left[i],
            sample_right: right[i],
            group: groups[i].clone(),
            validity: validity[i],
            channel: channels[i].clone(),
            info: infos[i].clone(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(name: &str, datatype: Datatype, n: u64, raw: Vec<u8>) -> DatasetData {
        DatasetData {
            name: name.into(),
            datatype,
            shape: vec![n],
            max_shape: None,
            chunk_dims: None,
            raw,
            attributes: Vec::new(),
        }
    }

    #[test]
    fn record_sizes_match_numpy_layout() {
        assert_eq!(settings_datatype().type_size(), 256 + 13 * 4);
        assert_eq!(info_datatype().type_size(), 3 * 256);
        assert_eq!(marks_datatype().type_size(), 4 + 4 + 256 + 4 + 256 + 256);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(200);
        let fitted = fit_fixed(&long);
        assert_eq!(fitted.len(), 256);
        assert_eq!(fitted.chars().count(), 128);
        assert_eq!(fit_fixed(&"x".repeat(300)).len(), 256);
    }

    #[test]
    fn settings_roundtrip_through_bytes() {
        let template = ChannelSettings::default();
        let rows = vec![
            ChannelSettings::from_template(&template, "ECG"),
            ChannelSettings {
                panel_height: 42.0,
                ..ChannelSettings::from_template(&template, "EEG")
            },
        ];
        let d = dataset("ChannelSettings", settings_datatype(), 2, encode_settings(&rows));
        assert_eq!(decode_settings(&d, &template).unwrap(), rows);
    }

    #[test]
    fn missing_float_columns_fall_back_to_template() {
        let datatype = CompoundTypeBuilder::new()
            .string_field("Channel", 256)
            .f32_field("ActiveLayer")
            .build();
        let mut raw = Vec::new();
        push_fixed(&mut raw, "A");
        raw.extend_from_slice(&3.0f32.to_le_bytes());
        let d = dataset("ChannelSettings", datatype, 1, raw);
        let decoded = decode_settings(&d, &ChannelSettings::default()).unwrap();
        assert_eq!(decoded[0].active_layer, 3.0);
        assert_eq!(decoded[0].line_r, 127.0);
    }

    #[test]
    fn infos_and_marks_roundtrip() {
        let infos = vec![ChannelInfo::new("ch_1", "RAW", "mV"), ChannelInfo::new("ch_2", "FILT", "Pa")];
        let d = dataset("Info", info_datatype(), 2, encode_infos(&infos));
        assert_eq!(decode_infos(&d).unwrap(), infos);

        let marks = vec![Mark {
            sample_left: 5,
            sample_right: 9,
            group: "g1".into(),
            validity: 1.0,
            channel: "ch_1".into(),
            info: "blink".into(),
        }];
        let d = dataset("Marks", marks_datatype(), 1, encode_marks(&marks));
        assert_eq!(decode_marks(&d).unwrap(), marks);
    }

    #[test]
    fn non_compound_is_rejected() {
        let d = dataset("Info", planter_format::type_builders::make_f32_type(), 1, vec![0; 4]);
        assert!(matches!(decode_infos(&d), Err(PlanterError::UnexpectedDataset { .. })));
    }
}
