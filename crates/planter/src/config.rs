//! Defaults applied when creating containers and generating channel
//! metadata, plus storage tuning for written files.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::records::ChannelSettings;

/// Editor configuration.
///
/// Every field has a default, so a JSON document only needs the keys it
/// overrides:
///
/// ```
/// let config = planter::PlanterConfig::from_json_str(r#"{"datacache_name": "FILT"}"#).unwrap();
/// assert_eq!(config.datacache_name, "FILT");
/// assert_eq!(config.data_units, "-");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanterConfig {
    /// Stored in the `GeneratedBy` attribute of new containers.
    pub generated_by: String,
    /// Stored in `LeftI`.
    pub left_index: i64,
    /// Stored in `RightI`.
    pub right_index: i64,
    /// Datacache label for channels created without one.
    pub datacache_name: String,
    /// Unit label for channels created without one.
    pub data_units: String,
    /// Display settings copied into every new `ChannelSettings` row. Its
    /// `channel` field is ignored.
    pub channel_template: ChannelSettings,
    /// Approximate size of one `Data` chunk.
    pub chunk_target_bytes: usize,
    /// Deflate level for `Data` chunks; `None` stores them uncompressed.
    pub deflate_level: Option<u32>,
}

impl Default for PlanterConfig {
    fn default() -> Self {
        PlanterConfig {
            generated_by: "planter".to_string(),
            left_index: 0,
            right_index: 0,
            datacache_name: "RAW".to_string(),
            data_units: "-".to_string(),
            channel_template: ChannelSettings::default(),
            chunk_target_bytes: planter_format::file_writer::DEFAULT_CHUNK_TARGET_BYTES,
            deflate_level: None,
        }
    }
}

impl PlanterConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn with_generated_by(mut self, generated_by: impl Into<String>) -> Self {
        self.generated_by = generated_by.into();
        self
    }

    pub fn with_indices(mut self, left: i64, right: i64) -> Self {
        self.left_index = left;
        self.right_index = right;
        self
    }

    pub fn with_datacache_name(mut self, name: impl Into<String>) -> Self {
        self.datacache_name = name.into();
        self
    }

    pub fn with_data_units(mut self, units: impl Into<String>) -> Self {
        self.data_units = units.into();
        self
    }

    pub fn with_channel_template(mut self, template: ChannelSettings) -> Self {
        self.channel_template = template;
        self
    }

    pub fn with_chunk_target_bytes(mut self, bytes: usize) -> Self {
        self.chunk_target_bytes = bytes.max(1);
        self
    }

    pub fn with_deflate(mut self, level: Option<u32>) -> Self {
        self.deflate_level = level.map(|l| l.min(9));
        self
    }

    /// Storage options handed to the file writer.
    pub(crate) fn storage(&self) -> StorageOptions {
        StorageOptions {
            chunk_target_bytes: self.chunk_target_bytes.max(1),
            deflate_level: self.deflate_level,
        }
    }
}

/// How `Data` is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageOptions {
    pub chunk_target_bytes: usize,
    pub deflate_level: Option<u32>,
}

impl Default for StorageOptions {
    fn default() -> Self {
        PlanterConfig::default().storage()
    }
}
