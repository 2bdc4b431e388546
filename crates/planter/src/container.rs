//! In-memory model of a container file.
//!
//! The whole file is decoded into a [`Container`] on open and serialized
//! back in one piece on flush. Every edit replaces a complete value in
//! the model, so a dataset is never observed half rewritten.

use std::collections::BTreeMap;

use log::{debug, warn};

use planter_format::chunked::ChunkOptions;
use planter_format::data_read::read_as_f32;
use planter_format::type_builders::make_f32_type;
use planter_format::{DatasetBuilder, DatasetData, FileReader, FileWriter};

use crate::attributes::AttrValue;
use crate::config::StorageOptions;
use crate::error::{PlanterError, Result};
use crate::matrix::Matrix;
use crate::records::{
    decode_infos, decode_marks, decode_settings, encode_infos, encode_marks, encode_settings, info_datatype,
    marks_datatype, settings_datatype, Channel, ChannelInfo, ChannelSettings, Mark,
};

pub const DATA: &str = "Data";
pub const CHANNEL_SETTINGS: &str = "ChannelSettings";
pub const INFO: &str = "Info";
pub const MARKS: &str = "Marks";

const CORE_DATASETS: [&str; 4] = [DATA, CHANNEL_SETTINGS, INFO, MARKS];

/// Decoded contents of one container file.
#[derive(Debug, Clone, Default)]
pub struct Container {
    pub data: Option<Matrix>,
    /// One entry per `Data` row. `Some` exactly when `data` is.
    pub channels: Option<Vec<Channel>>,
    pub marks: Option<Vec<Mark>>,
    pub attributes: BTreeMap<String, AttrValue>,
    /// Other root datasets, written back unchanged.
    pub extras: Vec<DatasetData>,
}

fn unexpected(name: &str, reason: impl Into<String>) -> PlanterError {
    PlanterError::UnexpectedDataset {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn decode_data(d: &DatasetData) -> Result<Matrix> {
    let (rows, cols) = match d.shape[..] {
        [n] => (1, n as usize),
        [r, c] => (r as usize, c as usize),
        _ => return Err(unexpected(&d.name, format!("expected a 2-D matrix, found shape {:?}", d.shape))),
    };
    let values = read_as_f32(&d.raw, &d.datatype)?;
    Matrix::new(rows, cols, values)
}

/// A dataset can be carried through a rewrite when its type serializes
/// and its bytes do not point into a heap this writer does not produce.
fn rewritable(d: &DatasetData) -> bool {
    !d.datatype.is_variable_length() && d.datatype.serialize().is_ok()
}

fn synthesize_channels(rows: usize, template: &ChannelSettings) -> Vec<Channel> {
    (0..rows)
        .map(|i| {
            let name = i.to_string();
            Channel {
                settings: ChannelSettings::from_template(template, &name),
                info: ChannelInfo::new(&name, "", ""),
            }
        })
        .collect()
}

impl Container {
    /// Decode a container image. Missing channel metadata is synthesized
    /// from `template`.
    pub fn load(bytes: Vec<u8>, template: &ChannelSettings) -> Result<Container> {
        let reader = FileReader::from_bytes(bytes)?;
        let mut container = Container::default();

        for msg in reader.root_attributes()? {
            match AttrValue::read(&msg, &reader) {
                Ok(value) => {
                    container.attributes.insert(msg.name.clone(), value);
                }
                Err(e) => warn!("skipping root attribute `{}`: {e}", msg.name),
            }
        }

        let names = reader.dataset_names()?;
        for entry in reader.root_entries()? {
            if !names.contains(&entry.name) {
                warn!("`{}` is not a dataset and will not be written back", entry.name);
            }
        }

        let mut settings = None;
        let mut infos = None;
        for name in names {
            if CORE_DATASETS.contains(&name.as_str()) {
                let Some(d) = reader.read_dataset(&name)? else {
                    continue;
                };
                match name.as_str() {
                    DATA => container.data = Some(decode_data(&d)?),
                    CHANNEL_SETTINGS => settings = Some(decode_settings(&d, template)?),
                    INFO => infos = Some(decode_infos(&d)?),
                    _ => container.marks = Some(decode_marks(&d)?),
                }
                continue;
            }
            match reader.read_dataset(&name) {
                Ok(Some(d)) if rewritable(&d) => container.extras.push(d),
                Ok(Some(_)) => warn!("dataset `{name}` has a type that cannot be rewritten; dropping it"),
                Ok(None) => {}
                Err(e) => warn!("dataset `{name}` is unreadable ({e}); dropping it"),
            }
        }

        container.channels = match (&container.data, settings, infos) {
            (None, s, i) => {
                if s.is_some() || i.is_some() {
                    warn!("channel metadata without `{DATA}` is discarded");
                }
                None
            }
            (Some(m), Some(s), Some(i)) => {
                if s.len() != m.rows() || i.len() != m.rows() {
                    return Err(PlanterError::Misaligned {
                        data_rows: m.rows(),
                        settings: s.len(),
                        info: i.len(),
                    });
                }
                Some(
                    s.into_iter()
                        .zip(i)
                        .map(|(settings, info)| Channel { settings, info })
                        .collect(),
                )
            }
            (Some(m), None, None) => {
                warn!("`{DATA}` has no channel metadata; generating defaults for {} channels", m.rows());
                Some(synthesize_channels(m.rows(), template))
            }
            (Some(m), s, i) => {
                return Err(PlanterError::Misaligned {
                    data_rows: m.rows(),
                    settings: s.map_or(0, |s| s.len()),
                    info: i.map_or(0, |i| i.len()),
                })
            }
        };
        debug!(
            "loaded container: data {:?}, {} marks, {} attributes, {} other datasets",
            container.data.as_ref().map(Matrix::shape),
            container.marks.as_ref().map_or(0, Vec::len),
            container.attributes.len(),
            container.extras.len()
        );
        Ok(container)
    }

    /// Serialize the model into a complete file image.
    pub fn to_bytes(&self, storage: StorageOptions) -> Result<Vec<u8>> {
        let mut writer = FileWriter::new().with_chunk_target(storage.chunk_target_bytes);
        for (name, value) in &self.attributes {
            writer.add_root_attribute(value.to_message(name));
        }

        if let (Some(data), Some(channels)) = (&self.data, &self.channels) {
            let raw = data.as_slice().iter().flat_map(|v| v.to_le_bytes()).collect();
            let (rows, cols) = data.shape();
            writer.add_dataset(
                DatasetBuilder::new(DATA, make_f32_type(), &[rows as u64, cols as u64], raw)
                    .resizable()
                    .chunked(ChunkOptions {
                        chunk_dims: None,
                        deflate_level: storage.deflate_level,
                        shuffle: storage.deflate_level.is_some(),
                    }),
            );
            let n = [channels.len() as u64];
            writer.add_dataset(DatasetBuilder::new(
                CHANNEL_SETTINGS,
                settings_datatype(),
                &n,
                encode_settings(channels.iter().map(|c| &c.settings)),
            ));
            writer.add_dataset(DatasetBuilder::new(
                INFO,
                info_datatype(),
                &n,
                encode_infos(channels.iter().map(|c| &c.info)),
            ));
        }

        if let Some(marks) = &self.marks {
            writer.add_dataset(DatasetBuilder::new(
                MARKS,
                marks_datatype(),
                &[marks.len() as u64],
                encode_marks(marks),
            ));
        }

        for d in &self.extras {
            let mut builder = DatasetBuilder::new(&d.name, d.datatype.clone(), &d.shape, d.raw.clone());
            if let Some(max) = &d.max_shape {
                builder = builder.with_max_shape(max);
            }
            if let Some(dims) = &d.chunk_dims {
                builder = builder.chunked(ChunkOptions {
                    chunk_dims: Some(dims.clone()),
                    ..ChunkOptions::default()
                });
            }
            for attr in d.attributes.iter().filter(|a| !a.datatype.is_variable_length()) {
                builder = builder.with_attribute(attr.clone());
            }
            writer.add_dataset(builder);
        }

        Ok(writer.finish()?)
    }

    /// Number of channels, zero without `Data`.
    pub fn channel_count(&self) -> usize {
        self.data.as_ref().map_or(0, Matrix::rows)
    }
}
