//! HDF5 Filter Pipeline message (type 0x000B).

use crate::bytes::{ensure_len, pad8, read_u16, read_u32};
use crate::error::FormatError;

pub const FILTER_DEFLATE: u16 = 1;
pub const FILTER_SHUFFLE: u16 = 2;
pub const FILTER_FLETCHER32: u16 = 3;

/// One filter in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDescription {
    pub filter_id: u16,
    pub name: Option<String>,
    /// Bit 0 set means the filter is optional.
    pub flags: u16,
    pub client_data: Vec<u32>,
}

/// Ordered list of filters applied to each chunk on write.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterPipeline {
    pub filters: Vec<FilterDescription>,
}

fn parse_name(data: &[u8], pos: usize, len: usize) -> Result<Option<String>, FormatError> {
    if len == 0 {
        return Ok(None);
    }
    ensure_len(data, pos, len)?;
    let raw = &data[pos..pos + len];
    let raw = raw.split(|&b| b == 0).next().unwrap_or(raw);
    Ok(Some(String::from_utf8_lossy(raw).into_owned()))
}

impl FilterPipeline {
    /// Shuffle (optional) followed by deflate at `level`.
    pub fn shuffle_deflate(level: u32) -> Self {
        FilterPipeline {
            filters: vec![
                FilterDescription {
                    filter_id: FILTER_SHUFFLE,
                    name: None,
                    flags: 1,
                    client_data: Vec::new(),
                },
                FilterDescription {
                    filter_id: FILTER_DEFLATE,
                    name: None,
                    flags: 1,
                    client_data: vec![level],
                },
            ],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn parse(data: &[u8]) -> Result<FilterPipeline, FormatError> {
        ensure_len(data, 0, 2)?;
        let version = data[0];
        let count = data[1] as usize;
        // v1 has six reserved bytes after the count
        let mut pos = match version {
            1 => 8,
            2 => 2,
            v => return Err(FormatError::InvalidFilterPipelineVersion(v)),
        };

        let mut filters = Vec::with_capacity(count);
        for _ in 0..count {
            let filter_id = read_u16(data, pos)?;
            pos += 2;
            let name_len = if version == 1 || filter_id >= 256 {
                let n = read_u16(data, pos)? as usize;
                pos += 2;
                n
            } else {
                0
            };
            let flags = read_u16(data, pos)?;
            let n_values = read_u16(data, pos + 2)? as usize;
            pos += 4;

            let name = parse_name(data, pos, name_len)?;
            pos += if version == 1 { pad8(name_len) } else { name_len };

            let mut client_data = Vec::with_capacity(n_values);
            for _ in 0..n_values {
                client_data.push(read_u32(data, pos)?);
                pos += 4;
            }
            if version == 1 && n_values % 2 == 1 {
                pos += 4;
            }

            filters.push(FilterDescription {
                filter_id,
                name,
                flags,
                client_data,
            });
        }

        Ok(FilterPipeline { filters })
    }

    /// Serialize as a version 2 message.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = vec![2, self.filters.len() as u8];
        for f in &self.filters {
            buf.extend_from_slice(&f.filter_id.to_le_bytes());
            let name = f
                .name
                .as_ref()
                .filter(|_| f.filter_id >= 256)
                .map(|n| {
                    let mut bytes = n.as_bytes().to_vec();
                    bytes.push(0);
                    bytes
                });
            if f.filter_id >= 256 {
                let len = name.as_ref().map_or(0, Vec::len) as u16;
                buf.extend_from_slice(&len.to_le_bytes());
            }
            buf.extend_from_slice(&f.flags.to_le_bytes());
            buf.extend_from_slice(&(f.client_data.len() as u16).to_le_bytes());
            if let Some(name) = name {
                buf.extend_from_slice(&name);
            }
            for v in &f.client_data {
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        buf
    }
}
