//! HDF5 Data Layout message (type 0x0008).
//!
//! Versions 3 and 4 are read. Version 4 chunk indexes other than the
//! single-chunk and implicit ones are rejected. Version 3 is written.

use crate::bytes::{ensure_len, read_addr, read_u16, read_uint, write_uint, UNDEF_ADDR};
use crate::error::FormatError;

/// Where the chunks of a chunked dataset are indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkIndex {
    /// Version 1 B-tree (layout version 3).
    BTreeV1 { address: Option<u64> },
    /// The whole dataset is one chunk.
    SingleChunk {
        address: Option<u64>,
        /// Stored size when filters are applied.
        filtered_size: Option<u64>,
        filter_mask: u32,
    },
    /// Unfiltered, fixed-size chunks stored back to back.
    Implicit { address: Option<u64> },
}

/// Parsed data layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLayout {
    /// Raw data stored inside the message.
    Compact { data: Vec<u8> },
    /// Raw data stored in one block.
    Contiguous { address: Option<u64>, size: u64 },
    /// Raw data split into chunks. `chunk_dims` carries one trailing entry
    /// holding the element size.
    Chunked {
        chunk_dims: Vec<u32>,
        index: ChunkIndex,
    },
}

impl DataLayout {
    pub fn parse(data: &[u8], offset_size: u8, length_size: u8) -> Result<DataLayout, FormatError> {
        ensure_len(data, 0, 2)?;
        let version = data[0];
        let class = data[1];
        let pos = 2;

        match (version, class) {
            (3 | 4, 0) => {
                let size = read_u16(data, pos)? as usize;
                ensure_len(data, pos + 2, size)?;
                Ok(DataLayout::Compact {
                    data: data[pos + 2..pos + 2 + size].to_vec(),
                })
            }
            (3 | 4, 1) => {
                let address = read_addr(data, pos, offset_size)?;
                let size = read_uint(data, pos + offset_size as usize, length_size)?;
                Ok(DataLayout::Contiguous { address, size })
            }
            (3, 2) => {
                // rank+1, B-tree address, rank+1 u32 dims
                ensure_len(data, pos, 1)?;
                let ndims = data[pos] as usize;
                let address = read_addr(data, pos + 1, offset_size)?;
                let mut p = pos + 1 + offset_size as usize;
                let mut chunk_dims = Vec::with_capacity(ndims);
                for _ in 0..ndims {
                    chunk_dims.push(read_uint(data, p, 4)? as u32);
                    p += 4;
                }
                Ok(DataLayout::Chunked {
                    chunk_dims,
                    index: ChunkIndex::BTreeV1 { address },
                })
            }
            (4, 2) => Self::parse_v4_chunked(data, pos, offset_size, length_size),
            (3 | 4, 3) => Err(FormatError::UnsupportedLayout("virtual dataset".into())),
            (3 | 4, c) => Err(FormatError::UnsupportedLayout(format!("layout class {c}"))),
            (v, _) => Err(FormatError::InvalidLayoutVersion(v)),
        }
    }

    fn parse_v4_chunked(
        data: &[u8],
        pos: usize,
        offset_size: u8,
        length_size: u8,
    ) -> Result<DataLayout, FormatError> {
        // flags, dimensionality, encoded dim width, dims, index type
        ensure_len(data, pos, 3)?;
        let flags = data[pos];
        let ndims = data[pos + 1] as usize;
        let width = data[pos + 2];
        let mut p = pos + 3;
        let mut chunk_dims = Vec::with_capacity(ndims);
        for _ in 0..ndims {
            chunk_dims.push(read_uint(data, p, width)? as u32);
            p += width as usize;
        }
        ensure_len(data, p, 1)?;
        let index_type = data[p];
        p += 1;

        let index = match index_type {
            1 => {
                let (filtered_size, filter_mask) = if flags & 0x02 != 0 {
                    let size = read_uint(data, p, length_size)?;
                    let mask = read_uint(data, p + length_size as usize, 4)? as u32;
                    p += length_size as usize + 4;
                    (Some(size), mask)
                } else {
                    (None, 0)
                };
                ChunkIndex::SingleChunk {
                    address: read_addr(data, p, offset_size)?,
                    filtered_size,
                    filter_mask,
                }
            }
            2 => ChunkIndex::Implicit {
                address: read_addr(data, p, offset_size)?,
            },
            3 => return Err(FormatError::UnsupportedLayout("fixed array chunk index".into())),
            4 => {
                return Err(FormatError::UnsupportedLayout(
                    "extensible array chunk index".into(),
                ))
            }
            5 => return Err(FormatError::UnsupportedLayout("v2 B-tree chunk index".into())),
            t => return Err(FormatError::UnsupportedLayout(format!("chunk index type {t}"))),
        };

        Ok(DataLayout::Chunked { chunk_dims, index })
    }

    /// Serialize as a version 3 message with 8-byte addresses and lengths.
    pub fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        let mut buf = vec![3];
        match self {
            DataLayout::Compact { data } => {
                if data.len() > u16::MAX as usize {
                    return Err(FormatError::MessageTooLarge(data.len()));
                }
                buf.push(0);
                buf.extend_from_slice(&(data.len() as u16).to_le_bytes());
                buf.extend_from_slice(data);
            }
            DataLayout::Contiguous { address, size } => {
                buf.push(1);
                write_uint(&mut buf, address.unwrap_or(UNDEF_ADDR), 8);
                write_uint(&mut buf, *size, 8);
            }
            DataLayout::Chunked {
                chunk_dims,
                index: ChunkIndex::BTreeV1 { address },
            } => {
                buf.push(2);
                buf.push(chunk_dims.len() as u8);
                write_uint(&mut buf, address.unwrap_or(UNDEF_ADDR), 8);
                for &d in chunk_dims {
                    buf.extend_from_slice(&d.to_le_bytes());
                }
            }
            DataLayout::Chunked { .. } => {
                return Err(FormatError::UnsupportedLayout(
                    "only B-tree chunk indexes can be written".into(),
                ))
            }
        }
        Ok(buf)
    }
}
