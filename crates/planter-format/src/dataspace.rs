//! HDF5 Dataspace message (type 0x0001).

use crate::bytes::{ensure_len, read_uint, write_uint};
use crate::error::FormatError;

/// Max-dimension value meaning "unlimited".
pub const UNLIMITED: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataspaceType {
    Scalar,
    Simple,
    Null,
}

/// Shape of a dataset or attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataspace {
    pub space_type: DataspaceType,
    pub dimensions: Vec<u64>,
    pub max_dimensions: Option<Vec<u64>>,
}

impl Dataspace {
    /// A single-element dataspace.
    pub fn scalar() -> Self {
        Dataspace {
            space_type: DataspaceType::Scalar,
            dimensions: Vec::new(),
            max_dimensions: None,
        }
    }

    /// A simple dataspace with the given current and optional maximum shape.
    pub fn simple(dimensions: &[u64], max_dimensions: Option<&[u64]>) -> Self {
        Dataspace {
            space_type: DataspaceType::Simple,
            dimensions: dimensions.to_vec(),
            max_dimensions: max_dimensions.map(<[u64]>::to_vec),
        }
    }

    pub fn parse(data: &[u8], length_size: u8) -> Result<Dataspace, FormatError> {
        ensure_len(data, 0, 4)?;
        let version = data[0];
        let rank = data[1] as usize;
        let flags = data[2];

        let (space_type, mut pos) = match version {
            // version, rank, flags, reserved(5)
            1 => {
                let st = if rank == 0 {
                    DataspaceType::Scalar
                } else {
                    DataspaceType::Simple
                };
                (st, 8)
            }
            2 => {
                let st = match data[3] {
                    0 => DataspaceType::Scalar,
                    1 => DataspaceType::Simple,
                    2 => DataspaceType::Null,
                    t => return Err(FormatError::InvalidDataspaceType(t)),
                };
                (st, 4)
            }
            v => return Err(FormatError::InvalidDataspaceVersion(v)),
        };

        let ls = length_size as usize;
        let mut dimensions = Vec::with_capacity(rank);
        for _ in 0..rank {
            dimensions.push(read_uint(data, pos, length_size)?);
            pos += ls;
        }

        let max_dimensions = if flags & 0x01 != 0 {
            let mut max = Vec::with_capacity(rank);
            for _ in 0..rank {
                max.push(read_uint(data, pos, length_size)?);
                pos += ls;
            }
            Some(max)
        } else {
            None
        };

        Ok(Dataspace {
            space_type,
            dimensions,
            max_dimensions,
        })
    }

    /// Serialize as a version 2 message.
    pub fn serialize(&self, length_size: u8) -> Vec<u8> {
        let rank = self.dimensions.len();
        let mut buf = Vec::with_capacity(4 + 2 * rank * length_size as usize);
        buf.push(2);
        buf.push(rank as u8);
        buf.push(if self.max_dimensions.is_some() { 0x01 } else { 0x00 });
        buf.push(match self.space_type {
            DataspaceType::Scalar => 0,
            DataspaceType::Simple => 1,
            DataspaceType::Null => 2,
        });
        for &dim in &self.dimensions {
            write_uint(&mut buf, dim, length_size);
        }
        if let Some(max) = &self.max_dimensions {
            for &dim in max {
                write_uint(&mut buf, dim, length_size);
            }
        }
        buf
    }

    pub fn num_elements(&self) -> u64 {
        match self.space_type {
            DataspaceType::Null => 0,
            DataspaceType::Scalar => 1,
            DataspaceType::Simple => self.dimensions.iter().product(),
        }
    }
}
