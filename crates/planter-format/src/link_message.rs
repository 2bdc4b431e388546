//! HDF5 Link message (type 0x0006).

use crate::bytes::{ensure_len, read_u16, read_uint, write_uint};
use crate::error::FormatError;

const FLAG_CREATION_ORDER: u8 = 0x04;
const FLAG_LINK_TYPE: u8 = 0x08;
const FLAG_CHARSET: u8 = 0x10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    Hard { object_header_address: u64 },
    Soft { target_path: String },
    External { filename: String, object_path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMessage {
    pub name: String,
    pub target: LinkTarget,
}

impl LinkMessage {
    pub fn hard(name: &str, object_header_address: u64) -> Self {
        LinkMessage {
            name: name.to_string(),
            target: LinkTarget::Hard {
                object_header_address,
            },
        }
    }

    pub fn parse(data: &[u8], offset_size: u8) -> Result<LinkMessage, FormatError> {
        ensure_len(data, 0, 2)?;
        if data[0] != 1 {
            return Err(FormatError::InvalidLinkVersion(data[0]));
        }
        let flags = data[1];
        let mut pos = 2;

        let link_type = if flags & FLAG_LINK_TYPE != 0 {
            ensure_len(data, pos, 1)?;
            pos += 1;
            data[pos - 1]
        } else {
            0
        };
        if flags & FLAG_CREATION_ORDER != 0 {
            pos += 8;
        }
        if flags & FLAG_CHARSET != 0 {
            pos += 1;
        }

        let width = 1u8 << (flags & 0x03);
        let name_len = read_uint(data, pos, width)? as usize;
        pos += width as usize;
        ensure_len(data, pos, name_len)?;
        let name = String::from_utf8_lossy(&data[pos..pos + name_len]).into_owned();
        pos += name_len;

        let target = match link_type {
            0 => LinkTarget::Hard {
                object_header_address: read_uint(data, pos, offset_size)?,
            },
            1 => {
                let len = read_u16(data, pos)? as usize;
                ensure_len(data, pos + 2, len)?;
                LinkTarget::Soft {
                    target_path: String::from_utf8_lossy(&data[pos + 2..pos + 2 + len]).into_owned(),
                }
            }
            64 => {
                // version/flags byte, then two NUL-terminated strings
                let len = read_u16(data, pos)? as usize;
                ensure_len(data, pos + 2, len)?;
                let info = &data[pos + 2..pos + 2 + len];
                let mut parts = info.get(1..).unwrap_or_default().split(|&b| b == 0);
                let filename = String::from_utf8_lossy(parts.next().unwrap_or_default()).into_owned();
                let object_path = String::from_utf8_lossy(parts.next().unwrap_or_default()).into_owned();
                LinkTarget::External {
                    filename,
                    object_path,
                }
            }
            t => {
                return Err(FormatError::UnsupportedLayout(format!("link type {t}")));
            }
        };

        Ok(LinkMessage { name, target })
    }

    /// Serialize a hard link. Other link kinds are never written.
    pub fn serialize(&self, offset_size: u8) -> Result<Vec<u8>, FormatError> {
        let LinkTarget::Hard {
            object_header_address,
        } = self.target
        else {
            return Err(FormatError::UnsupportedLayout(format!(
                "cannot write non-hard link `{}`",
                self.name
            )));
        };
        let name = self.name.as_bytes();
        let (size_bits, width) = match name.len() {
            0..=0xFF => (0u8, 1u8),
            0x100..=0xFFFF => (1, 2),
            _ => (2, 4),
        };
        let mut buf = vec![1, size_bits];
        write_uint(&mut buf, name.len() as u64, width);
        buf.extend_from_slice(name);
        write_uint(&mut buf, object_header_address, offset_size);
        Ok(buf)
    }
}
