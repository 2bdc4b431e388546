//! Link Info (0x0002) and Group Info (0x000A) messages of new-style groups.

use crate::bytes::{ensure_len, read_addr, read_uint, write_uint, UNDEF_ADDR};
use crate::error::FormatError;

/// Link Info message. A defined fractal heap address means the group
/// keeps its links in dense storage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkInfoMessage {
    pub max_creation_index: Option<u64>,
    pub fractal_heap_address: Option<u64>,
    pub name_index_btree_address: Option<u64>,
}

impl LinkInfoMessage {
    pub fn parse(data: &[u8], offset_size: u8) -> Result<LinkInfoMessage, FormatError> {
        ensure_len(data, 0, 2)?;
        let flags = data[1];
        let mut pos = 2;
        let max_creation_index = if flags & 0x01 != 0 {
            pos += 8;
            Some(read_uint(data, pos - 8, 8)?)
        } else {
            None
        };
        let fractal_heap_address = read_addr(data, pos, offset_size)?;
        let name_index_btree_address = read_addr(data, pos + offset_size as usize, offset_size)?;
        Ok(LinkInfoMessage {
            max_creation_index,
            fractal_heap_address,
            name_index_btree_address,
        })
    }

    pub fn is_dense(&self) -> bool {
        self.fractal_heap_address.is_some()
    }

    /// Compact storage, no creation order tracking.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = vec![0, 0];
        write_uint(&mut buf, self.fractal_heap_address.unwrap_or(UNDEF_ADDR), 8);
        write_uint(&mut buf, self.name_index_btree_address.unwrap_or(UNDEF_ADDR), 8);
        buf
    }
}

/// Group Info message with no stored phase-change or size estimates.
pub fn group_info_message() -> Vec<u8> {
    vec![0, 0]
}
