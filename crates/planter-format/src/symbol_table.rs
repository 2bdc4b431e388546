//! Symbol Table message (0x0011) and symbol table nodes (`SNOD`).

use crate::bytes::{ensure_len, read_u16, read_u32, read_uint};
use crate::error::FormatError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTableMessage {
    pub btree_address: u64,
    pub local_heap_address: u64,
}

impl SymbolTableMessage {
    pub fn parse(data: &[u8], offset_size: u8) -> Result<SymbolTableMessage, FormatError> {
        Ok(SymbolTableMessage {
            btree_address: read_uint(data, 0, offset_size)?,
            local_heap_address: read_uint(data, offset_size as usize, offset_size)?,
        })
    }
}

/// One entry of a symbol table node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTableEntry {
    pub link_name_offset: u64,
    pub object_header_address: u64,
    pub cache_type: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTableNode {
    pub entries: Vec<SymbolTableEntry>,
}

impl SymbolTableNode {
    pub fn parse(
        file_data: &[u8],
        offset: usize,
        offset_size: u8,
    ) -> Result<SymbolTableNode, FormatError> {
        ensure_len(file_data, offset, 8)?;
        if &file_data[offset..offset + 4] != b"SNOD" {
            return Err(FormatError::InvalidSymbolTableNodeSignature);
        }
        let version = file_data[offset + 4];
        if version != 1 {
            return Err(FormatError::InvalidSymbolTableNodeVersion(version));
        }
        let count = read_u16(file_data, offset + 6)? as usize;

        // name offset, header address, cache type, reserved, 16-byte scratch pad
        let os = offset_size as usize;
        let entry_size = 2 * os + 24;
        let mut entries = Vec::with_capacity(count);
        let mut pos = offset + 8;
        for _ in 0..count {
            ensure_len(file_data, pos, entry_size)?;
            entries.push(SymbolTableEntry {
                link_name_offset: read_uint(file_data, pos, offset_size)?,
                object_header_address: read_uint(file_data, pos + os, offset_size)?,
                cache_type: read_u32(file_data, pos + 2 * os)?,
            });
            pos += entry_size;
        }
        Ok(SymbolTableNode { entries })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn build_snod(entries: &[(u64, u64)]) -> Vec<u8> {
        let mut buf = b"SNOD".to_vec();
        buf.extend_from_slice(&[1, 0]);
        buf.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for &(name_offset, addr) in entries {
            buf.extend_from_slice(&name_offset.to_le_bytes());
            buf.extend_from_slice(&addr.to_le_bytes());
            buf.extend_from_slice(&[0u8; 24]);
        }
        buf
    }

    #[test]
    fn parse_node_entries() {
        let data = build_snod(&[(8, 0x100), (16, 0x200)]);
        let node = SymbolTableNode::parse(&data, 0, 8).unwrap();
        assert_eq!(node.entries.len(), 2);
        assert_eq!(node.entries[1].link_name_offset, 16);
        assert_eq!(node.entries[1].object_header_address, 0x200);
    }

    #[test]
    fn parse_message() {
        let mut data = 0x88u64.to_le_bytes().to_vec();
        data.extend_from_slice(&0x2a8u64.to_le_bytes());
        let msg = SymbolTableMessage::parse(&data, 8).unwrap();
        assert_eq!(msg.btree_address, 0x88);
        assert_eq!(msg.local_heap_address, 0x2a8);
    }

    #[test]
    fn bad_version() {
        let mut data = build_snod(&[]);
        data[4] = 2;
        assert_eq!(
            SymbolTableNode::parse(&data, 0, 8).unwrap_err(),
            FormatError::InvalidSymbolTableNodeVersion(2)
        );
    }
}
