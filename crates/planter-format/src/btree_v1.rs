//! Version 1 B-tree nodes (`TREE`): type 0 indexes group symbol table
//! nodes, type 1 indexes raw data chunks.

use crate::bytes::{ensure_len, read_addr, read_u16, read_uint};
use crate::error::FormatError;

pub const BTREE_SIGNATURE: [u8; 4] = *b"TREE";

/// Node type for group nodes.
pub const NODE_TYPE_GROUP: u8 = 0;
/// Node type for raw data chunk nodes.
pub const NODE_TYPE_CHUNK: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BTreeV1Node {
    pub node_type: u8,
    pub node_level: u8,
    pub left_sibling: Option<u64>,
    pub right_sibling: Option<u64>,
    /// `children.len() + 1` raw keys of `key_size` bytes each.
    pub keys: Vec<Vec<u8>>,
    pub children: Vec<u64>,
}

impl BTreeV1Node {
    /// Parse the node at `offset`. Keys are `key_size` bytes wide: the
    /// length size for group nodes, `8 + 8 * (rank + 1)` for chunk nodes.
    pub fn parse(
        file_data: &[u8],
        offset: usize,
        offset_size: u8,
        key_size: usize,
    ) -> Result<BTreeV1Node, FormatError> {
        let os = offset_size as usize;
        ensure_len(file_data, offset, 8 + 2 * os)?;
        if file_data[offset..offset + 4] != BTREE_SIGNATURE {
            return Err(FormatError::InvalidBTreeSignature);
        }
        let node_type = file_data[offset + 4];
        let node_level = file_data[offset + 5];
        let entries_used = read_u16(file_data, offset + 6)? as usize;
        let left_sibling = read_addr(file_data, offset + 8, offset_size)?;
        let right_sibling = read_addr(file_data, offset + 8 + os, offset_size)?;

        let mut pos = offset + 8 + 2 * os;
        ensure_len(file_data, pos, entries_used * (key_size + os) + key_size)?;
        let mut keys = Vec::with_capacity(entries_used + 1);
        let mut children = Vec::with_capacity(entries_used);
        for _ in 0..entries_used {
            keys.push(file_data[pos..pos + key_size].to_vec());
            pos += key_size;
            children.push(read_uint(file_data, pos, offset_size)?);
            pos += os;
        }
        keys.push(file_data[pos..pos + key_size].to_vec());

        Ok(BTreeV1Node {
            node_type,
            node_level,
            left_sibling,
            right_sibling,
            keys,
            children,
        })
    }
}

/// Addresses of every symbol table node under a group B-tree.
pub fn collect_symbol_table_nodes(
    file_data: &[u8],
    btree_address: u64,
    offset_size: u8,
    length_size: u8,
) -> Result<Vec<u64>, FormatError> {
    let mut result = Vec::new();
    let mut stack = vec![btree_address];
    while let Some(addr) = stack.pop() {
        let node = BTreeV1Node::parse(file_data, addr as usize, offset_size, length_size as usize)?;
        if node.node_type != NODE_TYPE_GROUP {
            return Err(FormatError::InvalidBTreeNodeType(node.node_type));
        }
        if node.node_level == 0 {
            result.extend_from_slice(&node.children);
        } else {
            // reversed so that the stack pops children left to right
            stack.extend(node.children.iter().rev());
        }
    }
    Ok(result)
}
