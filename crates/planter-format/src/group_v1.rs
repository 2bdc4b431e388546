//! Old-style groups: a symbol table message pointing at a B-tree of
//! symbol table nodes whose names live in a local heap.

use crate::btree_v1::collect_symbol_table_nodes;
use crate::error::FormatError;
use crate::local_heap::LocalHeap;
use crate::symbol_table::{SymbolTableMessage, SymbolTableNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub name: String,
    pub object_header_address: u64,
}

/// Every member of the group described by `sym_table`, in name order.
pub fn resolve_v1_group_entries(
    file_data: &[u8],
    sym_table: &SymbolTableMessage,
    offset_size: u8,
    length_size: u8,
) -> Result<Vec<GroupEntry>, FormatError> {
    let heap = LocalHeap::parse(
        file_data,
        sym_table.local_heap_address as usize,
        offset_size,
        length_size,
    )?;
    let mut entries = Vec::new();
    for snod in collect_symbol_table_nodes(file_data, sym_table.btree_address, offset_size, length_size)? {
        let node = SymbolTableNode::parse(file_data, snod as usize, offset_size)?;
        for entry in node.entries {
            entries.push(GroupEntry {
                name: heap.read_string(file_data, entry.link_name_offset)?,
                object_header_address: entry.object_header_address,
            });
        }
    }
    Ok(entries)
}
