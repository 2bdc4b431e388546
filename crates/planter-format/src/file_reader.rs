//! Reading the root group of a file: its links, its attributes and the
//! datasets it holds.
//!
//! The whole file is held in memory. Both new-style groups (link
//! messages) and old-style groups (symbol table) are understood, so files
//! written by h5py with default settings open as well as ours.

use log::{debug, warn};

use crate::attribute::AttributeMessage;
use crate::chunked::read_chunked_data;
use crate::data_layout::DataLayout;
use crate::dataspace::{Dataspace, DataspaceType};
use crate::datatype::Datatype;
use crate::error::FormatError;
use crate::filter_pipeline::FilterPipeline;
use crate::global_heap;
use crate::group_v1::{resolve_v1_group_entries, GroupEntry};
use crate::link_info::LinkInfoMessage;
use crate::link_message::{LinkMessage, LinkTarget};
use crate::message_type::MessageType;
use crate::object_header::ObjectHeader;
use crate::signature::find_signature;
use crate::superblock::Superblock;
use crate::symbol_table::SymbolTableMessage;

/// A dataset read in full.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetData {
    pub name: String,
    pub datatype: Datatype,
    /// Current extent; empty for a scalar.
    pub shape: Vec<u64>,
    /// Maximum extent if the dataspace records one. `UNLIMITED` marks a
    /// resizable dimension.
    pub max_shape: Option<Vec<u64>>,
    /// Chunk shape when the dataset is chunked.
    pub chunk_dims: Option<Vec<u64>>,
    /// Row-major element bytes.
    pub raw: Vec<u8>,
    pub attributes: Vec<AttributeMessage>,
}

impl DatasetData {
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }
}

/// An HDF5 file loaded into memory.
pub struct FileReader {
    data: Vec<u8>,
    base: usize,
    superblock: Superblock,
}

impl FileReader {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, FormatError> {
        let sig_offset = find_signature(&data)?;
        let superblock = Superblock::parse(&data, sig_offset)?;
        let base = superblock.base_address as usize;
        if base > data.len() {
            return Err(FormatError::UnexpectedEof {
                expected: base,
                available: data.len(),
            });
        }
        debug!(
            "superblock v{} at {sig_offset}, root header at {:#x}",
            superblock.version, superblock.root_group_address
        );
        Ok(FileReader {
            data,
            base,
            superblock,
        })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    fn bytes(&self) -> &[u8] {
        &self.data[self.base..]
    }

    fn header(&self, address: u64) -> Result<ObjectHeader, FormatError> {
        ObjectHeader::parse(
            self.bytes(),
            address as usize,
            self.superblock.offset_size,
            self.superblock.length_size,
        )
    }

    fn root_header(&self) -> Result<ObjectHeader, FormatError> {
        self.header(self.superblock.root_group_address)
    }

    /// Hard-linked members of the root group, in link order. Soft and
    /// external links are skipped.
    pub fn root_entries(&self) -> Result<Vec<GroupEntry>, FormatError> {
        let root = self.root_header()?;
        let os = self.superblock.offset_size;
        let ls = self.superblock.length_size;

        if let Some(msg) = root.find(MessageType::SymbolTable) {
            let table = SymbolTableMessage::parse(&msg.data, os)?;
            return resolve_v1_group_entries(self.bytes(), &table, os, ls);
        }
        if let Some(msg) = root.find(MessageType::LinkInfo) {
            if LinkInfoMessage::parse(&msg.data, os)?.is_dense() {
                return Err(FormatError::UnsupportedLayout(
                    "root group uses dense link storage".into(),
                ));
            }
        }

        let mut entries = Vec::new();
        for msg in root.find_all(MessageType::Link) {
            let link = LinkMessage::parse(&msg.data, os)?;
            match link.target {
                LinkTarget::Hard {
                    object_header_address,
                } => entries.push(GroupEntry {
                    name: link.name,
                    object_header_address,
                }),
                other => debug!("skipping link `{}` -> {other:?}", link.name),
            }
        }
        Ok(entries)
    }

    /// Attributes attached to the root group.
    pub fn root_attributes(&self) -> Result<Vec<AttributeMessage>, FormatError> {
        let root = self.root_header()?;
        Ok(self.attributes_of(&root, "/"))
    }

    fn attributes_of(&self, header: &ObjectHeader, owner: &str) -> Vec<AttributeMessage> {
        if header.find(MessageType::AttributeInfo).is_some() {
            // compact attributes may still be present alongside dense ones
            warn!("`{owner}` keeps attributes in dense storage; only compact ones are read");
        }
        header
            .find_all(MessageType::Attribute)
            .filter_map(|msg| match AttributeMessage::parse(&msg.data, self.superblock.length_size) {
                Ok(attr) => Some(attr),
                Err(e) => {
                    warn!("skipping unreadable attribute on `{owner}`: {e}");
                    None
                }
            })
            .collect()
    }

    /// Resolve `count` variable-length string elements of `raw` through the
    /// file's global heap.
    pub fn read_vl_strings(&self, raw: &[u8], count: u64) -> Result<Vec<String>, FormatError> {
        global_heap::read_vl_strings(
            self.bytes(),
            raw,
            count,
            self.superblock.offset_size,
            self.superblock.length_size,
        )
    }

    /// Names of the root members that are datasets.
    pub fn dataset_names(&self) -> Result<Vec<String>, FormatError> {
        let mut names = Vec::new();
        for entry in self.root_entries()? {
            if self.header(entry.object_header_address)?.find(MessageType::DataLayout).is_some() {
                names.push(entry.name);
            }
        }
        Ok(names)
    }

    /// Read the root dataset `name`, or `None` when the root has no such
    /// member.
    pub fn read_dataset(&self, name: &str) -> Result<Option<DatasetData>, FormatError> {
        let Some(entry) = self.root_entries()?.into_iter().find(|e| e.name == name) else {
            return Ok(None);
        };
        let header = self.header(entry.object_header_address)?;
        if header.find(MessageType::DataLayout).is_none() {
            return Err(FormatError::NotADataset(name.to_string()));
        }
        self.read_dataset_header(name, &header).map(Some)
    }

    fn read_dataset_header(&self, name: &str, header: &ObjectHeader) -> Result<DatasetData, FormatError> {
        let os = self.superblock.offset_size;
        let ls = self.superblock.length_size;
        let missing = |message: &'static str| FormatError::MissingMessage {
            name: name.to_string(),
            message,
        };

        let dt_msg = header.find(MessageType::Datatype).ok_or_else(|| missing("datatype"))?;
        let (datatype, _) = Datatype::parse(&dt_msg.data)?;
        let ds_msg = header.find(MessageType::Dataspace).ok_or_else(|| missing("dataspace"))?;
        let dataspace = Dataspace::parse(&ds_msg.data, ls)?;
        let layout_msg = header.find(MessageType::DataLayout).ok_or_else(|| missing("data layout"))?;
        let layout = DataLayout::parse(&layout_msg.data, os, ls)?;
        let pipeline = header
            .find(MessageType::FilterPipeline)
            .map(|m| FilterPipeline::parse(&m.data))
            .transpose()?;

        let shape = match dataspace.space_type {
            DataspaceType::Null => vec![0],
            _ => dataspace.dimensions.clone(),
        };
        let element_size = datatype.type_size() as usize;
        let expected = shape.iter().product::<u64>() as usize * element_size;

        let mut chunk_dims = None;
        let raw = match &layout {
            DataLayout::Compact { data } => data.clone(),
            DataLayout::Contiguous { address: None, .. } => vec![0; expected],
            DataLayout::Contiguous {
                address: Some(addr),
                size,
            } => {
                let start = *addr as usize;
                let len = (*size as usize).min(expected);
                let bytes = self.bytes();
                if start.checked_add(len).map_or(true, |end| end > bytes.len()) {
                    return Err(FormatError::UnexpectedEof {
                        expected: start.saturating_add(len),
                        available: bytes.len(),
                    });
                }
                bytes[start..start + len].to_vec()
            }
            DataLayout::Chunked { chunk_dims: dims, index } => {
                chunk_dims = Some(dims[..dims.len().saturating_sub(1)].iter().map(|&d| d as u64).collect());
                read_chunked_data(self.bytes(), dims, index, &shape, element_size, pipeline.as_ref(), os)?
            }
        };
        if raw.len() != expected {
            return Err(FormatError::DataSizeMismatch {
                name: name.to_string(),
                expected,
                actual: raw.len(),
            });
        }

        debug!("read `{name}` shape {shape:?} ({} bytes)", raw.len());
        Ok(DatasetData {
            name: name.to_string(),
            datatype,
            shape,
            max_shape: dataspace.max_dimensions,
            chunk_dims,
            raw,
            attributes: self.attributes_of(header, name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree_v1::tests::build_group_node;
    use crate::bytes::{pad8, UNDEF_ADDR};
    use crate::data_read::read_as_f32;
    use crate::local_heap::tests::build_heap;
    use crate::symbol_table::tests::build_snod;
    use crate::type_builders::make_f32_type;

    fn v0_superblock(root: u64, eof: u64) -> Vec<u8> {
        let mut buf = crate::signature::HDF5_SIGNATURE.to_vec();
        buf.extend_from_slice(&[0, 0, 0, 0, 0, 8, 8, 0]);
        buf.extend_from_slice(&4u16.to_le_bytes());
        buf.extend_from_slice(&16u16.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        for addr in [0, UNDEF_ADDR, eof, UNDEF_ADDR, 0, root] {
            buf.extend_from_slice(&addr.to_le_bytes());
        }
        buf.extend_from_slice(&[0u8; 24]);
        buf
    }

    fn v1_header(messages: &[(MessageType, Vec<u8>)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (msg_type, data) in messages {
            body.extend_from_slice(&msg_type.to_u16().to_le_bytes());
            body.extend_from_slice(&(pad8(data.len()) as u16).to_le_bytes());
            body.extend_from_slice(&[0; 4]);
            body.extend_from_slice(data);
            body.resize(pad8(body.len()), 0);
        }
        let mut buf = vec![1, 0];
        buf.extend_from_slice(&(messages.len() as u16).to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
        buf.extend_from_slice(&[0; 4]);
        buf.extend_from_slice(&body);
        buf
    }

    /// The layout h5py produces with default settings: v0 superblock,
    /// v1 headers and a symbol-table root group.
    fn old_style_file(values: &[f32]) -> Vec<u8> {
        let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let root_len = v1_header(&[(MessageType::SymbolTable, vec![0; 16])]).len() as u64;
        let dataset_header = |data_addr: u64| {
            v1_header(&[
                (MessageType::Datatype, make_f32_type().serialize().unwrap()),
                (MessageType::Dataspace, Dataspace::simple(&[values.len() as u64], None).serialize(8)),
                (
                    MessageType::DataLayout,
                    DataLayout::Contiguous {
                        address: Some(data_addr),
                        size: raw.len() as u64,
                    }
                    .serialize()
                    .unwrap(),
                ),
            ])
        };

        let root_addr = 96u64;
        let ds_addr = root_addr + root_len;
        let heap_addr = ds_addr + dataset_header(0).len() as u64;
        let (heap, name_offsets) = build_heap(heap_addr, &["Data"]);
        let btree_addr = heap_addr + heap.len() as u64;
        let snod_addr = btree_addr + build_group_node(0, &[0, 0], &[0]).len() as u64;
        let snod = build_snod(&[(name_offsets[0], ds_addr)]);
        let data_addr = snod_addr + snod.len() as u64;
        let eof = data_addr + raw.len() as u64;

        let mut table = btree_addr.to_le_bytes().to_vec();
        table.extend_from_slice(&heap_addr.to_le_bytes());

        let mut file = v0_superblock(root_addr, eof);
        assert_eq!(file.len() as u64, root_addr);
        file.extend_from_slice(&v1_header(&[(MessageType::SymbolTable, table)]));
        file.extend_from_slice(&dataset_header(data_addr));
        file.extend_from_slice(&heap);
        file.extend_from_slice(&build_group_node(0, &[0, name_offsets[0]], &[snod_addr]));
        file.extend_from_slice(&snod);
        file.extend_from_slice(&raw);
        file
    }

    #[test]
    fn reads_symbol_table_root() {
        let reader = FileReader::from_bytes(old_style_file(&[1.0, 2.5, -4.0])).unwrap();
        assert_eq!(reader.superblock().version, 0);
        assert_eq!(reader.dataset_names().unwrap(), vec!["Data"]);
        let data = reader.read_dataset("Data").unwrap().unwrap();
        assert_eq!(data.shape, vec![3]);
        assert_eq!(read_as_f32(&data.raw, &data.datatype).unwrap(), vec![1.0, 2.5, -4.0]);
        assert!(data.attributes.is_empty());
    }

    #[test]
    fn leading_garbage_is_not_a_file() {
        assert_eq!(
            FileReader::from_bytes(vec![0; 64]).err(),
            Some(FormatError::SignatureNotFound)
        );
    }
}
