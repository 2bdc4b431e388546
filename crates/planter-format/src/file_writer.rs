//! HDF5 file creation.
//!
//! Produces a v2 superblock, a root group with compact link storage and
//! inline attributes, and datasets stored either contiguously or in
//! chunks indexed by a version 1 B-tree. Every object header uses 8-byte
//! addresses, so header sizes are known before any address is assigned
//! and the file is laid out in a single pass:
//!
//! ```text
//! superblock | root header | dataset headers | per dataset: (B-tree, chunks) or data
//! ```

use log::debug;

use crate::attribute::AttributeMessage;
use crate::chunked::{btree_size, build_chunk_btree, encode_chunks, ChunkInfo, ChunkOptions, EncodedChunk};
use crate::data_layout::{ChunkIndex, DataLayout};
use crate::dataspace::{Dataspace, UNLIMITED};
use crate::datatype::Datatype;
use crate::error::FormatError;
use crate::filter_pipeline::FilterPipeline;
use crate::link_info::{group_info_message, LinkInfoMessage};
use crate::link_message::LinkMessage;
use crate::message_type::MessageType;
use crate::object_header_writer::{ObjectHeaderWriter, MSG_FLAG_CONSTANT};
use crate::superblock::{Superblock, SUPERBLOCK_V2_SIZE};

const OFFSET_SIZE: u8 = 8;
const LENGTH_SIZE: u8 = 8;

/// Default chunk size aimed for when chunk dims are chosen automatically.
pub const DEFAULT_CHUNK_TARGET_BYTES: usize = 1 << 20;

/// Fill value message v3: allocation time late, fill written if defined,
/// no fill value defined.
const FILL_VALUE_MESSAGE: [u8; 2] = [3, 0x0a];

/// A dataset to be written into the root group.
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    name: String,
    datatype: Datatype,
    shape: Vec<u64>,
    max_shape: Option<Vec<u64>>,
    raw: Vec<u8>,
    chunking: Option<ChunkOptions>,
    attributes: Vec<AttributeMessage>,
}

impl DatasetBuilder {
    /// `raw` holds the row-major element bytes for `shape`.
    pub fn new(name: &str, datatype: Datatype, shape: &[u64], raw: Vec<u8>) -> Self {
        DatasetBuilder {
            name: name.to_string(),
            datatype,
            shape: shape.to_vec(),
            max_shape: None,
            raw,
            chunking: None,
            attributes: Vec::new(),
        }
    }

    /// Record a maximum extent. A resizable dataset is always chunked.
    pub fn with_max_shape(mut self, max_shape: &[u64]) -> Self {
        self.max_shape = Some(max_shape.to_vec());
        self
    }

    /// Make every dimension unlimited.
    pub fn resizable(self) -> Self {
        let max = vec![UNLIMITED; self.shape.len()];
        self.with_max_shape(&max)
    }

    pub fn chunked(mut self, options: ChunkOptions) -> Self {
        self.chunking = Some(options);
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeMessage) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_chunked(&self) -> bool {
        self.chunking.is_some() || self.max_shape.is_some()
    }
}

enum Storage {
    Contiguous(Vec<u8>),
    Chunked {
        chunk_dims: Vec<u64>,
        pipeline: FilterPipeline,
        chunks: Vec<EncodedChunk>,
    },
}

impl Storage {
    /// Bytes this dataset occupies after the headers.
    fn len(&self, rank: usize) -> usize {
        match self {
            Storage::Contiguous(raw) => raw.len(),
            Storage::Chunked { chunks, .. } => {
                btree_size(chunks.len(), rank) + chunks.iter().map(|c| c.data.len()).sum::<usize>()
            }
        }
    }
}

struct Prepared {
    name: String,
    datatype: Datatype,
    dataspace: Dataspace,
    storage: Storage,
    attributes: Vec<AttributeMessage>,
}

impl Prepared {
    fn header(&self, layout: &DataLayout) -> Result<Vec<u8>, FormatError> {
        let mut w = ObjectHeaderWriter::new();
        w.add_message_with_flags(MessageType::Datatype, self.datatype.serialize()?, MSG_FLAG_CONSTANT);
        w.add_message(MessageType::Dataspace, self.dataspace.serialize(LENGTH_SIZE));
        w.add_message_with_flags(MessageType::FillValue, FILL_VALUE_MESSAGE.to_vec(), MSG_FLAG_CONSTANT);
        w.add_message(MessageType::DataLayout, layout.serialize()?);
        if let Storage::Chunked { pipeline, .. } = &self.storage {
            if !pipeline.is_empty() {
                w.add_message(MessageType::FilterPipeline, pipeline.serialize());
            }
        }
        for attr in &self.attributes {
            w.add_message(MessageType::Attribute, attr.serialize(LENGTH_SIZE)?);
        }
        w.serialize()
    }

    fn layout(&self, address: Option<u64>) -> Result<DataLayout, FormatError> {
        Ok(match &self.storage {
            Storage::Contiguous(raw) => DataLayout::Contiguous {
                address,
                size: raw.len() as u64,
            },
            Storage::Chunked { chunk_dims, .. } => {
                let mut dims = Vec::with_capacity(chunk_dims.len() + 1);
                for &d in chunk_dims {
                    dims.push(u32::try_from(d).map_err(|_| {
                        FormatError::UnsupportedLayout(format!("chunk dimension {d} of `{}`", self.name))
                    })?);
                }
                dims.push(self.datatype.type_size());
                DataLayout::Chunked {
                    chunk_dims: dims,
                    index: ChunkIndex::BTreeV1 { address },
                }
            }
        })
    }
}

/// Builds a complete file image in memory.
#[derive(Debug)]
pub struct FileWriter {
    root_attributes: Vec<AttributeMessage>,
    datasets: Vec<DatasetBuilder>,
    chunk_target_bytes: usize,
}

impl Default for FileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FileWriter {
    pub fn new() -> Self {
        FileWriter {
            root_attributes: Vec::new(),
            datasets: Vec::new(),
            chunk_target_bytes: DEFAULT_CHUNK_TARGET_BYTES,
        }
    }

    /// Target chunk size for datasets without explicit chunk dims.
    pub fn with_chunk_target(mut self, bytes: usize) -> Self {
        self.chunk_target_bytes = bytes.max(1);
        self
    }

    pub fn add_root_attribute(&mut self, attribute: AttributeMessage) {
        self.root_attributes.push(attribute);
    }

    pub fn add_dataset(&mut self, dataset: DatasetBuilder) {
        self.datasets.push(dataset);
    }

    fn prepare(&self, d: DatasetBuilder) -> Result<Prepared, FormatError> {
        let element_size = d.datatype.type_size() as usize;
        let expected = d.shape.iter().product::<u64>() as usize * element_size;
        if d.raw.len() != expected {
            return Err(FormatError::DataSizeMismatch {
                name: d.name,
                expected,
                actual: d.raw.len(),
            });
        }
        let dataspace = if d.shape.is_empty() {
            Dataspace::scalar()
        } else {
            Dataspace::simple(&d.shape, d.max_shape.as_deref())
        };

        let storage = if d.is_chunked() && !d.shape.is_empty() {
            let options = d.chunking.clone().unwrap_or_default();
            let chunk_dims = options.resolve_chunk_dims(&d.shape, element_size, self.chunk_target_bytes);
            let pipeline = options.build_pipeline();
            let chunks = encode_chunks(&d.raw, &d.shape, &chunk_dims, element_size, &pipeline)?;
            debug!("`{}`: {} chunks of {chunk_dims:?}", d.name, chunks.len());
            Storage::Chunked {
                chunk_dims,
                pipeline,
                chunks,
            }
        } else {
            Storage::Contiguous(d.raw)
        };

        Ok(Prepared {
            name: d.name,
            datatype: d.datatype,
            dataspace,
            storage,
            attributes: d.attributes,
        })
    }

    fn root_header(&self, links: &[LinkMessage]) -> Result<Vec<u8>, FormatError> {
        let mut w = ObjectHeaderWriter::new();
        w.add_message(MessageType::LinkInfo, LinkInfoMessage::default().serialize());
        w.add_message(MessageType::GroupInfo, group_info_message());
        for link in links {
            w.add_message(MessageType::Link, link.serialize(OFFSET_SIZE)?);
        }
        for attr in &self.root_attributes {
            w.add_message(MessageType::Attribute, attr.serialize(LENGTH_SIZE)?);
        }
        w.serialize()
    }

    /// Lay out and serialize the whole file.
    pub fn finish(mut self) -> Result<Vec<u8>, FormatError> {
        let builders = std::mem::take(&mut self.datasets);
        let prepared = builders
            .into_iter()
            .map(|d| self.prepare(d))
            .collect::<Result<Vec<_>, _>>()?;

        // header sizes do not depend on the addresses they carry
        let placeholder_links: Vec<LinkMessage> = prepared.iter().map(|p| LinkMessage::hard(&p.name, 0)).collect();
        let root_len = self.root_header(&placeholder_links)?.len();
        let mut cursor = (SUPERBLOCK_V2_SIZE + root_len) as u64;
        let mut header_addrs = Vec::with_capacity(prepared.len());
        for p in &prepared {
            header_addrs.push(cursor);
            cursor += p.header(&p.layout(Some(0))?)?.len() as u64;
        }

        let mut headers = Vec::with_capacity(prepared.len());
        let mut bodies = Vec::with_capacity(prepared.len());
        for p in &prepared {
            let rank = p.dataspace.dimensions.len();
            let (address, body) = match &p.storage {
                Storage::Contiguous(raw) if raw.is_empty() => (None, Vec::new()),
                Storage::Contiguous(raw) => (Some(cursor), raw.clone()),
                Storage::Chunked { chunks, .. } if chunks.is_empty() => (None, Vec::new()),
                Storage::Chunked {
                    chunk_dims, chunks, ..
                } => {
                    let mut data_addr = cursor + btree_size(chunks.len(), rank) as u64;
                    let mut infos = Vec::with_capacity(chunks.len());
                    for c in chunks {
                        infos.push(ChunkInfo {
                            chunk_size: c.data.len() as u32,
                            filter_mask: c.filter_mask,
                            offsets: c.offsets.clone(),
                            address: data_addr,
                        });
                        data_addr += c.data.len() as u64;
                    }
                    let (mut body, root) = build_chunk_btree(&infos, chunk_dims, cursor);
                    for c in chunks {
                        body.extend_from_slice(&c.data);
                    }
                    (Some(root), body)
                }
            };
            debug_assert_eq!(body.len(), p.storage.len(rank));
            cursor += body.len() as u64;
            headers.push(p.header(&p.layout(address)?)?);
            bodies.push(body);
        }

        let links: Vec<LinkMessage> = prepared
            .iter()
            .zip(&header_addrs)
            .map(|(p, &addr)| LinkMessage::hard(&p.name, addr))
            .collect();
        let root = self.root_header(&links)?;

        let mut buf = Vec::with_capacity(cursor as usize);
        buf.extend_from_slice(&Superblock::v2(SUPERBLOCK_V2_SIZE as u64, cursor).serialize());
        buf.extend_from_slice(&root);
        for h in &headers {
            buf.extend_from_slice(h);
        }
        for b in &bodies {
            buf.extend_from_slice(b);
        }
        debug_assert_eq!(buf.len() as u64, cursor);
        debug!("wrote {} datasets, {} bytes", prepared.len(), buf.len());
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::UNDEF_ADDR;
    use crate::data_read::{read_as_f32, read_as_strings};
    use crate::file_reader::FileReader;
    use crate::type_builders::{make_f32_type, make_fixed_string_type};

    fn f32_bytes(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|x| x.to_le_bytes()).collect()
    }

    #[test]
    fn empty_file_has_root_only() {
        let bytes = FileWriter::new().finish().unwrap();
        let reader = FileReader::from_bytes(bytes.clone()).unwrap();
        assert_eq!(reader.superblock().eof_address, bytes.len() as u64);
        assert!(reader.root_entries().unwrap().is_empty());
        assert!(reader.root_attributes().unwrap().is_empty());
    }

    #[test]
    fn contiguous_and_chunked_side_by_side() {
        let values: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let mut w = FileWriter::new();
        w.add_root_attribute(AttributeMessage::new(
            "Fs",
            make_f32_type(),
            Dataspace::simple(&[1], None),
            f32_bytes(&[500.0]),
        ));
        w.add_dataset(DatasetBuilder::new("Plain", make_f32_type(), &[3, 4], f32_bytes(&values)));
        w.add_dataset(
            DatasetBuilder::new("Data", make_f32_type(), &[3, 4], f32_bytes(&values))
                .resizable()
                .chunked(ChunkOptions {
                    chunk_dims: Some(vec![3, 1]),
                    ..ChunkOptions::default()
                }),
        );
        let reader = FileReader::from_bytes(w.finish().unwrap()).unwrap();

        assert_eq!(reader.dataset_names().unwrap(), vec!["Plain", "Data"]);
        let attrs = reader.root_attributes().unwrap();
        assert_eq!(attrs[0].read_as_f64().unwrap(), vec![500.0]);

        let plain = reader.read_dataset("Plain").unwrap().unwrap();
        assert_eq!(plain.max_shape, None);
        assert_eq!(plain.chunk_dims, None);
        assert_eq!(read_as_f32(&plain.raw, &plain.datatype).unwrap(), values);

        let data = reader.read_dataset("Data").unwrap().unwrap();
        assert_eq!(data.shape, vec![3, 4]);
        assert_eq!(data.max_shape, Some(vec![UNLIMITED, UNLIMITED]));
        assert_eq!(data.chunk_dims, Some(vec![3, 1]));
        assert_eq!(read_as_f32(&data.raw, &data.datatype).unwrap(), values);
        assert!(reader.read_dataset("Nope").unwrap().is_none());
    }

    #[test]
    fn empty_resizable_dataset() {
        let mut w = FileWriter::new();
        w.add_dataset(DatasetBuilder::new("Marks", make_fixed_string_type(4), &[0], Vec::new()).resizable());
        let reader = FileReader::from_bytes(w.finish().unwrap()).unwrap();
        let marks = reader.read_dataset("Marks").unwrap().unwrap();
        assert_eq!(marks.shape, vec![0]);
        assert!(read_as_strings(&marks.raw, &marks.datatype).unwrap().is_empty());
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let mut w = FileWriter::new();
        w.add_dataset(DatasetBuilder::new("Data", make_f32_type(), &[2, 2], vec![0; 12]));
        assert_eq!(
            w.finish().unwrap_err(),
            FormatError::DataSizeMismatch {
                name: "Data".into(),
                expected: 16,
                actual: 12
            }
        );
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn compressed_chunks() {
        let values: Vec<f32> = (0..4000).map(|i| (i % 7) as f32).collect();
        let mut w = FileWriter::new().with_chunk_target(1024);
        w.add_dataset(
            DatasetBuilder::new("Data", make_f32_type(), &[2, 2000], f32_bytes(&values)).chunked(ChunkOptions {
                deflate_level: Some(4),
                shuffle: true,
                ..ChunkOptions::default()
            }),
        );
        let bytes = w.finish().unwrap();
        assert!(bytes.len() < values.len() * 4);
        let reader = FileReader::from_bytes(bytes).unwrap();
        let data = reader.read_dataset("Data").unwrap().unwrap();
        assert_eq!(read_as_f32(&data.raw, &data.datatype).unwrap(), values);
    }

    #[test]
    fn many_chunks_need_internal_nodes() {
        let values: Vec<f32> = (0..300).map(|i| i as f32).collect();
        let mut w = FileWriter::new();
        w.add_dataset(
            DatasetBuilder::new("Data", make_f32_type(), &[1, 300], f32_bytes(&values)).chunked(ChunkOptions {
                chunk_dims: Some(vec![1, 2]),
                ..ChunkOptions::default()
            }),
        );
        let reader = FileReader::from_bytes(w.finish().unwrap()).unwrap();
        let data = reader.read_dataset("Data").unwrap().unwrap();
        assert_eq!(read_as_f32(&data.raw, &data.datatype).unwrap(), values);
    }

    #[test]
    fn undefined_address_constant_matches_layout() {
        let p = FileWriter::new()
            .prepare(DatasetBuilder::new("x", make_f32_type(), &[0], Vec::new()))
            .unwrap();
        let bytes = p.layout(None).unwrap().serialize().unwrap();
        assert_eq!(&bytes[2..10], &UNDEF_ADDR.to_le_bytes());
    }
}
