//! Chunked storage: B-tree v1 type 1 traversal, chunk assembly, chunk
//! splitting and the chunk index writer.

use crate::btree_v1::{BTreeV1Node, BTREE_SIGNATURE, NODE_TYPE_CHUNK};
use crate::bytes::{ensure_len, read_uint, UNDEF_ADDR};
use crate::data_layout::ChunkIndex;
use crate::error::FormatError;
use crate::filter_pipeline::{FilterDescription, FilterPipeline, FILTER_DEFLATE, FILTER_SHUFFLE};
use crate::filters::{compress_chunk, decompress_chunk};

/// Entries per written B-tree node (2K with K = 32).
pub const BTREE_NODE_ENTRIES: usize = 64;

/// Largest chunk count kept in one leaf by [`auto_chunk_dims`].
const AUTO_MAX_CHUNKS_PER_ROW: u64 = BTREE_NODE_ENTRIES as u64;

/// A chunk as recorded in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Stored (possibly filtered) size in bytes.
    pub chunk_size: u32,
    /// Bit `i` set means filter `i` was skipped for this chunk.
    pub filter_mask: u32,
    /// Element offset of the chunk in dataset space, one per dimension.
    pub offsets: Vec<u64>,
    pub address: u64,
}

/// How a dataset should be chunked and filtered on write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkOptions {
    /// Explicit chunk shape; `None` picks one with [`auto_chunk_dims`].
    pub chunk_dims: Option<Vec<u64>>,
    pub deflate_level: Option<u32>,
    pub shuffle: bool,
}

impl ChunkOptions {
    pub fn build_pipeline(&self) -> FilterPipeline {
        let mut filters = Vec::new();
        if self.shuffle {
            filters.push(FilterDescription {
                filter_id: FILTER_SHUFFLE,
                name: None,
                flags: 1,
                client_data: Vec::new(),
            });
        }
        if let Some(level) = self.deflate_level {
            filters.push(FilterDescription {
                filter_id: FILTER_DEFLATE,
                name: None,
                flags: 1,
                client_data: vec![level],
            });
        }
        FilterPipeline { filters }
    }

    pub fn resolve_chunk_dims(&self, shape: &[u64], element_size: usize, target_bytes: usize) -> Vec<u64> {
        match &self.chunk_dims {
            Some(dims) if dims.len() == shape.len() => dims.iter().map(|&d| d.max(1)).collect(),
            _ => auto_chunk_dims(shape, element_size, target_bytes),
        }
    }
}

/// Chunk shape covering all leading dimensions in full and slicing the
/// last one into pieces of roughly `target_bytes`. A single row never
/// needs more than one B-tree leaf.
pub fn auto_chunk_dims(shape: &[u64], element_size: usize, target_bytes: usize) -> Vec<u64> {
    let Some((&last, leading)) = shape.split_last() else {
        return Vec::new();
    };
    let mut dims: Vec<u64> = leading.iter().map(|&d| d.max(1)).collect();
    let row_bytes = dims.iter().product::<u64>() * element_size.max(1) as u64;
    let by_target = (target_bytes as u64 / row_bytes).max(1);
    let floor = last.div_ceil(AUTO_MAX_CHUNKS_PER_ROW).max(1);
    dims.push(by_target.max(floor).min(last.max(1)));
    dims
}

/// Walk a type 1 B-tree and return every chunk it indexes, in key order.
/// `ndims` is the dataset rank plus one.
pub fn collect_chunk_info(
    file_data: &[u8],
    btree_address: u64,
    ndims: usize,
    offset_size: u8,
) -> Result<Vec<ChunkInfo>, FormatError> {
    let key_size = 8 + ndims * offset_size as usize;
    let mut chunks = Vec::new();
    let mut stack = vec![btree_address];
    while let Some(addr) = stack.pop() {
        let node = BTreeV1Node::parse(file_data, addr as usize, offset_size, key_size)?;
        if node.node_type != NODE_TYPE_CHUNK {
            return Err(FormatError::InvalidBTreeNodeType(node.node_type));
        }
        if node.node_level > 0 {
            stack.extend(node.children.iter().rev());
            continue;
        }
        for (key, &address) in node.keys.iter().zip(&node.children) {
            let mut offsets = Vec::with_capacity(ndims);
            for d in 0..ndims {
                offsets.push(read_uint(key, 8 + d * offset_size as usize, offset_size)?);
            }
            chunks.push(ChunkInfo {
                chunk_size: read_uint(key, 0, 4)? as u32,
                filter_mask: read_uint(key, 4, 4)? as u32,
                offsets,
                address,
            });
        }
    }
    Ok(chunks)
}

/// Chunks of an implicit index: every chunk present, stored back to back
/// in row-major chunk order.
pub fn implicit_chunks(base_address: u64, shape: &[u64], chunk_dims: &[u64], element_size: usize) -> Vec<ChunkInfo> {
    let grid: Vec<u64> = shape.iter().zip(chunk_dims).map(|(&s, &c)| s.div_ceil(c)).collect();
    let total: u64 = grid.iter().product();
    let chunk_bytes = chunk_dims.iter().product::<u64>() * element_size as u64;
    (0..total)
        .map(|i| ChunkInfo {
            chunk_size: chunk_bytes as u32,
            filter_mask: 0,
            offsets: grid_offsets(i, &grid, chunk_dims),
            address: base_address + i * chunk_bytes,
        })
        .collect()
}

fn grid_offsets(linear: u64, grid: &[u64], chunk_dims: &[u64]) -> Vec<u64> {
    let mut offsets = vec![0u64; grid.len()];
    let mut remaining = linear;
    for d in (0..grid.len()).rev() {
        offsets[d] = (remaining % grid[d]) * chunk_dims[d];
        remaining /= grid[d];
    }
    offsets
}

fn strides(dims: &[u64]) -> Vec<usize> {
    let mut s = vec![1usize; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        s[i] = s[i + 1] * dims[i + 1] as usize;
    }
    s
}

/// Copy elements between a chunk buffer and the dataset buffer, skipping
/// the chunk's part past the dataset edge.
fn for_each_element(
    chunk_offsets: &[u64],
    chunk_dims: &[u64],
    shape: &[u64],
    mut copy: impl FnMut(usize, usize),
) {
    let rank = shape.len();
    let ds_strides = strides(shape);
    let chunk_strides = strides(chunk_dims);
    let chunk_total: usize = chunk_dims.iter().map(|&d| d as usize).product();
    'elements: for flat in 0..chunk_total {
        let mut remaining = flat;
        let mut ds_flat = 0usize;
        for d in 0..rank {
            let local = remaining / chunk_strides[d];
            remaining %= chunk_strides[d];
            let global = chunk_offsets[d] as usize + local;
            if global >= shape[d] as usize {
                continue 'elements;
            }
            ds_flat += global * ds_strides[d];
        }
        copy(flat, ds_flat);
    }
}

/// Read and assemble a chunked dataset into row-major raw bytes.
/// `chunk_dims` is the layout's list including the trailing element size.
pub fn read_chunked_data(
    file_data: &[u8],
    chunk_dims: &[u32],
    index: &ChunkIndex,
    shape: &[u64],
    element_size: usize,
    pipeline: Option<&FilterPipeline>,
    offset_size: u8,
) -> Result<Vec<u8>, FormatError> {
    let rank = shape.len();
    if chunk_dims.len() != rank + 1 || chunk_dims[..rank].iter().any(|&d| d == 0) {
        return Err(FormatError::UnsupportedLayout(format!(
            "chunk dims {chunk_dims:?} do not fit a rank {rank} dataset"
        )));
    }
    let spatial: Vec<u64> = chunk_dims[..rank].iter().map(|&d| d as u64).collect();
    let chunk_bytes = spatial.iter().product::<u64>() as usize * element_size;

    let chunks = match index {
        ChunkIndex::BTreeV1 { address: None }
        | ChunkIndex::SingleChunk { address: None, .. }
        | ChunkIndex::Implicit { address: None } => Vec::new(),
        ChunkIndex::BTreeV1 { address: Some(addr) } => {
            collect_chunk_info(file_data, *addr, rank + 1, offset_size)?
        }
        ChunkIndex::SingleChunk {
            address: Some(addr),
            filtered_size,
            filter_mask,
        } => vec![ChunkInfo {
            chunk_size: filtered_size.unwrap_or(chunk_bytes as u64) as u32,
            filter_mask: *filter_mask,
            offsets: vec![0; rank],
            address: *addr,
        }],
        ChunkIndex::Implicit { address: Some(addr) } => {
            implicit_chunks(*addr, shape, &spatial, element_size)
        }
    };

    let total: usize = shape.iter().map(|&d| d as usize).product::<usize>() * element_size;
    let mut output = vec![0u8; total];
    for chunk in &chunks {
        let start = chunk.address as usize;
        let size = chunk.chunk_size as usize;
        ensure_len(file_data, start, size)?;
        let stored = &file_data[start..start + size];
        let decoded = match pipeline {
            Some(p) if !p.is_empty() => decompress_chunk(stored, p, chunk.filter_mask, element_size as u32)?,
            _ => stored.to_vec(),
        };
        for_each_element(&chunk.offsets[..rank], &spatial, shape, |src, dst| {
            let (s, d) = (src * element_size, dst * element_size);
            if s + element_size <= decoded.len() {
                output[d..d + element_size].copy_from_slice(&decoded[s..s + element_size]);
            }
        });
    }
    Ok(output)
}

/// Split row-major raw data into full-size chunks (edge chunks are
/// zero-padded), in row-major chunk order.
pub fn split_into_chunks(
    raw_data: &[u8],
    shape: &[u64],
    chunk_dims: &[u64],
    element_size: usize,
) -> Vec<(Vec<u64>, Vec<u8>)> {
    let grid: Vec<u64> = shape.iter().zip(chunk_dims).map(|(&s, &c)| s.div_ceil(c)).collect();
    let total: u64 = grid.iter().product();
    let chunk_bytes = chunk_dims.iter().product::<u64>() as usize * element_size;
    (0..total)
        .map(|i| {
            let offsets = grid_offsets(i, &grid, chunk_dims);
            let mut chunk = vec![0u8; chunk_bytes];
            for_each_element(&offsets, chunk_dims, shape, |dst, src| {
                let (s, d) = (src * element_size, dst * element_size);
                if s + element_size <= raw_data.len() {
                    chunk[d..d + element_size].copy_from_slice(&raw_data[s..s + element_size]);
                }
            });
            (offsets, chunk)
        })
        .collect()
}

/// A chunk ready to be placed in the file.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    pub offsets: Vec<u64>,
    pub data: Vec<u8>,
    pub filter_mask: u32,
}

/// Split and filter a dataset's raw bytes.
pub fn encode_chunks(
    raw_data: &[u8],
    shape: &[u64],
    chunk_dims: &[u64],
    element_size: usize,
    pipeline: &FilterPipeline,
) -> Result<Vec<EncodedChunk>, FormatError> {
    split_into_chunks(raw_data, shape, chunk_dims, element_size)
        .into_iter()
        .map(|(offsets, data)| {
            let data = if pipeline.is_empty() {
                data
            } else {
                compress_chunk(&data, pipeline, element_size as u32)?
            };
            Ok(EncodedChunk {
                offsets,
                data,
                filter_mask: 0,
            })
        })
        .collect()
}

fn key_size(rank: usize) -> usize {
    8 + 8 * (rank + 1)
}

/// Bytes of one full-capacity node for a dataset of `rank` dimensions.
pub fn btree_node_size(rank: usize) -> usize {
    8 + 16 + (BTREE_NODE_ENTRIES + 1) * key_size(rank) + BTREE_NODE_ENTRIES * 8
}

/// Node counts per level, leaves first.
fn level_counts(num_chunks: usize) -> Vec<usize> {
    let mut levels = vec![num_chunks.div_ceil(BTREE_NODE_ENTRIES)];
    while let Some(&n) = levels.last() {
        if n <= 1 {
            break;
        }
        levels.push(n.div_ceil(BTREE_NODE_ENTRIES));
    }
    levels
}

/// Total bytes [`build_chunk_btree`] emits for `num_chunks` chunks.
pub fn btree_size(num_chunks: usize, rank: usize) -> usize {
    if num_chunks == 0 {
        return 0;
    }
    level_counts(num_chunks).iter().sum::<usize>() * btree_node_size(rank)
}

fn key_bytes(chunk_size: u32, filter_mask: u32, offsets: &[u64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(key_size(offsets.len()));
    buf.extend_from_slice(&chunk_size.to_le_bytes());
    buf.extend_from_slice(&filter_mask.to_le_bytes());
    for &o in offsets {
        buf.extend_from_slice(&o.to_le_bytes());
    }
    // element-size dimension
    buf.extend_from_slice(&0u64.to_le_bytes());
    buf
}

/// Build the type 1 B-tree indexing `chunks` (in row-major chunk order),
/// laid out from `base_address` level by level with the leaves first and
/// the root last. Returns the node bytes and the root address.
pub fn build_chunk_btree(chunks: &[ChunkInfo], chunk_dims: &[u64], base_address: u64) -> (Vec<u8>, u64) {
    let rank = chunk_dims.len();
    let node_size = btree_node_size(rank);

    // (first key, closing key, address) of each child of the level being built
    let mut entries: Vec<(Vec<u8>, Vec<u8>, u64)> = chunks
        .iter()
        .map(|c| {
            let end: Vec<u64> = c.offsets.iter().zip(chunk_dims).map(|(o, d)| o + d).collect();
            (
                key_bytes(c.chunk_size, c.filter_mask, &c.offsets),
                key_bytes(0, 0, &end),
                c.address,
            )
        })
        .collect();

    let mut out = Vec::with_capacity(btree_size(chunks.len(), rank));
    let mut level = 0u8;
    while !entries.is_empty() {
        let level_start = base_address + out.len() as u64;
        let nodes = entries.len().div_ceil(BTREE_NODE_ENTRIES);
        let mut parents = Vec::with_capacity(nodes);
        for (n, group) in entries.chunks(BTREE_NODE_ENTRIES).enumerate() {
            let start = out.len();
            out.extend_from_slice(&BTREE_SIGNATURE);
            out.push(NODE_TYPE_CHUNK);
            out.push(level);
            out.extend_from_slice(&(group.len() as u16).to_le_bytes());
            let left = if n == 0 { UNDEF_ADDR } else { level_start + ((n - 1) * node_size) as u64 };
            let right = if n + 1 == nodes { UNDEF_ADDR } else { level_start + ((n + 1) * node_size) as u64 };
            out.extend_from_slice(&left.to_le_bytes());
            out.extend_from_slice(&right.to_le_bytes());
            for (key, _, child) in group {
                out.extend_from_slice(key);
                out.extend_from_slice(&child.to_le_bytes());
            }
            let closing = group[group.len() - 1].1.clone();
            out.extend_from_slice(&closing);
            out.resize(start + node_size, 0);
            parents.push((group[0].0.clone(), closing, level_start + (n * node_size) as u64));
        }
        if nodes == 1 {
            return (out, parents[0].2);
        }
        entries = parents;
        level += 1;
    }
    (out, UNDEF_ADDR)
}
