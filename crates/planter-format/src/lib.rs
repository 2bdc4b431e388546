//! Pure-Rust reader and writer for the HDF5 subset used by Signal Plant
//! containers.
//!
//! Reading covers superblocks v0-v3, both object header versions,
//! old-style and compact new-style root groups, contiguous, compact and
//! chunked layouts (B-tree v1, single chunk and implicit indexes), the
//! deflate, shuffle and fletcher32 filters, and variable-length strings
//! held in global heap collections. Writing produces a v2 superblock with
//! a flat root group of contiguous or chunked datasets.

pub mod attribute;
pub mod btree_v1;
pub(crate) mod bytes;
pub mod checksum;
pub mod chunked;
pub mod data_layout;
pub mod data_read;
pub mod dataspace;
pub mod datatype;
pub mod error;
pub mod file_reader;
pub mod file_writer;
pub mod filter_pipeline;
pub mod filters;
pub mod global_heap;
pub mod group_v1;
pub mod link_info;
pub mod link_message;
pub mod local_heap;
pub mod message_type;
pub mod object_header;
pub mod object_header_writer;
pub mod signature;
pub mod superblock;
pub mod symbol_table;
pub mod type_builders;

pub use bytes::UNDEF_ADDR;
pub use error::FormatError;
pub use file_reader::{DatasetData, FileReader};
pub use file_writer::{DatasetBuilder, FileWriter};
