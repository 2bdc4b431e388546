//! Error types for HDF5 format parsing and writing.

use thiserror::Error;

/// Errors that can occur when parsing or producing HDF5 binary structures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The HDF5 magic signature was not found at any valid offset.
    #[error("HDF5 signature not found at any valid offset")]
    SignatureNotFound,
    /// The superblock version is not supported.
    #[error("unsupported superblock version: {0}")]
    UnsupportedVersion(u8),
    /// Unexpected end of data.
    #[error("unexpected EOF: need {expected} bytes, have {available}")]
    UnexpectedEof {
        /// Number of bytes expected.
        expected: usize,
        /// Number of bytes actually available.
        available: usize,
    },
    /// Invalid offset size (must be 2, 4, or 8).
    #[error("invalid offset size: {0} (must be 2, 4, or 8)")]
    InvalidOffsetSize(u8),
    /// Invalid length size (must be 2, 4, or 8).
    #[error("invalid length size: {0} (must be 2, 4, or 8)")]
    InvalidLengthSize(u8),
    /// Invalid object header signature.
    #[error("invalid object header signature")]
    InvalidObjectHeaderSignature,
    /// Invalid object header version.
    #[error("invalid object header version: {0}")]
    InvalidObjectHeaderVersion(u8),
    /// Unknown message type that is marked as must-understand.
    #[error("unsupported message type {0:#06x} marked as must-understand")]
    UnsupportedMessage(u16),
    /// Jenkins lookup3 checksum mismatch.
    #[error("checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// The checksum stored in the file.
        expected: u32,
        /// The checksum we computed.
        computed: u32,
    },
    /// Datatype class outside 0..=10.
    #[error("invalid datatype class: {0}")]
    InvalidDatatypeClass(u8),
    /// Datatype version not valid for its class.
    #[error("invalid datatype version {version} for class {class}")]
    InvalidDatatypeVersion {
        /// Datatype class.
        class: u8,
        /// Version found.
        version: u8,
    },
    /// String padding value outside 0..=2.
    #[error("invalid string padding: {0}")]
    InvalidStringPadding(u8),
    /// Character set value outside 0..=1.
    #[error("invalid character set: {0}")]
    InvalidCharacterSet(u8),
    /// Datatype that this crate cannot serialize or decode.
    #[error("unsupported datatype: {0}")]
    UnsupportedDatatype(String),
    /// Dataspace version not 1 or 2.
    #[error("invalid dataspace version: {0}")]
    InvalidDataspaceVersion(u8),
    /// Dataspace type byte outside 0..=2.
    #[error("invalid dataspace type: {0}")]
    InvalidDataspaceType(u8),
    /// Data layout message version not supported.
    #[error("invalid data layout version: {0}")]
    InvalidLayoutVersion(u8),
    /// Data layout class or chunk index not supported.
    #[error("unsupported data layout: {0}")]
    UnsupportedLayout(String),
    /// Attribute message version not 1..=3.
    #[error("invalid attribute message version: {0}")]
    InvalidAttributeVersion(u8),
    /// Link message version not 1.
    #[error("invalid link message version: {0}")]
    InvalidLinkVersion(u8),
    /// Filter pipeline message version not 1 or 2.
    #[error("invalid filter pipeline version: {0}")]
    InvalidFilterPipelineVersion(u8),
    /// Filter that this crate cannot apply.
    #[error("unsupported filter: {0}")]
    UnsupportedFilter(u16),
    /// A filter failed while decoding a chunk.
    #[error("filter error: {0}")]
    FilterError(String),
    /// Inflating deflate-compressed data failed.
    #[error("decompression error: {0}")]
    DecompressionError(String),
    /// Deflating chunk data failed.
    #[error("compression error: {0}")]
    CompressionError(String),
    /// Local heap signature not `HEAP`.
    #[error("invalid local heap signature")]
    InvalidLocalHeapSignature,
    /// Local heap version not 0.
    #[error("invalid local heap version: {0}")]
    InvalidLocalHeapVersion(u8),
    /// Global heap collection signature not `GCOL`.
    #[error("invalid global heap signature")]
    InvalidGlobalHeapSignature,
    /// Global heap collection version not 1.
    #[error("invalid global heap version: {0}")]
    InvalidGlobalHeapVersion(u8),
    /// A heap ID names an object its collection does not hold.
    #[error("global heap object {index} not found in collection at {collection_address:#x}")]
    GlobalHeapObjectNotFound {
        /// Address of the collection.
        collection_address: u64,
        /// Object index from the heap ID.
        index: u32,
    },
    /// B-tree node signature not `TREE`.
    #[error("invalid B-tree signature")]
    InvalidBTreeSignature,
    /// B-tree node of an unexpected type.
    #[error("invalid B-tree node type: {0}")]
    InvalidBTreeNodeType(u8),
    /// Symbol table node signature not `SNOD`.
    #[error("invalid symbol table node signature")]
    InvalidSymbolTableNodeSignature,
    /// Symbol table node version not 1.
    #[error("invalid symbol table node version: {0}")]
    InvalidSymbolTableNodeVersion(u8),
    /// Root object is neither a new-style nor an old-style group.
    #[error("object at {0:#x} is not a group")]
    NotAGroup(u64),
    /// Object is not a dataset.
    #[error("`{0}` is not a dataset")]
    NotADataset(String),
    /// A required header message is missing.
    #[error("object `{name}` is missing its {message} message")]
    MissingMessage {
        /// Object name.
        name: String,
        /// Missing message kind.
        message: &'static str,
    },
    /// Name not present in the root group.
    #[error("no object named `{0}`")]
    PathNotFound(String),
    /// Dataset handed to the writer without a datatype or data.
    #[error("dataset `{0}` has no data")]
    DatasetMissingData(String),
    /// Raw byte count does not match shape times element size.
    #[error("dataset `{name}`: expected {expected} bytes of data, got {actual}")]
    DataSizeMismatch {
        /// Dataset name.
        name: String,
        /// Bytes implied by shape and datatype.
        expected: usize,
        /// Bytes supplied.
        actual: usize,
    },
    /// Header message larger than a 16-bit size field allows.
    #[error("header message of {0} bytes exceeds the 65535 byte limit")]
    MessageTooLarge(usize),
}
