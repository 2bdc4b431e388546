//! Error types for the container editor.

use std::path::PathBuf;

use planter_format::FormatError;

use crate::matrix::Axis;

/// Errors that can occur while editing a container.
#[derive(Debug, thiserror::Error)]
pub enum PlanterError {
    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Low-level HDF5 format error.
    #[error("HDF5 format error: {0}")]
    Format(#[from] FormatError),
    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// `create` refused to overwrite an existing file.
    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),
    /// No container is open.
    #[error("no container is open")]
    NotOpen,
    /// The container was opened read-only.
    #[error("container is open read-only")]
    ReadOnly,
    /// An appended block does not match the data along the fixed axis.
    #[error("inconsistent shape of the input data along the {axis} axis: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Axis whose length had to match.
        axis: Axis,
        /// Length of the stored data along `axis`.
        expected: usize,
        /// Length of the block along `axis`.
        actual: usize,
    },
    /// A mark ends before it starts.
    #[error("mark end sample {end} is before start sample {start}")]
    InvalidMarkRange {
        /// First sample of the mark.
        start: i64,
        /// Last sample of the mark.
        end: i64,
    },
    /// Unknown field selector.
    #[error("field `{field}` does not exist; use one of: {}", .allowed.join(", "))]
    InvalidField {
        /// The selector given.
        field: String,
        /// The selectors accepted.
        allowed: &'static [&'static str],
    },
    /// A per-channel label list has the wrong length.
    #[error("expected {expected} {what}, got {actual}")]
    LabelCount {
        /// Which labels, e.g. `"units"`.
        what: &'static str,
        /// Number of channels being created.
        expected: usize,
        /// Number of labels supplied.
        actual: usize,
    },
    /// `Data`, `ChannelSettings` and `Info` disagree on the channel count.
    #[error("channel count mismatch: Data has {data_rows} rows, ChannelSettings {settings}, Info {info}")]
    Misaligned {
        /// Rows of `Data`.
        data_rows: usize,
        /// Records in `ChannelSettings`, 0 when absent.
        settings: usize,
        /// Records in `Info`, 0 when absent.
        info: usize,
    },
    /// A well-known dataset has an unusable type or shape.
    #[error("dataset `{name}` cannot be used: {reason}")]
    UnexpectedDataset {
        /// Dataset name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Declared but not implemented.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, PlanterError>;
