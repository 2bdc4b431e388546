//! Structural editor for Signal Plant HDF5 containers.
//!
//! A container holds a 2-D `float32` sample matrix (`Data`, one row per
//! channel), per-channel display settings and provenance
//! (`ChannelSettings`, `Info`), annotation intervals (`Marks`) and root
//! attributes such as the sampling frequency `Fs`. [`PlantedContainer`]
//! opens one file at a time and hands out three editors over it:
//!
//! - [`SeriesEditor`] grows and shrinks the matrix and keeps one metadata
//!   row per channel,
//! - [`MarkEditor`] appends and filters marks,
//! - [`AttributeEditor`] manages root attributes.
//!
//! Files are decoded into memory on open and rewritten in full on flush,
//! close or drop.

pub mod attributes;
pub mod config;
mod container;
pub mod error;
pub mod handle;
pub mod marks;
pub mod matrix;
pub mod planted;
pub mod records;
pub mod series;

pub use attributes::{AttrKind, AttrValue, AttributeEditor};
pub use config::PlanterConfig;
pub use error::{PlanterError, Result};
pub use handle::OpenMode;
pub use marks::{MarkEditor, MarkField, MarkTags};
pub use matrix::{Axis, Matrix};
pub use planted::PlantedContainer;
pub use records::{Channel, ChannelInfo, ChannelSettings, Mark};
pub use series::{ChannelField, ChannelSpec, Labels, SeriesEditor};
