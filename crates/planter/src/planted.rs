//! The container façade.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::info;

use crate::attributes::{AttrValue, AttributeEditor, FS_ATTR, GENERATED_BY_ATTR, LEFT_INDEX_ATTR, RIGHT_INDEX_ATTR};
use crate::config::PlanterConfig;
use crate::error::{PlanterError, Result};
use crate::handle::{ContainerHandle, OpenMode};
use crate::marks::MarkEditor;
use crate::series::SeriesEditor;

/// File extension of container files.
pub const EXTENSION: &str = ".h5";

/// `path` with [`EXTENSION`] appended unless it already ends with it,
/// compared case-insensitively.
pub fn with_extension(path: &Path) -> PathBuf {
    if path.to_string_lossy().to_lowercase().ends_with(EXTENSION) {
        return path.to_path_buf();
    }
    let mut s = OsString::from(path.as_os_str());
    s.push(EXTENSION);
    PathBuf::from(s)
}

/// A Signal Plant container: at most one open file plus the editors that
/// work on it.
///
/// ```no_run
/// use planter::{Matrix, PlantedContainer};
///
/// let mut planter = PlantedContainer::new();
/// planter.create("recording", Some(2000.0))?;
/// planter
///     .series()?
///     .create_dataset(Matrix::zeros(4, 200), &Default::default())?;
/// planter.close()?;
/// # Ok::<(), planter::PlanterError>(())
/// ```
#[derive(Debug, Default)]
pub struct PlantedContainer {
    config: PlanterConfig,
    handle: Option<ContainerHandle>,
}

impl PlantedContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PlanterConfig) -> Self {
        PlantedContainer { config, handle: None }
    }

    pub fn config(&self) -> &PlanterConfig {
        &self.config
    }

    fn open_handle(&mut self, path: &Path, mode: OpenMode) -> Result<&mut ContainerHandle> {
        self.close()?;
        let handle = ContainerHandle::open(path, mode, &self.config.channel_template, self.config.storage())?;
        Ok(self.handle.insert(handle))
    }

    /// Create a new container, appending the `.h5` extension if needed,
    /// and store the sampling frequency (`NaN` when unknown) and the
    /// provenance attributes. Returns the path actually used.
    pub fn create<P: AsRef<Path>>(&mut self, path: P, sampling_frequency: Option<f32>) -> Result<PathBuf> {
        let path = with_extension(path.as_ref());
        let attributes = [
            (FS_ATTR, AttrValue::F32Array(vec![sampling_frequency.unwrap_or(f32::NAN)])),
            (GENERATED_BY_ATTR, AttrValue::String(self.config.generated_by.clone())),
            (LEFT_INDEX_ATTR, AttrValue::I64(self.config.left_index)),
            (RIGHT_INDEX_ATTR, AttrValue::I64(self.config.right_index)),
        ];
        let handle = match self.open_handle(&path, OpenMode::Exclusive) {
            Ok(handle) => handle,
            Err(e @ PlanterError::AlreadyExists(_)) => {
                info!("{e}");
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        let container = handle.container_mut()?;
        for (name, value) in attributes {
            container.attributes.insert(name.to_string(), value);
        }
        info!("created {}", path.display());
        Ok(path)
    }

    /// Open an existing container, closing the current one first.
    pub fn open<P: AsRef<Path>>(&mut self, path: P, mode: OpenMode) -> Result<()> {
        self.open_handle(path.as_ref(), mode)?;
        Ok(())
    }

    /// Write pending edits and close the file. Does nothing when no file is
    /// open.
    pub fn close(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle.close(),
            None => Ok(()),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.handle_mut()?.flush()
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Whether the open file accepts edits; `false` when nothing is open.
    pub fn is_writable(&self) -> bool {
        self.handle.as_ref().is_some_and(ContainerHandle::is_writable)
    }

    pub fn path(&self) -> Option<&Path> {
        self.handle.as_ref().map(ContainerHandle::path)
    }

    pub fn mode(&self) -> Option<OpenMode> {
        self.handle.as_ref().map(ContainerHandle::mode)
    }

    fn handle_mut(&mut self) -> Result<&mut ContainerHandle> {
        self.handle.as_mut().ok_or(PlanterError::NotOpen)
    }

    pub fn series(&mut self) -> Result<SeriesEditor<'_>> {
        let handle = self.handle.as_mut().ok_or(PlanterError::NotOpen)?;
        Ok(SeriesEditor::new(handle, &self.config))
    }

    pub fn marks(&mut self) -> Result<MarkEditor<'_>> {
        Ok(MarkEditor::new(self.handle_mut()?))
    }

    pub fn attributes(&mut self) -> Result<AttributeEditor<'_>> {
        Ok(AttributeEditor::new(self.handle_mut()?))
    }

    /// Combine several containers into one.
    pub fn merge<P: AsRef<Path>>(&mut self, _output: P, _inputs: &[PathBuf]) -> Result<()> {
        Err(PlanterError::NotImplemented("merge"))
    }

    /// Extract the samples under a mark into a new container.
    pub fn file_from_mark(&mut self, _group: &str, _info: &str) -> Result<()> {
        Err(PlanterError::NotImplemented("file_from_mark"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_appended_once() {
        assert_eq!(with_extension(Path::new("rec")), PathBuf::from("rec.h5"));
        assert_eq!(with_extension(Path::new("rec.H5")), PathBuf::from("rec.H5"));
        assert_eq!(with_extension(Path::new("a.b")), PathBuf::from("a.b.h5"));
    }

    #[test]
    fn closed_container_has_no_editors() {
        let mut p = PlantedContainer::new();
        assert!(!p.is_open());
        assert!(!p.is_writable());
        assert!(p.close().is_ok());
        assert!(matches!(p.series().err(), Some(PlanterError::NotOpen)));
        assert!(matches!(p.flush(), Err(PlanterError::NotOpen)));
        assert!(matches!(p.merge("out.h5", &[]), Err(PlanterError::NotImplemented("merge"))));
    }
}
