//! The open container file.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{info, warn};

use crate::config::StorageOptions;
use crate::container::Container;
use crate::error::{PlanterError, Result};
use crate::records::ChannelSettings;

/// How a container file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// `r`: read only, the file must exist.
    Read,
    /// `r+`: read and write, the file must exist.
    ReadWrite,
    /// `a`: read and write, created if missing.
    #[default]
    Append,
    /// `w`: created or truncated.
    Truncate,
    /// `w-` / `x`: created, failing if the file exists.
    Exclusive,
}

impl OpenMode {
    pub const ALL: [&'static str; 6] = ["r", "r+", "a", "w", "w-", "x"];

    pub fn as_str(self) -> &'static str {
        match self {
            OpenMode::Read => "r",
            OpenMode::ReadWrite => "r+",
            OpenMode::Append => "a",
            OpenMode::Truncate => "w",
            OpenMode::Exclusive => "w-",
        }
    }

    pub fn is_writable(self) -> bool {
        self != OpenMode::Read
    }

    fn options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options.read(true);
        match self {
            OpenMode::Read => {}
            OpenMode::ReadWrite => {
                options.write(true);
            }
            OpenMode::Append => {
                options.write(true).create(true);
            }
            OpenMode::Truncate => {
                options.write(true).create(true).truncate(true);
            }
            OpenMode::Exclusive => {
                options.write(true).create_new(true);
            }
        }
        options
    }
}

impl FromStr for OpenMode {
    type Err = PlanterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r" => Ok(OpenMode::Read),
            "r+" => Ok(OpenMode::ReadWrite),
            "a" => Ok(OpenMode::Append),
            "w" => Ok(OpenMode::Truncate),
            "w-" | "x" => Ok(OpenMode::Exclusive),
            _ => Err(PlanterError::InvalidField {
                field: s.to_string(),
                allowed: &Self::ALL,
            }),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn read_all(file: &mut File) -> io::Result<Vec<u8>> {
    let len = file.seek(SeekFrom::End(0))? as usize;
    file.seek(SeekFrom::Start(0))?;
    let mut data = vec![0u8; len];
    file.read_exact(&mut data)?;
    Ok(data)
}

/// An open container file and its decoded contents.
///
/// Edits go to the in-memory [`Container`]; the file is rewritten on
/// [`flush`](Self::flush), [`close`](Self::close) or drop.
#[derive(Debug)]
pub struct ContainerHandle {
    file: File,
    path: PathBuf,
    mode: OpenMode,
    container: Container,
    dirty: bool,
    storage: StorageOptions,
}

impl ContainerHandle {
    pub(crate) fn open(path: &Path, mode: OpenMode, template: &ChannelSettings, storage: StorageOptions) -> Result<Self> {
        let mut file = mode.options().open(path).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => PlanterError::AlreadyExists(path.to_path_buf()),
            _ => PlanterError::Io(e),
        })?;
        let bytes = match mode {
            OpenMode::Truncate | OpenMode::Exclusive => Vec::new(),
            _ => read_all(&mut file)?,
        };
        let fresh = bytes.is_empty();
        let container = if fresh {
            Container::default()
        } else {
            Container::load(bytes, template)?
        };
        info!("opened {} in mode {mode}", path.display());
        Ok(ContainerHandle {
            file,
            path: path.to_path_buf(),
            mode,
            container,
            // an empty file is not a container until it has been written once
            dirty: fresh && mode.is_writable(),
            storage,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_writable(&self) -> bool {
        self.mode.is_writable()
    }

    pub(crate) fn container(&self) -> &Container {
        &self.container
    }

    /// Fail with [`PlanterError::ReadOnly`] unless the file was opened for
    /// writing. Editors call this before deciding whether an edit is a no-op.
    pub(crate) fn ensure_writable(&self) -> Result<()> {
        if self.is_writable() {
            Ok(())
        } else {
            Err(PlanterError::ReadOnly)
        }
    }

    /// Mutable access to the model; marks the handle dirty.
    pub(crate) fn container_mut(&mut self) -> Result<&mut Container> {
        self.ensure_writable()?;
        self.dirty = true;
        Ok(&mut self.container)
    }

    /// Rewrite the file from the model if anything changed.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty || !self.is_writable() {
            return Ok(());
        }
        let bytes = self.container.to_bytes(self.storage)?;
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&bytes)?;
        self.file.sync_data()?;
        self.dirty = false;
        info!("flushed {} bytes to {}", bytes.len(), self.path.display());
        Ok(())
    }

    /// Flush and release the file.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        info!("closed {}", self.path.display());
        Ok(())
    }
}

impl Drop for ContainerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("failed to flush {} on drop: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;

    fn open(path: &Path, mode: OpenMode) -> Result<ContainerHandle> {
        ContainerHandle::open(path, mode, &ChannelSettings::default(), StorageOptions::default())
    }

    #[test]
    fn mode_strings() {
        for s in OpenMode::ALL {
            let mode: OpenMode = s.parse().unwrap();
            assert_eq!(mode.as_str().parse::<OpenMode>().unwrap(), mode);
        }
        assert_eq!("x".parse::<OpenMode>().unwrap(), OpenMode::Exclusive);
        assert!("rw".parse::<OpenMode>().is_err());
        assert_eq!(OpenMode::default(), OpenMode::Append);
    }

    #[test]
    fn append_creates_a_valid_empty_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.h5");
        open(&path, OpenMode::Append).unwrap().close().unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
        let h = open(&path, OpenMode::Read).unwrap();
        assert!(h.container().data.is_none());
    }

    #[test]
    fn exclusive_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.h5");
        drop(open(&path, OpenMode::Exclusive).unwrap());
        assert!(matches!(open(&path, OpenMode::Exclusive), Err(PlanterError::AlreadyExists(_))));
    }

    #[test]
    fn read_only_rejects_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.h5");
        open(&path, OpenMode::Truncate).unwrap().close().unwrap();
        let mut h = open(&path, OpenMode::Read).unwrap();
        assert!(matches!(h.container_mut(), Err(PlanterError::ReadOnly)));
        assert!(matches!(h.ensure_writable(), Err(PlanterError::ReadOnly)));
        assert!(matches!(open(&dir.path().join("missing.h5"), OpenMode::ReadWrite), Err(PlanterError::Io(_))));
    }

    #[test]
    fn drop_flushes_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.h5");
        {
            let mut h = open(&path, OpenMode::Append).unwrap();
            let c = h.container_mut().unwrap();
            c.data = Some(Matrix::zeros(0, 0));
            c.channels = Some(Vec::new());
        }
        let h = open(&path, OpenMode::ReadWrite).unwrap();
        assert_eq!(h.container().data.as_ref().map(Matrix::shape), Some((0, 0)));
    }
}
