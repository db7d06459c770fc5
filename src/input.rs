//! Choosing between handing a buffer to a backend and spooling it to a temporary file.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{TableIoError, TableIoResult};
use crate::format::FormatVariant;

/// Where a backend reads its input from.
#[derive(Debug)]
pub enum InputSource {
    /// A caller-owned file.
    Path(PathBuf),
    /// An in-memory buffer for formats that can read one directly.
    Buffer(Vec<u8>),
    /// A temporary file owned by this source.
    Spooled(SpooledFile),
}

impl InputSource {
    /// The filesystem path, if this source has one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            InputSource::Path(p) => Some(p),
            InputSource::Spooled(f) => Some(f.path()),
            InputSource::Buffer(_) => None,
        }
    }
}

/// A file written into its own temporary directory.
///
/// The directory and file are removed when this value is dropped.
#[derive(Debug)]
pub struct SpooledFile {
    path: PathBuf,
    dir: TempDir,
}

impl SpooledFile {
    /// Path of the spooled file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The temporary directory holding the file.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Prepare `buffer` for a backend serving `format`.
///
/// Stream-capable formats receive the buffer as-is. Otherwise a fresh temporary directory is
/// created for this call and the bytes are written to a file named after the final component of
/// `declared_name`.
pub fn prepare(format: FormatVariant, buffer: Vec<u8>, declared_name: &str) -> TableIoResult<InputSource> {
    if format.supports_stream_input() {
        return Ok(InputSource::Buffer(buffer));
    }

    let file_name = Path::new(declared_name)
        .file_name()
        .ok_or_else(|| TableIoError::InvalidOptions {
            message: format!("declared name '{declared_name}' has no file name"),
        })?;

    let dir = tempfile::Builder::new().prefix("table-io-").tempdir()?;
    let path = dir.path().join(file_name);
    fs::write(&path, &buffer)?;

    Ok(InputSource::Spooled(SpooledFile { path, dir }))
}
