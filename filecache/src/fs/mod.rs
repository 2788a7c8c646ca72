//! Filesystem collaborators used by the cache.
//!
//! Submodules:
//! - `local`: `std::fs` backed local filesystem (the default cache store)
//! - `memory`: in-memory filesystem and files, used for tests and demos
//! - `http`: read-only remote file served over HTTP range requests
//!
//! The cache only ever talks to these traits, so the local store and the
//! remote source are injected capabilities rather than globals.
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

pub mod http;
pub mod local;
pub mod memory;

pub use http::HttpFile;
pub use local::{LocalFileReader, LocalFileSystem, LocalFileWriter};
pub use memory::{MemoryFile, MemoryFileSystem};

/// Random-access, read-only view of a file.
pub trait FileReader: Send + Sync {
    /// Read up to `buf.len()` bytes starting at `offset`, returning how many
    /// were read. A short count means the end of the file was reached.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Size of the file in bytes.
    fn size(&self) -> u64;

    fn path(&self) -> &Path;
}

/// Sequential writer for a freshly created file.
pub trait FileWriter: Send {
    fn append(&mut self, data: &[u8]) -> Result<()>;

    /// Flush buffered data and make it durable. Content appended after
    /// `finalize` is not guaranteed to be persisted.
    fn finalize(&mut self) -> Result<()>;
}

pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> Result<bool>;

    fn open_file(&self, path: &Path) -> Result<Box<dyn FileReader>>;

    /// Create `path` (and missing parent directories), truncating any
    /// existing content.
    fn create_file(&self, path: &Path) -> Result<Box<dyn FileWriter>>;

    fn delete_file(&self, path: &Path) -> Result<()>;
}

/// Open a remote source: `http://` and `https://` URLs are read over HTTP,
/// anything else is treated as a local path.
pub fn open_source(source: &str) -> Result<Arc<dyn FileReader>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        Ok(Arc::new(HttpFile::open(source)?))
    } else {
        Ok(Arc::new(LocalFileReader::open(source)?))
    }
}
