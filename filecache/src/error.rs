use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

/// Every failure produced by the cache is an I/O failure of some kind, either
/// reported by a filesystem collaborator or detected as a byte-count mismatch.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("{context}: {}: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "short read from {}: expected {expected} bytes at offset {offset}, got {actual}",
        path.display()
    )]
    ShortRead {
        path: PathBuf,
        offset: u64,
        expected: usize,
        actual: usize,
    },
}

impl CacheError {
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        CacheError::Io {
            context,
            path: path.into(),
            source,
        }
    }

    pub fn short_read(path: &Path, offset: u64, expected: usize, actual: usize) -> Self {
        CacheError::ShortRead {
            path: path.to_path_buf(),
            offset,
            expected,
            actual,
        }
    }

    /// The path the failing operation was working on.
    pub fn path(&self) -> &Path {
        match self {
            CacheError::Io { path, .. } | CacheError::ShortRead { path, .. } => path,
        }
    }

    /// `std::io::ErrorKind` of the failure; short reads map to `UnexpectedEof`.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            CacheError::Io { source, .. } => source.kind(),
            CacheError::ShortRead { .. } => io::ErrorKind::UnexpectedEof,
        }
    }
}

/// Attach the operation name and path to a `std::io::Result`.
pub(crate) trait IoContext<T> {
    fn io_context(self, context: &'static str, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context(self, context: &'static str, path: &Path) -> Result<T> {
        self.map_err(|source| CacheError::io(context, path, source))
    }
}
