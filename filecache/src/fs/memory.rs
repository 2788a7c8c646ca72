//! In-memory filesystem and files. Used as the remote side in demos and as a
//! stand-in for the local store in tests.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use bytes::{Bytes, BytesMut};

use crate::error::{CacheError, Result};
use crate::fs::{FileReader, FileSystem, FileWriter};

type FileMap = HashMap<PathBuf, Bytes>;

/// Files are shared between clones, so a test can keep one handle while the
/// cache owns another.
#[derive(Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<RwLock<FileMap>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<P: Into<PathBuf>>(&self, path: P, data: impl Into<Bytes>) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), data.into());
    }

    pub fn contents(&self, path: &Path) -> Option<Bytes> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.files.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn not_found(context: &'static str, path: &Path) -> CacheError {
    CacheError::io(
        context,
        path,
        io::Error::new(io::ErrorKind::NotFound, "no such file"),
    )
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self
            .files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path))
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn FileReader>> {
        let data = self
            .contents(path)
            .ok_or_else(|| not_found("open memory file", path))?;
        Ok(Box::new(MemoryFile::new(path, data)))
    }

    fn create_file(&self, path: &Path) -> Result<Box<dyn FileWriter>> {
        self.insert(path, Bytes::new());
        Ok(Box::new(MemoryFileWriter {
            files: Arc::clone(&self.files),
            path: path.to_path_buf(),
            buf: BytesMut::new(),
        }))
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found("delete memory file", path))
    }
}

/// Appended data is buffered and becomes visible on `finalize` or drop.
/// Until then the file exists with its previously published content.
struct MemoryFileWriter {
    files: Arc<RwLock<FileMap>>,
    path: PathBuf,
    buf: BytesMut,
}

impl MemoryFileWriter {
    fn publish(&self) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.path.clone(), Bytes::copy_from_slice(&self.buf));
    }
}

impl FileWriter for MemoryFileWriter {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(data);
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.publish();
        Ok(())
    }
}

impl Drop for MemoryFileWriter {
    fn drop(&mut self) {
        self.publish();
    }
}

/// Immutable file backed by a `Bytes` buffer.
#[derive(Clone, Debug)]
pub struct MemoryFile {
    path: PathBuf,
    data: Bytes,
}

impl MemoryFile {
    pub fn new<P: Into<PathBuf>>(path: P, data: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
        }
    }
}

impl FileReader for MemoryFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let len = self.data.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
