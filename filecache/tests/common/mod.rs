#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use filecache::cache::{WHOLE_FILE_CACHE_DONE_NAME, WHOLE_FILE_CACHE_NAME};
use filecache::error::{CacheError, Result};
use filecache::fs::{FileReader, FileSystem, FileWriter, LocalFileSystem, MemoryFile};

/// Remote file that counts reads and can be slowed down to widen races.
pub struct CountingRemote {
    inner: MemoryFile,
    reads: AtomicUsize,
    delay: Duration,
}

impl CountingRemote {
    pub fn new(data: &'static [u8]) -> Arc<Self> {
        Self::with_delay(data, Duration::ZERO)
    }

    pub fn with_delay(data: &'static [u8], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryFile::new("/remote/data.bin", data),
            reads: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl FileReader for CountingRemote {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.inner.read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn path(&self) -> &Path {
        self.inner.path()
    }
}

/// Remote file that reports more bytes than it can deliver until healed.
pub struct TruncatedRemote {
    inner: MemoryFile,
    reported: u64,
    healed: AtomicBool,
}

impl TruncatedRemote {
    pub fn new(data: &'static [u8], reported: u64) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryFile::new("/remote/truncated.bin", data),
            reported,
            healed: AtomicBool::new(false),
        })
    }

    pub fn heal(&self) {
        self.healed.store(true, Ordering::SeqCst);
    }
}

impl FileReader for TruncatedRemote {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if self.healed.load(Ordering::SeqCst) {
            return self.inner.read_at(offset, buf);
        }
        let n = self.inner.read_at(offset, buf)?;
        Ok(n.saturating_sub(1))
    }

    fn size(&self) -> u64 {
        if self.healed.load(Ordering::SeqCst) {
            self.inner.size()
        } else {
            self.reported
        }
    }

    fn path(&self) -> &Path {
        self.inner.path()
    }
}

/// Local filesystem that refuses to create the done marker while armed,
/// standing in for a crash between writing the data and committing it.
#[derive(Default)]
pub struct MarkerFailingFs {
    inner: LocalFileSystem,
    armed: AtomicBool,
}

impl MarkerFailingFs {
    pub fn armed() -> Arc<Self> {
        let fs = Self::default();
        fs.armed.store(true, Ordering::SeqCst);
        Arc::new(fs)
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }
}

impl FileSystem for MarkerFailingFs {
    fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path)
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn FileReader>> {
        self.inner.open_file(path)
    }

    fn create_file(&self, path: &Path) -> Result<Box<dyn FileWriter>> {
        let is_marker = path.file_name().is_some_and(|n| n == WHOLE_FILE_CACHE_DONE_NAME);
        if is_marker && self.armed.load(Ordering::SeqCst) {
            return Err(CacheError::io(
                "create local file",
                path,
                std::io::Error::other("injected failure"),
            ));
        }
        self.inner.create_file(path)
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        self.inner.delete_file(path)
    }
}

/// Local filesystem that refuses to delete the data file while armed, so an
/// eviction stops right after the marker is gone.
#[derive(Default)]
pub struct DataDeleteFailingFs {
    inner: LocalFileSystem,
    armed: AtomicBool,
}

impl DataDeleteFailingFs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }
}

impl FileSystem for DataDeleteFailingFs {
    fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path)
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn FileReader>> {
        self.inner.open_file(path)
    }

    fn create_file(&self, path: &Path) -> Result<Box<dyn FileWriter>> {
        self.inner.create_file(path)
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        let is_data = path.file_name().is_some_and(|n| n == WHOLE_FILE_CACHE_NAME);
        if is_data && self.armed.load(Ordering::SeqCst) {
            return Err(CacheError::io(
                "delete local file",
                path,
                std::io::Error::other("injected failure"),
            ));
        }
        self.inner.delete_file(path)
    }
}
