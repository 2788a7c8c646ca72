//! WholeFileCache: read-through cache holding the full content of one remote
//! file in a local directory.
//!
//! The first read downloads the whole remote file into `WHOLE_FILE_CACHE`,
//! syncs it, then creates `WHOLE_FILE_CACHE_DONE`. Later reads, including
//! those from a new process, are served from the local copy as long as the
//! marker exists. A data file without a marker is treated as the leftover of
//! an interrupted download and fetched again.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use super::{FileCache, cache_file_path, done_file_path, remove_cache_files};
use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, Result};
use crate::fs::{FileReader, FileSystem, LocalFileSystem};

struct LocalCopy {
    reader: Box<dyn FileReader>,
    size: u64,
}

pub struct WholeFileCache {
    cache_dir: PathBuf,
    ttl_secs: u64,
    remote: Arc<dyn FileReader>,
    fs: Arc<dyn FileSystem>,
    clock: Arc<dyn Clock>,
    // Unix seconds of the last successful read or population. The read path
    // stores it without holding `local`; racing stores may lose an update,
    // which only shifts the idle estimate.
    last_access: AtomicI64,
    local: RwLock<Option<LocalCopy>>,
}

impl WholeFileCache {
    /// Create an empty cache for `remote` in `cache_dir`, backed by the local
    /// filesystem. Nothing is read or written until the first read.
    pub fn new<P: Into<PathBuf>>(
        cache_dir: P,
        ttl_secs: u64,
        remote: Arc<dyn FileReader>,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            cache_dir: cache_dir.into(),
            ttl_secs,
            remote,
            fs: Arc::new(LocalFileSystem::new()),
            last_access: AtomicI64::new(clock.now()),
            clock,
            local: RwLock::new(None),
        }
    }

    /// Store the cache files through `fs` instead of the local filesystem.
    pub fn with_filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Measure idle time with `clock`. Resets the last access time to the
    /// clock's current time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.last_access.store(clock.now(), Ordering::Relaxed);
        self.clock = clock;
        self
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn last_access(&self) -> i64 {
        self.last_access.load(Ordering::Relaxed)
    }

    /// Whether a local copy is currently open.
    pub fn is_populated(&self) -> bool {
        self.read_local().is_some()
    }

    /// Size of the open local copy, 0 when not populated.
    pub fn local_size(&self) -> u64 {
        self.read_local().as_ref().map_or(0, |local| local.size)
    }

    /// Read exactly `length` bytes at `offset`, downloading the remote file
    /// first if there is no local copy yet. A range reaching past the end of
    /// the file fails with `ShortRead` before any buffer is allocated.
    pub fn read(&self, offset: u64, length: usize) -> Result<Bytes> {
        self.with_local(|local| {
            let available = local.size.saturating_sub(offset);
            if !u64::try_from(length).is_ok_and(|len| len <= available) {
                let actual = usize::try_from(available).unwrap_or(usize::MAX);
                error!(
                    cache = %local.reader.path().display(),
                    offset,
                    required = length,
                    available,
                    "read range past end of cache file"
                );
                return Err(CacheError::short_read(
                    local.reader.path(),
                    offset,
                    length,
                    actual,
                ));
            }
            let mut buf = vec![0u8; length];
            Self::read_local_copy(local, offset, &mut buf)?;
            Ok(Bytes::from(buf))
        })
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.with_local(|local| Self::read_local_copy(local, offset, buf))
    }

    /// Run `f` against the open local copy, populating it first when needed.
    /// The last access time is updated only when `f` succeeds.
    fn with_local<T>(&self, mut f: impl FnMut(&LocalCopy) -> Result<T>) -> Result<T> {
        loop {
            if !self.is_populated() {
                self.populate()?;
            }
            let guard = self.read_local();
            // Evicted between population and this read; populate again.
            let Some(local) = guard.as_ref() else {
                continue;
            };
            let value = f(local)?;
            self.touch();
            return Ok(value);
        }
    }

    fn read_local_copy(local: &LocalCopy, offset: u64, buf: &mut [u8]) -> Result<()> {
        let bytes_read = local.reader.read_at(offset, buf).inspect_err(|e| {
            warn!(
                cache = %local.reader.path().display(),
                error = %e,
                "read local cache file failed"
            );
        })?;
        if bytes_read != buf.len() {
            error!(
                cache = %local.reader.path().display(),
                bytes_read,
                required = buf.len(),
                "read cache file failed"
            );
            return Err(CacheError::short_read(
                local.reader.path(),
                offset,
                buf.len(),
                bytes_read,
            ));
        }
        Ok(())
    }

    /// Make sure a complete local copy exists and open it.
    ///
    /// Holds the write lock throughout, so concurrent callers wait for the
    /// first one and then find the copy already open.
    fn populate(&self) -> Result<()> {
        let mut local = self.write_local();
        if local.is_some() {
            return Ok(());
        }

        let cache_file = cache_file_path(&self.cache_dir);
        let done_file = done_file_path(&self.cache_dir);
        let done_exists = self.fs.exists(&done_file).inspect_err(|e| {
            warn!(error = %e, "check local cache done file exist failed");
        })?;

        if done_exists {
            debug!(cache = %cache_file.display(), "reusing completed local cache file");
        } else {
            let cache_exists = self.fs.exists(&cache_file).inspect_err(|e| {
                warn!(error = %e, "check local cache file exist failed");
            })?;
            if cache_exists {
                debug!(cache = %cache_file.display(), "discarding incomplete local cache file");
                self.fs.delete_file(&cache_file).inspect_err(|e| {
                    warn!(error = %e, "delete incomplete local cache file failed");
                })?;
            }

            info!(
                remote = %self.remote.path().display(),
                cache = %cache_file.display(),
                "download cache file from remote file"
            );
            self.download(&cache_file)?;

            let mut marker = self.fs.create_file(&done_file).inspect_err(|e| {
                warn!(error = %e, "create local done file failed");
            })?;
            marker.finalize()?;
        }

        let reader = self.fs.open_file(&cache_file).inspect_err(|e| {
            warn!(error = %e, "open local cache file failed");
        })?;
        let size = reader.size();
        *local = Some(LocalCopy { reader, size });
        self.touch();
        info!(
            remote = %self.remote.path().display(),
            cache = %cache_file.display(),
            size,
            "create cache file from remote file successfully"
        );
        Ok(())
    }

    /// Fetch the whole remote file and write it to `cache_file`.
    fn download(&self, cache_file: &Path) -> Result<()> {
        let remote_path = self.remote.path();
        let size = self.remote.size();
        let alloc_err = |detail: String| {
            CacheError::io(
                "allocate download buffer",
                remote_path,
                io::Error::new(io::ErrorKind::OutOfMemory, detail),
            )
        };
        let len = usize::try_from(size).map_err(|_| alloc_err(format!("{size} bytes")))?;

        let mut buf = Vec::new();
        buf.try_reserve_exact(len).map_err(|e| alloc_err(format!("{size} bytes: {e}")))?;
        buf.resize(len, 0);
        let bytes_read = self.remote.read_at(0, &mut buf).inspect_err(|e| {
            warn!(remote = %remote_path.display(), error = %e, "read remote file failed");
        })?;
        if bytes_read != len {
            error!(
                remote = %remote_path.display(),
                bytes_read,
                file_size = len,
                "read remote file failed"
            );
            return Err(CacheError::short_read(remote_path, 0, len, bytes_read));
        }

        let mut writer = self.fs.create_file(cache_file).inspect_err(|e| {
            warn!(error = %e, "create local cache file failed");
        })?;
        writer.append(&buf).inspect_err(|e| {
            warn!(error = %e, "write local cache file failed");
        })?;
        writer.finalize()
    }

    pub fn clean_timeout_cache(&self) -> Result<()> {
        let idle = self.clock.now() - self.last_access();
        if idle > i64::try_from(self.ttl_secs).unwrap_or(i64::MAX) {
            debug!(cache_dir = %self.cache_dir.display(), idle, "cache idle past ttl");
            self.clean_cache_internal()?;
        }
        Ok(())
    }

    pub fn clean_all_cache(&self) -> Result<()> {
        self.clean_cache_internal()
    }

    fn clean_cache_internal(&self) -> Result<()> {
        let mut local = self.write_local();
        *local = None;
        remove_cache_files(self.fs.as_ref(), &self.cache_dir).inspect_err(|e| {
            warn!(error = %e, "delete local cache files failed");
        })
    }

    fn touch(&self) {
        self.last_access.store(self.clock.now(), Ordering::Relaxed);
    }

    // Every writer replaces the whole `Option` in one assignment, so the
    // value behind a poisoned lock is still consistent.
    fn read_local(&self) -> RwLockReadGuard<'_, Option<LocalCopy>> {
        self.local.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_local(&self) -> RwLockWriteGuard<'_, Option<LocalCopy>> {
        self.local.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reads through the cache. Unlike a plain file, a range extending past the
/// end of the file is an error rather than a short count.
impl FileReader for WholeFileCache {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.read_exact_at(offset, buf)?;
        Ok(buf.len())
    }

    fn size(&self) -> u64 {
        self.remote.size()
    }

    fn path(&self) -> &Path {
        self.remote.path()
    }
}

impl FileCache for WholeFileCache {
    fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn remote_file_reader(&self) -> &Arc<dyn FileReader> {
        &self.remote
    }

    fn clean_timeout_cache(&self) -> Result<()> {
        WholeFileCache::clean_timeout_cache(self)
    }

    fn clean_all_cache(&self) -> Result<()> {
        WholeFileCache::clean_all_cache(self)
    }
}
