//! Local caches of remote files.
//!
//! Submodules:
//! - `whole_file`: caches the full content of one remote file in a directory
//! - `manager`: registry of live caches plus the background idle sweeper
//!
//! A cache directory holds at most two files: the data file and a zero-length
//! done marker. The marker is created only after the data file has been fully
//! written and synced, and removed before the data file on eviction, so a
//! marker on disk always vouches for a complete data file beside it.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::fs::{FileReader, FileSystem};

pub mod manager;
pub mod whole_file;

pub use manager::{FileCacheManager, SweeperHandle};
pub use whole_file::WholeFileCache;

pub const WHOLE_FILE_CACHE_NAME: &str = "WHOLE_FILE_CACHE";
pub const WHOLE_FILE_CACHE_DONE_NAME: &str = "WHOLE_FILE_CACHE_DONE";

/// A `FileReader` that serves a remote file from a local cache directory.
pub trait FileCache: FileReader {
    fn cache_dir(&self) -> &Path;

    fn remote_file_reader(&self) -> &Arc<dyn FileReader>;

    /// Evict the local copy if it has been idle longer than the cache's TTL.
    fn clean_timeout_cache(&self) -> Result<()>;

    /// Evict the local copy unconditionally.
    fn clean_all_cache(&self) -> Result<()>;
}

pub fn cache_file_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(WHOLE_FILE_CACHE_NAME)
}

pub fn done_file_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(WHOLE_FILE_CACHE_DONE_NAME)
}

/// State of a cache directory as seen on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CacheStatus {
    Empty,
    /// Data file without a marker; the next population discards it.
    Partial { data_size: u64 },
    Complete { data_size: u64 },
    /// Marker without a data file. Only reachable through outside
    /// interference; population will fail to open the data file.
    MarkerOnly,
}

pub fn inspect(fs: &dyn FileSystem, cache_dir: &Path) -> Result<CacheStatus> {
    let cache_file = cache_file_path(cache_dir);
    let done = fs.exists(&done_file_path(cache_dir))?;
    let data_size = if fs.exists(&cache_file)? {
        Some(fs.open_file(&cache_file)?.size())
    } else {
        None
    };
    Ok(match (done, data_size) {
        (false, None) => CacheStatus::Empty,
        (false, Some(data_size)) => CacheStatus::Partial { data_size },
        (true, Some(data_size)) => CacheStatus::Complete { data_size },
        (true, None) => CacheStatus::MarkerOnly,
    })
}

/// Delete the marker, then the data file. Missing files are skipped.
pub fn remove_cache_files(fs: &dyn FileSystem, cache_dir: &Path) -> Result<()> {
    let cache_file = cache_file_path(cache_dir);
    let done_file = done_file_path(cache_dir);
    if fs.exists(&done_file)? {
        fs.delete_file(&done_file)?;
    }
    if fs.exists(&cache_file)? {
        fs.delete_file(&cache_file)?;
    }
    info!(cache = %cache_file.display(), "deleted local cache file");
    Ok(())
}
