//! Registry of live file caches and the background idle sweeper.
//!
//! A cache never schedules its own eviction. The manager holds every cache the
//! process created and periodically asks each one to drop its local copy if
//! it has been idle past its TTL.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::FileCache;
use crate::error::Result;

#[derive(Default)]
pub struct FileCacheManager {
    caches: Mutex<HashMap<PathBuf, Arc<dyn FileCache>>>,
}

impl FileCacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `cache` under its cache directory, returning the cache it
    /// replaced, if any.
    pub fn add(&self, cache: Arc<dyn FileCache>) -> Option<Arc<dyn FileCache>> {
        let dir = cache.cache_dir().to_path_buf();
        self.lock().insert(dir, cache)
    }

    pub fn remove(&self, cache_dir: &Path) -> Option<Arc<dyn FileCache>> {
        self.lock().remove(cache_dir)
    }

    pub fn get(&self, cache_dir: &Path) -> Option<Arc<dyn FileCache>> {
        self.lock().get(cache_dir).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Run `clean_timeout_cache` on every registered cache. Failures are
    /// logged and counted; the sweep continues with the next cache.
    pub fn clean_timeout_caches(&self) -> usize {
        self.for_each_cache("clean timeout cache", |cache| cache.clean_timeout_cache())
    }

    /// Run `clean_all_cache` on every registered cache, returning the number
    /// of failures.
    pub fn clean_all_caches(&self) -> usize {
        self.for_each_cache("clean all cache", |cache| cache.clean_all_cache())
    }

    fn for_each_cache<F>(&self, op: &'static str, f: F) -> usize
    where
        F: Fn(&dyn FileCache) -> Result<()>,
    {
        // Clean outside the registry lock; eviction blocks on each cache's own lock.
        let caches: Vec<Arc<dyn FileCache>> = self.lock().values().cloned().collect();
        let mut failures = 0;
        for cache in &caches {
            if let Err(e) = f(cache.as_ref()) {
                warn!(cache_dir = %cache.cache_dir().display(), error = %e, "{op} failed");
                failures += 1;
            }
        }
        debug!(op, caches = caches.len(), failures, "cache sweep finished");
        failures
    }

    /// Spawn a thread calling `clean_timeout_caches` every `interval` until the
    /// returned handle is stopped or dropped, or the manager itself is dropped.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) -> io::Result<SweeperHandle> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let manager: Weak<Self> = Arc::downgrade(self);
        let thread = std::thread::Builder::new()
            .name("filecache-sweeper".to_string())
            .spawn(move || {
                info!(interval_secs = interval.as_secs(), "cache sweeper started");
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let Some(manager) = manager.upgrade() else {
                                break;
                            };
                            manager.clean_timeout_caches();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("cache sweeper stopped");
            })?;
        Ok(SweeperHandle {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<dyn FileCache>>> {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct SweeperHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Signal the sweeper and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.stop.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("cache sweeper thread panicked");
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
