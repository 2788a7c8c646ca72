//! Read-through local caching of remote files.
//!
//! A [`cache::WholeFileCache`] downloads the full content of one remote file
//! into a cache directory on first read, commits it with a done marker, and
//! serves every later read from the local copy until it is evicted. The local
//! store, the remote source and the clock are injected through the traits in
//! [`fs`] and [`clock`].

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod fs;

pub use cache::{FileCache, FileCacheManager, WholeFileCache};
pub use error::{CacheError, Result};
