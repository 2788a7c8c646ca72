use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use filecache::config::{self, Config, DEFAULT_SWEEP_INTERVAL_SECS, DEFAULT_TTL_SECS};

#[derive(Parser, Debug)]
#[command(name = "filecache")]
#[command(version, about = "Read-through whole-file cache for remote files", long_about = None)]
pub(crate) struct Cli {
    /// Root directory for per-source cache directories
    #[arg(long, global = true, env = "FILECACHE_ROOT")]
    pub(crate) cache_root: Option<PathBuf>,

    /// Seconds a cache may stay idle before it is evicted
    #[arg(long, global = true, env = "FILECACHE_TTL_SECS", default_value_t = DEFAULT_TTL_SECS)]
    pub(crate) ttl: u64,

    /// Seconds between idle sweeps
    #[arg(
        long,
        global = true,
        env = "FILECACHE_SWEEP_INTERVAL_SECS",
        default_value_t = DEFAULT_SWEEP_INTERVAL_SECS
    )]
    pub(crate) sweep_interval: u64,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    #[command(about = "Read a byte range of SOURCE through the cache and write it to stdout")]
    Read {
        /// Local path or http(s) URL of the remote file
        #[arg(value_name = "SOURCE")]
        source: String,

        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Number of bytes to read; defaults to the rest of the file
        #[arg(long)]
        length: Option<u64>,

        /// Cache directory to use instead of the one derived from SOURCE
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    #[command(about = "Show the on-disk state of a cache directory")]
    Status {
        #[arg(value_name = "CACHE_DIR")]
        cache_dir: PathBuf,

        #[arg(long)]
        json: bool,
    },
    #[command(about = "Remove the cached files in a cache directory")]
    Clean {
        #[arg(value_name = "CACHE_DIR")]
        cache_dir: PathBuf,
    },
    #[command(about = "Read SOURCE from several threads with the idle sweeper running")]
    Serve {
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Number of concurrent full reads
        #[arg(long, default_value_t = 4)]
        reads: usize,
    },
}

impl Cli {
    pub(crate) fn config(&self) -> Config {
        Config {
            cache_root: self
                .cache_root
                .clone()
                .unwrap_or_else(config::default_cache_root),
            ttl_secs: self.ttl,
            sweep_interval: Duration::from_secs(self.sweep_interval),
        }
    }
}
