use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use thiserror::Error;

pub const DEFAULT_TTL_SECS: u64 = 3600;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Error, Debug)]
#[error("invalid configuration: {}", .0.join("; "))]
pub struct ConfigError(pub Vec<String>);

#[derive(Clone, Debug)]
pub struct Config {
    pub cache_root: PathBuf,
    pub ttl_secs: u64,
    pub sweep_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
            ttl_secs: DEFAULT_TTL_SECS,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

/// `<user cache dir>/filecache`, falling back to the system temp directory.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("filecache")
}

impl Config {
    /// Check every setting and report all problems at once.
    pub fn validate(self) -> Result<Self, ConfigError> {
        let mut errors = Vec::new();
        if self.ttl_secs == 0 {
            errors.push("ttl must be greater than 0 seconds".to_string());
        }
        if self.sweep_interval.is_zero() {
            errors.push("sweep interval must be greater than 0 seconds".to_string());
        }
        if self.cache_root.is_file() {
            errors.push(format!(
                "cache root `{}` exists but is not a directory",
                self.cache_root.display()
            ));
        }
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError(errors))
        }
    }

    /// Cache directory assigned to `source`: the hex SHA-256 of the source
    /// string under the cache root.
    pub fn cache_dir_for(&self, source: &str) -> PathBuf {
        cache_dir_under(&self.cache_root, source)
    }
}

pub fn cache_dir_under(root: &Path, source: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    root.join(hex::encode(hasher.finalize()))
}
