mod cli;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use clap::Parser;
use filecache::cache::{self, CacheStatus, FileCacheManager, WholeFileCache};
use filecache::config::Config;
use filecache::fs::{self, LocalFileSystem};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{e:?}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config().validate()?;
    match cli.command {
        Commands::Read {
            source,
            offset,
            length,
            cache_dir,
        } => {
            let cache_dir = cache_dir.unwrap_or_else(|| config.cache_dir_for(&source));
            read(&config, &source, &cache_dir, offset, length)
        }
        Commands::Status { cache_dir, json } => status(&cache_dir, json),
        Commands::Clean { cache_dir } => {
            cache::remove_cache_files(&LocalFileSystem::new(), &cache_dir)
                .with_context(|| format!("failed to clean {}", cache_dir.display()))
        }
        Commands::Serve { source, reads } => serve(&config, &source, reads),
    }
}

fn read(
    config: &Config,
    source: &str,
    cache_dir: &Path,
    offset: u64,
    length: Option<u64>,
) -> anyhow::Result<()> {
    let remote = fs::open_source(source).with_context(|| format!("failed to open {source}"))?;
    let size = remote.size();
    if offset > size {
        bail!("offset {offset} is past the end of {source} ({size} bytes)");
    }
    let length = usize::try_from(length.unwrap_or(size - offset))
        .context("requested length does not fit in memory")?;

    let cache = WholeFileCache::new(cache_dir, config.ttl_secs, remote);
    let data = cache
        .read(offset, length)
        .with_context(|| format!("failed to read {source} through {}", cache_dir.display()))?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&data)?;
    stdout.flush()?;
    Ok(())
}

fn status(cache_dir: &Path, json: bool) -> anyhow::Result<()> {
    let status = cache::inspect(&LocalFileSystem::new(), cache_dir)
        .with_context(|| format!("failed to inspect {}", cache_dir.display()))?;
    if json {
        println!("{}", serde_json::to_string(&status)?);
        return Ok(());
    }
    match status {
        CacheStatus::Empty => println!("{}: empty", cache_dir.display()),
        CacheStatus::Partial { data_size } => {
            println!("{}: partial ({data_size} bytes, no done marker)", cache_dir.display())
        }
        CacheStatus::Complete { data_size } => {
            println!("{}: complete ({data_size} bytes)", cache_dir.display())
        }
        CacheStatus::MarkerOnly => {
            println!("{}: done marker without data file", cache_dir.display())
        }
    }
    Ok(())
}

fn serve(config: &Config, source: &str, reads: usize) -> anyhow::Result<()> {
    let remote = fs::open_source(source).with_context(|| format!("failed to open {source}"))?;
    let size = usize::try_from(remote.size()).context("source does not fit in memory")?;
    let cache_dir = config.cache_dir_for(source);

    let manager = Arc::new(FileCacheManager::new());
    let cache = Arc::new(WholeFileCache::new(&cache_dir, config.ttl_secs, remote));
    manager.add(cache.clone());
    let sweeper = manager
        .start_sweeper(config.sweep_interval)
        .context("failed to start cache sweeper")?;

    let results = std::thread::scope(|s| {
        let handles: Vec<_> = (0..reads)
            .map(|_| s.spawn(|| cache.read(0, size).map(|data| data.len())))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().map_err(|_| anyhow!("reader thread panicked")))
            .collect::<anyhow::Result<Vec<_>>>()
    });
    sweeper.stop();

    for result in results? {
        let n = result.with_context(|| format!("failed to read {source}"))?;
        if n != size {
            bail!("read {n} bytes from {source}, expected {size}");
        }
    }
    info!(
        source,
        cache_dir = %cache_dir.display(),
        reads,
        size,
        "all reads served from cache"
    );
    println!("{reads} reads of {size} bytes served from {}", cache_dir.display());
    Ok(())
}
