//! Cache inspection commands.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use trafficroute_cli::output::{render_cache_entries, render_cache_key, OutputFormat};
use trafficroute_lib::{CacheKey, Coordinate, EngineConfig, GraphCache};

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum CacheAction {
    /// List cached road graphs.
    List,
    /// Delete every cached road graph.
    Clear,
}

fn open_cache(cache_dir: Option<&Path>) -> Result<GraphCache> {
    let config = EngineConfig::from_env(cache_dir).context("failed to resolve configuration")?;
    Ok(GraphCache::new(config.cache_dir))
}

pub fn handle_cache_key(
    cache_dir: Option<&Path>,
    from: Coordinate,
    to: Coordinate,
    format: OutputFormat,
) -> Result<()> {
    let cache = open_cache(cache_dir)?;
    let key = CacheKey::for_segment(from, to);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    render_cache_key(&mut out, &key, &cache.path_for(&key), format)?;
    out.flush()?;
    Ok(())
}

pub fn handle_cache(cache_dir: Option<&Path>, action: CacheAction, format: OutputFormat) -> Result<()> {
    let cache = open_cache(cache_dir)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match action {
        CacheAction::List => {
            let entries = cache
                .entries()
                .with_context(|| format!("failed to list {}", cache.dir().display()))?;
            render_cache_entries(&mut out, cache.dir(), &entries, format)?;
        }
        CacheAction::Clear => {
            let removed = cache
                .clear()
                .with_context(|| format!("failed to clear {}", cache.dir().display()))?;
            match format {
                OutputFormat::Text => writeln!(
                    out,
                    "Removed {} cached road graphs from {}",
                    removed,
                    cache.dir().display()
                )?,
                OutputFormat::Json => writeln!(
                    out,
                    "{}",
                    serde_json::json!({ "removed": removed, "dir": cache.dir() })
                )?,
            }
        }
    }

    out.flush()?;
    Ok(())
}
