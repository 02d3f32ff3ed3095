use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use tracing::debug;

use crate::error::{Error, Result};
use crate::overpass::{OverpassClient, DEFAULT_OVERPASS_URL};
use crate::provider::{FileNetworkProvider, RoadNetworkProvider};
use crate::traffic::{DistanceMatrixClient, NoTraffic, TrafficProvider};

const CACHE_DIR_ENV: &str = "TRAFFICROUTE_CACHE_DIR";
const MAPS_API_KEY_ENV: &str = "TRAFFICROUTE_MAPS_API_KEY";
const OVERPASS_URL_ENV: &str = "TRAFFICROUTE_OVERPASS_URL";
const GRAPH_SOURCE_ENV: &str = "TRAFFICROUTE_GRAPH_SOURCE";

const CACHE_SUBDIR: &str = "graphs";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime settings for a [`crate::RouteEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Directory holding persisted road graphs.
    pub cache_dir: PathBuf,
    /// Distance-matrix API key. Traffic lookups are skipped without one.
    pub maps_api_key: Option<String>,
    /// Overpass API interpreter endpoint.
    pub overpass_url: String,
    /// JSON road graph used instead of Overpass when set.
    pub graph_source: Option<PathBuf>,
    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
}

impl EngineConfig {
    /// Configuration with defaults for everything except the cache directory.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            maps_api_key: None,
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            graph_source: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Resolve configuration from the environment.
    ///
    /// Resolution order for the cache directory:
    /// 1. Explicit `cache_dir` argument when provided.
    /// 2. `TRAFFICROUTE_CACHE_DIR` environment variable.
    /// 3. Platform-specific cache directory joined with `graphs`.
    ///
    /// Empty environment values are treated as unset.
    pub fn from_env(cache_dir: Option<&Path>) -> Result<Self> {
        let cache_dir = match cache_dir {
            Some(explicit) => explicit.to_path_buf(),
            None => match non_empty_var(CACHE_DIR_ENV) {
                Some(dir) => PathBuf::from(dir),
                None => default_cache_dir()?,
            },
        };

        let mut config = Self::new(cache_dir);
        config.maps_api_key = non_empty_var(MAPS_API_KEY_ENV);
        if let Some(url) = non_empty_var(OVERPASS_URL_ENV) {
            config.overpass_url = url;
        }
        config.graph_source = non_empty_var(GRAPH_SOURCE_ENV).map(PathBuf::from);

        debug!(
            cache_dir = %config.cache_dir.display(),
            traffic = config.maps_api_key.is_some(),
            graph_source = ?config.graph_source,
            "resolved engine configuration"
        );
        Ok(config)
    }

    /// Road network provider selected by this configuration.
    pub fn network_provider(&self) -> Result<Box<dyn RoadNetworkProvider + Send + Sync>> {
        match &self.graph_source {
            Some(path) => Ok(Box::new(FileNetworkProvider::new(path))),
            None => Ok(Box::new(OverpassClient::new(
                &self.overpass_url,
                self.request_timeout,
            )?)),
        }
    }

    /// Traffic provider selected by this configuration.
    pub fn traffic_provider(&self) -> Result<Box<dyn TrafficProvider + Send + Sync>> {
        match &self.maps_api_key {
            Some(key) => Ok(Box::new(DistanceMatrixClient::new(
                key.clone(),
                self.request_timeout,
            )?)),
            None => Ok(Box::new(NoTraffic)),
        }
    }
}

/// Platform cache location for road graphs.
pub fn default_cache_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "trafficroute", "trafficroute")
        .ok_or(Error::CacheDirsUnavailable)?;
    Ok(dirs.cache_dir().join(CACHE_SUBDIR))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_cache_dir_wins() {
        let config = EngineConfig::from_env(Some(Path::new("/tmp/explicit-cache"))).expect("config");
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/explicit-cache"));
    }

    #[test]
    fn defaults_are_offline_friendly() {
        let config = EngineConfig::new("/tmp/cache");
        assert_eq!(config.maps_api_key, None);
        assert_eq!(config.graph_source, None);
        assert_eq!(config.overpass_url, DEFAULT_OVERPASS_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn graph_source_selects_file_provider() {
        let mut config = EngineConfig::new("/tmp/cache");
        config.graph_source = Some(PathBuf::from("/nonexistent/graph.json"));
        let provider = config.network_provider().expect("provider");

        let error = provider
            .fetch_graph(crate::Coordinate::new(0.0, 0.0), 2_000.0)
            .expect_err("file is missing");
        assert!(error.to_string().contains("/nonexistent/graph.json"));
    }
}
