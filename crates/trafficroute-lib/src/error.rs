use std::path::PathBuf;

use thiserror::Error;

use crate::graph::NodeId;

/// Convenient result alias for the route planner library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The road network provider could not deliver a graph for a segment.
    #[error("road network provider failed: {message}")]
    ProviderFetch { message: String },

    /// One leg of a multi-stop route could not be connected.
    #[error("could not find a path between stop {from_stop} and stop {to_stop}")]
    LegConnection { from_stop: usize, to_stop: usize },

    /// Raised when a route is requested with fewer than two waypoints.
    #[error("at least 2 stops are required to plan a route, got {count}")]
    TooFewWaypoints { count: usize },

    /// Raised when route planning was cancelled between legs.
    #[error("route planning was cancelled")]
    Cancelled,

    /// Raised when a node identifier is not part of the graph.
    #[error("node {id} is not part of the road graph")]
    NodeNotFound { id: NodeId },

    /// Raised when a graph contains no nodes to snap coordinates to.
    #[error("road graph for the segment around {center} contains no nodes")]
    EmptyGraph { center: String },

    /// No suitable cache directory could be resolved for storing graphs.
    #[error("failed to resolve cache directories for road graphs")]
    CacheDirsUnavailable,

    /// Raised when a `lat,lng` pair cannot be parsed.
    #[error("invalid coordinate '{input}': expected LAT,LNG in decimal degrees")]
    InvalidCoordinate { input: String },

    /// Raised when serializing a road graph for the cache fails.
    #[error("failed to serialize road graph: {message}")]
    GraphCacheSerialize { message: String },

    /// Raised when loading a cached road graph from a file fails.
    #[error("failed to load cached road graph from {path}: {message}")]
    GraphCacheLoad { path: PathBuf, message: String },

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper for HTTP client errors.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Wrapper for JSON decoding errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap any displayable provider failure as [`Error::ProviderFetch`].
    pub fn provider<E: std::fmt::Display>(error: E) -> Self {
        Error::ProviderFetch {
            message: error.to_string(),
        }
    }
}
