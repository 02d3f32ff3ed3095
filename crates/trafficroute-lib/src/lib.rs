//! Traffic-aware road route planning.
//!
//! This crate fetches the road network around each leg of a multi-stop trip,
//! caches it on disk keyed by segment, scales edge travel times by observed
//! congestion and runs A* (or Dijkstra) between the snapped stops. Frontends
//! such as the CLI should only depend on the items exported here.
//!

#![deny(warnings)]

pub mod cache;
pub mod config;
pub mod error;
pub mod geo;
pub mod graph;
pub mod overpass;
pub mod path;
pub mod provider;
pub mod routing;
pub mod spatial;
pub mod traffic;
pub mod weighting;

pub use cache::{CacheEntry, CacheKey, CachedGraph, GraphCache};
pub use config::{default_cache_dir, EngineConfig};
pub use error::{Error, Result};
pub use geo::{haversine_distance, Coordinate};
pub use graph::{GraphEdge, GraphNode, NodeId, RoadGraph, WeightedGraph};
pub use overpass::OverpassClient;
pub use path::{find_path, find_path_dijkstra, Path};
pub use provider::{FileNetworkProvider, RoadNetworkProvider};
pub use routing::{CancellationToken, LegSummary, RouteAlgorithm, RouteEngine, RoutePlan};
pub use traffic::{traffic_multiplier, DistanceMatrixClient, NoTraffic, TrafficProvider};
pub use weighting::apply_traffic;

pub(crate) fn user_agent() -> String {
    format!("trafficroute-lib/{}", env!("CARGO_PKG_VERSION"))
}
