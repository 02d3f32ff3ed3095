//! Multi-stop route planning.
//!
//! This module provides:
//! - [`RouteAlgorithm`] - Supported search algorithms (A*, Dijkstra)
//! - [`RouteEngine`] - Owns the graph cache and providers and plans routes
//! - [`RoutePlan`] - Concatenated path, snapped stop markers and per-leg summaries
//! - [`CancellationToken`] - Caller-side abort checked between legs
//!
//! Each pair of consecutive waypoints is a leg. A leg fetches (or reuses) the
//! road graph of its segment, weights it by traffic, snaps both ends to the
//! nearest road node and runs the selected [`LegPlanner`]. Any leg without a
//! path fails the whole route; partial routes are never returned.
//!
//! # Example
//!
//! ```ignore
//! use trafficroute_lib::{Coordinate, EngineConfig, RouteEngine};
//!
//! let config = EngineConfig::from_env(None)?;
//! let engine = RouteEngine::from_config(&config)?;
//! let plan = engine.plan_route(&[
//!     Coordinate::new(21.0285, 105.8542),
//!     Coordinate::new(21.0455, 105.8880),
//! ])?;
//! println!("{} points, {:.0}s", plan.path.len(), plan.total_cost_seconds);
//! ```

mod planner;

pub use planner::{select_planner, AStarPlanner, DijkstraPlanner, LegPlanner};

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::cache::GraphCache;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::geo::Coordinate;
use crate::graph::NodeId;
use crate::path::Path;
use crate::provider::RoadNetworkProvider;
use crate::traffic::TrafficProvider;
use crate::weighting::apply_traffic;

/// Supported search algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum RouteAlgorithm {
    /// A* search (heuristic guided).
    #[default]
    #[serde(rename = "a-star")]
    AStar,
    /// Dijkstra's algorithm.
    #[serde(rename = "dijkstra")]
    Dijkstra,
}

impl fmt::Display for RouteAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            RouteAlgorithm::AStar => "a-star",
            RouteAlgorithm::Dijkstra => "dijkstra",
        };
        f.write_str(value)
    }
}

impl FromStr for RouteAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a-star" | "astar" | "a*" => Ok(RouteAlgorithm::AStar),
            "dijkstra" => Ok(RouteAlgorithm::Dijkstra),
            other => Err(format!("unknown algorithm '{other}'")),
        }
    }
}

/// Cooperative cancellation flag shared between a caller and a running plan.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Summary of one computed leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegSummary {
    /// 1-based index of the leg's first stop.
    pub from_stop: usize,
    /// 1-based index of the leg's last stop.
    pub to_stop: usize,
    /// Cache key of the road graph used for the leg.
    pub segment: String,
    pub cache_hit: bool,
    pub traffic_multiplier: f64,
    pub start_node: NodeId,
    pub goal_node: NodeId,
    /// Number of nodes on the leg path.
    pub node_count: usize,
    pub cost_seconds: f64,
}

/// Planned multi-stop route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePlan {
    pub algorithm: RouteAlgorithm,
    /// Dense path across all legs, first stop first.
    pub path: Vec<Coordinate>,
    /// Stops snapped onto the road network, in stop order.
    pub stops: Vec<Coordinate>,
    pub legs: Vec<LegSummary>,
    pub total_cost_seconds: f64,
}

impl RoutePlan {
    pub fn leg_count(&self) -> usize {
        self.legs.len()
    }
}

/// Leg result before concatenation.
struct Leg {
    summary: LegSummary,
    snapped_start: Coordinate,
    snapped_goal: Coordinate,
    path: Path,
}

/// Route planner owning the graph cache and the external providers.
///
/// Providers are injected once and reused for every leg and every route.
pub struct RouteEngine {
    cache: GraphCache,
    network: Box<dyn RoadNetworkProvider + Send + Sync>,
    traffic: Box<dyn TrafficProvider + Send + Sync>,
    planner: Box<dyn LegPlanner>,
}

impl RouteEngine {
    pub fn new<N, T>(cache: GraphCache, network: N, traffic: T) -> Self
    where
        N: RoadNetworkProvider + Send + Sync + 'static,
        T: TrafficProvider + Send + Sync + 'static,
    {
        Self::from_parts(cache, Box::new(network), Box::new(traffic))
    }

    pub fn from_parts(
        cache: GraphCache,
        network: Box<dyn RoadNetworkProvider + Send + Sync>,
        traffic: Box<dyn TrafficProvider + Send + Sync>,
    ) -> Self {
        Self {
            cache,
            network,
            traffic,
            planner: select_planner(RouteAlgorithm::default()),
        }
    }

    /// Engine with the cache directory and providers selected by `config`.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self::from_parts(
            GraphCache::new(&config.cache_dir),
            config.network_provider()?,
            config.traffic_provider()?,
        ))
    }

    pub fn with_algorithm(mut self, algorithm: RouteAlgorithm) -> Self {
        self.planner = select_planner(algorithm);
        self
    }

    pub fn algorithm(&self) -> RouteAlgorithm {
        self.planner.algorithm()
    }

    pub fn cache(&self) -> &GraphCache {
        &self.cache
    }

    /// Plan a route visiting `waypoints` in order.
    pub fn plan_route(&self, waypoints: &[Coordinate]) -> Result<RoutePlan> {
        self.plan_route_with_cancel(waypoints, &CancellationToken::new())
    }

    /// Plan a route, checking `cancel` before each leg.
    pub fn plan_route_with_cancel(
        &self,
        waypoints: &[Coordinate],
        cancel: &CancellationToken,
    ) -> Result<RoutePlan> {
        if waypoints.len() < 2 {
            return Err(Error::TooFewWaypoints {
                count: waypoints.len(),
            });
        }

        let leg_total = waypoints.len() - 1;
        let mut path: Vec<Coordinate> = Vec::new();
        let mut stops: Vec<Coordinate> = Vec::with_capacity(waypoints.len());
        let mut legs: Vec<LegSummary> = Vec::with_capacity(leg_total);

        for (index, pair) in waypoints.windows(2).enumerate() {
            if cancel.is_cancelled() {
                info!(leg = index + 1, "route planning cancelled");
                return Err(Error::Cancelled);
            }

            info!(
                leg = index + 1,
                legs = leg_total,
                origin = %pair[0],
                destination = %pair[1],
                "planning leg"
            );
            let leg = self.plan_leg(index, pair[0], pair[1])?;

            stops.push(leg.snapped_start);
            if index + 1 == leg_total {
                stops.push(leg.snapped_goal);
            }

            append_leg(&mut path, &leg.path.coordinates);
            legs.push(leg.summary);
        }

        let total_cost_seconds = legs.iter().map(|leg| leg.cost_seconds).sum();
        info!(
            legs = legs.len(),
            points = path.len(),
            total_cost_seconds,
            "route planned"
        );

        Ok(RoutePlan {
            algorithm: self.algorithm(),
            path,
            stops,
            legs,
            total_cost_seconds,
        })
    }

    fn plan_leg(&self, index: usize, origin: Coordinate, destination: Coordinate) -> Result<Leg> {
        let from_stop = index + 1;
        let to_stop = index + 2;

        let cached = self
            .cache
            .get_or_fetch(origin, destination, self.network.as_ref())?;
        let key = cached.key;
        let graph = apply_traffic(cached.graph, origin, destination, self.traffic.as_ref());

        let empty = || Error::EmptyGraph {
            center: key.to_string(),
        };
        let start = graph.nearest_node(origin).ok_or_else(empty)?;
        let goal = graph.nearest_node(destination).ok_or_else(empty)?;
        let snapped_start = graph
            .coordinate(start)
            .ok_or(Error::NodeNotFound { id: start })?;
        let snapped_goal = graph
            .coordinate(goal)
            .ok_or(Error::NodeNotFound { id: goal })?;

        let path = self
            .planner
            .find_path(&graph, start, goal)
            .ok_or(Error::LegConnection { from_stop, to_stop })?;

        Ok(Leg {
            summary: LegSummary {
                from_stop,
                to_stop,
                segment: key.to_string(),
                cache_hit: cached.cache_hit,
                traffic_multiplier: graph.traffic_multiplier(),
                start_node: start,
                goal_node: goal,
                node_count: path.nodes.len(),
                cost_seconds: path.cost_seconds,
            },
            snapped_start,
            snapped_goal,
            path,
        })
    }
}

impl fmt::Debug for RouteEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEngine")
            .field("cache", &self.cache)
            .field("algorithm", &self.algorithm())
            .finish()
    }
}

/// Append a leg, dropping its first point when it repeats the junction.
fn append_leg(path: &mut Vec<Coordinate>, leg: &[Coordinate]) {
    let skip = usize::from(!path.is_empty() && path.last() == leg.first());
    path.extend_from_slice(&leg[skip.min(leg.len())..]);
}
