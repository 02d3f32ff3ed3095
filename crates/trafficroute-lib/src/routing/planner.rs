//! Per-leg search strategies.
//!
//! The orchestrator only talks to [`LegPlanner`]; each algorithm lives in its
//! own planner so new ones can be added without touching leg sequencing.

use crate::graph::{NodeId, WeightedGraph};
use crate::path::{find_path, find_path_dijkstra, Path};

use super::RouteAlgorithm;

/// Search strategy used for every leg of a route.
pub trait LegPlanner: Send + Sync {
    /// The algorithm identifier for this planner.
    fn algorithm(&self) -> RouteAlgorithm;

    /// Lowest-cost path between two nodes of the leg's graph, if connected.
    fn find_path(&self, graph: &WeightedGraph, start: NodeId, goal: NodeId) -> Option<Path>;
}

/// A* planner guided by straight-line travel time to the goal.
#[derive(Debug, Clone, Default)]
pub struct AStarPlanner;

impl LegPlanner for AStarPlanner {
    fn algorithm(&self) -> RouteAlgorithm {
        RouteAlgorithm::AStar
    }

    fn find_path(&self, graph: &WeightedGraph, start: NodeId, goal: NodeId) -> Option<Path> {
        find_path(graph, start, goal)
    }
}

/// Dijkstra planner; explores more nodes than A* but needs no heuristic.
#[derive(Debug, Clone, Default)]
pub struct DijkstraPlanner;

impl LegPlanner for DijkstraPlanner {
    fn algorithm(&self) -> RouteAlgorithm {
        RouteAlgorithm::Dijkstra
    }

    fn find_path(&self, graph: &WeightedGraph, start: NodeId, goal: NodeId) -> Option<Path> {
        find_path_dijkstra(graph, start, goal)
    }
}

/// Planner implementing `algorithm`.
pub fn select_planner(algorithm: RouteAlgorithm) -> Box<dyn LegPlanner> {
    match algorithm {
        RouteAlgorithm::AStar => Box::new(AStarPlanner),
        RouteAlgorithm::Dijkstra => Box::new(DijkstraPlanner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_planner_matches_algorithm() {
        for algorithm in [RouteAlgorithm::AStar, RouteAlgorithm::Dijkstra] {
            assert_eq!(select_planner(algorithm).algorithm(), algorithm);
        }
    }
}
