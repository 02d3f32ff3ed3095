use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::geo::{haversine_distance, Coordinate};
use crate::graph::{NodeId, WeightedGraph};

/// Reference speed (m/s, about 100 km/h) that turns the straight-line distance
/// to the goal into a lower bound on the remaining travel time.
pub const HEURISTIC_SPEED_MPS: f64 = 28.0;

/// Lowest-cost route through one weighted graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Path {
    /// Nodes visited, start first.
    pub nodes: Vec<NodeId>,
    /// Coordinates of `nodes`, start first.
    pub coordinates: Vec<Coordinate>,
    /// Sum of traffic weights along the path in seconds.
    pub cost_seconds: f64,
}

/// Find the lowest-cost path from `start` to `goal` using A* search.
///
/// The heuristic is the great-circle distance to `goal` divided by
/// [`HEURISTIC_SPEED_MPS`]. Returns `None` when `goal` is unreachable or either
/// node is missing from the graph.
pub fn find_path(graph: &WeightedGraph, start: NodeId, goal: NodeId) -> Option<Path> {
    let target = graph.coordinate(goal)?;
    search(graph, start, goal, |node| {
        graph
            .coordinate(node)
            .map(|position| haversine_distance(position, target) / HEURISTIC_SPEED_MPS)
            .unwrap_or(0.0)
    })
}

/// Find the lowest-cost path with Dijkstra's algorithm (A* without a heuristic).
pub fn find_path_dijkstra(graph: &WeightedGraph, start: NodeId, goal: NodeId) -> Option<Path> {
    search(graph, start, goal, |_| 0.0)
}

/// Best-first search ordered by `g + heuristic`.
///
/// Stale heap entries are not removed when a node improves; they are skipped
/// on pop because their recorded `g` no longer matches the best known one.
fn search<H>(graph: &WeightedGraph, start: NodeId, goal: NodeId, heuristic: H) -> Option<Path>
where
    H: Fn(NodeId) -> f64,
{
    if !graph.contains(start) || !graph.contains(goal) {
        return None;
    }
    if start == goal {
        return Some(build_path(graph, vec![start], 0.0));
    }

    let mut g_score: HashMap<NodeId, f64> = HashMap::new();
    let mut parents: HashMap<NodeId, NodeId> = HashMap::new();
    let mut queue = BinaryHeap::new();
    let mut expanded = 0usize;

    g_score.insert(start, 0.0);
    queue.push(SearchEntry::new(start, 0.0, heuristic(start)));

    while let Some(entry) = queue.pop() {
        let current_score = match g_score.get(&entry.node) {
            Some(score) if *score < entry.cost.0 => continue,
            Some(score) => *score,
            None => continue,
        };

        if entry.node == goal {
            debug!(expanded, cost = current_score, "search reached goal");
            let nodes = reconstruct_path(&parents, start, goal);
            return Some(build_path(graph, nodes, current_score));
        }
        expanded += 1;

        for neighbour in graph.neighbours(entry.node) {
            let tentative = current_score + neighbour.weight;
            if tentative < *g_score.get(&neighbour.target).unwrap_or(&f64::INFINITY) {
                g_score.insert(neighbour.target, tentative);
                parents.insert(neighbour.target, entry.node);
                queue.push(SearchEntry::new(
                    neighbour.target,
                    tentative,
                    heuristic(neighbour.target),
                ));
            }
        }
    }

    debug!(expanded, "search exhausted without reaching goal");
    None
}

fn reconstruct_path(parents: &HashMap<NodeId, NodeId>, start: NodeId, goal: NodeId) -> Vec<NodeId> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match parents.get(&current) {
            Some(&parent) => {
                path.push(parent);
                current = parent;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

fn build_path(graph: &WeightedGraph, nodes: Vec<NodeId>, cost_seconds: f64) -> Path {
    let coordinates = nodes
        .iter()
        .filter_map(|&node| graph.coordinate(node))
        .collect();
    Path {
        nodes,
        coordinates,
        cost_seconds,
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct SearchEntry {
    node: NodeId,
    cost: FloatOrd,
    estimate: FloatOrd,
}

impl SearchEntry {
    fn new(node: NodeId, cost: f64, heuristic: f64) -> Self {
        Self {
            node,
            cost: FloatOrd(cost),
            estimate: FloatOrd(cost + heuristic),
        }
    }
}

impl Ord for SearchEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering so BinaryHeap becomes a min-heap by estimate.
        other
            .estimate
            .cmp(&self.estimate)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for SearchEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
