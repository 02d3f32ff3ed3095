//! KD-tree index for snapping coordinates to the nearest road node.
//!
//! Nodes are projected onto the unit sphere (see
//! [`Coordinate::to_unit_vector`]) so that a squared-euclidean query in three
//! dimensions returns the node with the smallest great-circle distance,
//! including across the antimeridian.

use std::collections::HashSet;

use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;
use tracing::debug;

use crate::geo::{haversine_distance, Coordinate};
use crate::graph::{GraphNode, NodeId};

/// KD-tree bucket size (kiddo default).
const BUCKET_SIZE: usize = 32;

/// Nearest-node lookup over the nodes of one graph.
///
/// Nodes sharing a position are stored once; the first one in iteration
/// order answers queries for that position. Kiddo cannot hold more than
/// `BUCKET_SIZE` items at an identical point.
pub struct NodeIndex {
    /// Item type is an index into `nodes`.
    tree: KdTree<f64, usize, 3, BUCKET_SIZE, u32>,
    nodes: Vec<GraphNode>,
    point_count: usize,
}

impl NodeIndex {
    pub fn build<'a>(nodes: impl IntoIterator<Item = &'a GraphNode>) -> Self {
        let nodes: Vec<GraphNode> = nodes.into_iter().copied().collect();

        let mut tree: KdTree<f64, usize, 3, BUCKET_SIZE, u32> = KdTree::new();
        let mut seen: HashSet<[u64; 3]> = HashSet::with_capacity(nodes.len());
        for (index, node) in nodes.iter().enumerate() {
            let point = node.coordinate.to_unit_vector();
            if seen.insert(point.map(f64::to_bits)) {
                tree.add(&point, index);
            }
        }

        debug!(
            node_count = nodes.len(),
            point_count = seen.len(),
            "built node index"
        );

        Self {
            tree,
            nodes,
            point_count: seen.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Closest node to `coordinate` and its distance in meters.
    pub fn nearest(&self, coordinate: Coordinate) -> Option<(NodeId, f64)> {
        if self.nodes.is_empty() {
            return None;
        }

        let query = coordinate.to_unit_vector();
        let results = self.tree.nearest_n::<SquaredEuclidean>(&query, 1);

        results.into_iter().next().map(|neighbour| {
            let node = &self.nodes[neighbour.item];
            (node.id, haversine_distance(coordinate, node.coordinate))
        })
    }
}

impl std::fmt::Debug for NodeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeIndex")
            .field("node_count", &self.nodes.len())
            .field("point_count", &self.point_count)
            .finish()
    }
}
