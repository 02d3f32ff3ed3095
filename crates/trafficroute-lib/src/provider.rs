//! Road network sources.
//!
//! The cache only knows the [`RoadNetworkProvider`] trait. This module also
//! provides a local JSON source; the Overpass HTTP source lives in
//! [`crate::overpass`].

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::geo::{haversine_distance, Coordinate};
use crate::graph::RoadGraph;

/// Supplies the road graph around a point.
pub trait RoadNetworkProvider {
    fn fetch_graph(&self, center: Coordinate, radius_meters: f64) -> Result<RoadGraph>;
}

impl<F> RoadNetworkProvider for F
where
    F: Fn(Coordinate, f64) -> Result<RoadGraph>,
{
    fn fetch_graph(&self, center: Coordinate, radius_meters: f64) -> Result<RoadGraph> {
        self(center, radius_meters)
    }
}

/// Road network read from a JSON-encoded [`RoadGraph`] on disk.
///
/// Each fetch returns the nodes within the requested radius and the edges
/// between them, like an online provider would.
#[derive(Debug, Clone)]
pub struct FileNetworkProvider {
    path: PathBuf,
}

impl FileNetworkProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<RoadGraph> {
        let contents = fs::read_to_string(&self.path).map_err(|error| Error::ProviderFetch {
            message: format!("failed to read {}: {}", self.path.display(), error),
        })?;
        serde_json::from_str(&contents).map_err(|error| Error::ProviderFetch {
            message: format!("failed to parse {}: {}", self.path.display(), error),
        })
    }
}

impl RoadNetworkProvider for FileNetworkProvider {
    fn fetch_graph(&self, center: Coordinate, radius_meters: f64) -> Result<RoadGraph> {
        let full = self.read()?;
        let cropped = crop_to_radius(&full, center, radius_meters);
        debug!(
            path = %self.path.display(),
            %center,
            radius_meters,
            nodes = cropped.node_count(),
            edges = cropped.edge_count(),
            "read road graph from file"
        );
        Ok(cropped)
    }
}

/// Subgraph of nodes within `radius_meters` of `center` and the edges joining them.
pub fn crop_to_radius(graph: &RoadGraph, center: Coordinate, radius_meters: f64) -> RoadGraph {
    let mut cropped = RoadGraph::new();
    for node in graph.nodes() {
        if haversine_distance(center, node.coordinate) <= radius_meters {
            cropped.add_node(node.id, node.coordinate);
        }
    }
    for edge in graph.edges() {
        if cropped.contains(edge.source) && cropped.contains(edge.target) {
            cropped.add_edge(edge.clone());
        }
    }
    cropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphEdge;
    use std::io::Write;

    fn sample_graph() -> RoadGraph {
        let mut graph = RoadGraph::new();
        graph.add_node(1, Coordinate::new(0.0, 0.0));
        graph.add_node(2, Coordinate::new(0.0, 0.005));
        graph.add_node(3, Coordinate::new(0.0, 0.5));
        graph.add_two_way(GraphEdge::new(1, 2, 556.0));
        graph.add_two_way(GraphEdge::new(2, 3, 55_000.0));
        graph
    }

    #[test]
    fn crop_keeps_nodes_inside_radius() {
        let cropped = crop_to_radius(&sample_graph(), Coordinate::new(0.0, 0.0), 2_000.0);
        assert_eq!(cropped.node_count(), 2);
        assert_eq!(cropped.edge_count(), 2);
        assert!(!cropped.contains(3));
    }

    #[test]
    fn file_provider_reads_json() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        let json = serde_json::to_string(&sample_graph()).expect("serialize");
        file.write_all(json.as_bytes()).expect("write");

        let provider = FileNetworkProvider::new(file.path());
        let graph = provider
            .fetch_graph(Coordinate::new(0.0, 0.0), 100_000.0)
            .expect("fetch");
        assert_eq!(graph, sample_graph());
    }

    #[test]
    fn missing_file_is_a_provider_failure() {
        let provider = FileNetworkProvider::new("/nonexistent/road_graph.json");
        let error = provider
            .fetch_graph(Coordinate::new(0.0, 0.0), 2_000.0)
            .expect_err("missing file");
        assert!(matches!(error, Error::ProviderFetch { .. }));
    }
}
