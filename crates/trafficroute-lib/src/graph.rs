use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::spatial::NodeIndex;

/// Identifier of a road network node, unique within one graph.
pub type NodeId = i64;

/// Road network node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub coordinate: Coordinate,
}

/// Directed road edge. Two-way roads are stored as one edge per direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: NodeId,
    pub target: NodeId,
    /// Length of the road section in meters.
    pub length_meters: f64,
    /// OpenStreetMap `highway` class, used to impute missing speeds.
    #[serde(default)]
    pub highway: Option<String>,
    /// Posted speed limit in km/h when known.
    #[serde(default)]
    pub max_speed_kph: Option<f64>,
    /// Free-flow traversal time. Providers may supply it; weighting fills it otherwise.
    #[serde(default)]
    pub travel_time_seconds: Option<f64>,
    /// Traffic adjusted cost used by the search. Set by weighting.
    #[serde(default)]
    pub traffic_weight_seconds: Option<f64>,
}

impl GraphEdge {
    pub fn new(source: NodeId, target: NodeId, length_meters: f64) -> Self {
        Self {
            source,
            target,
            length_meters,
            highway: None,
            max_speed_kph: None,
            travel_time_seconds: None,
            traffic_weight_seconds: None,
        }
    }

    pub fn with_highway(mut self, highway: impl Into<String>) -> Self {
        self.highway = Some(highway.into());
        self
    }

    pub fn with_max_speed(mut self, kph: f64) -> Self {
        self.max_speed_kph = Some(kph);
        self
    }

    pub fn with_travel_time(mut self, seconds: f64) -> Self {
        self.travel_time_seconds = Some(seconds);
        self
    }

    /// Same road metadata in the opposite direction, without derived weights.
    pub fn reversed(&self) -> Self {
        Self {
            source: self.target,
            target: self.source,
            traffic_weight_seconds: None,
            ..self.clone()
        }
    }
}

/// Raw road graph for one geographic segment, as fetched or loaded from cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RoadGraphData", into = "RoadGraphData")]
pub struct RoadGraph {
    nodes: BTreeMap<NodeId, GraphNode>,
    edges: Vec<GraphEdge>,
}

/// Serialized layout: node list instead of a map so JSON fixtures stay readable.
#[derive(Serialize, Deserialize)]
struct RoadGraphData {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl From<RoadGraphData> for RoadGraph {
    fn from(data: RoadGraphData) -> Self {
        Self {
            nodes: data.nodes.into_iter().map(|node| (node.id, node)).collect(),
            edges: data.edges,
        }
    }
}

impl From<RoadGraph> for RoadGraphData {
    fn from(graph: RoadGraph) -> Self {
        Self {
            nodes: graph.nodes.into_values().collect(),
            edges: graph.edges,
        }
    }
}

impl RoadGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node.
    pub fn add_node(&mut self, id: NodeId, coordinate: Coordinate) {
        self.nodes.insert(id, GraphNode { id, coordinate });
    }

    pub fn add_edge(&mut self, edge: GraphEdge) {
        self.edges.push(edge);
    }

    /// Add an edge in both directions.
    pub fn add_two_way(&mut self, edge: GraphEdge) {
        let reverse = edge.reversed();
        self.edges.push(edge);
        self.edges.push(reverse);
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub(crate) fn edges_mut(&mut self) -> &mut [GraphEdge] {
        &mut self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Collapsed edge used during search: cheapest parallel edge to `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    pub target: NodeId,
    pub weight: f64,
}

/// Road graph with traffic weights applied, ready for searching.
///
/// Immutable once built. Parallel edges are collapsed to their minimum
/// `traffic_weight_seconds` so expansion never rescans them.
#[derive(Debug, Clone)]
pub struct WeightedGraph {
    graph: RoadGraph,
    adjacency: Arc<HashMap<NodeId, Vec<Neighbour>>>,
    index: Arc<NodeIndex>,
    traffic_multiplier: f64,
}

impl WeightedGraph {
    /// Build the search structures from a graph whose edges already carry
    /// `traffic_weight_seconds`. Edges without a usable weight, or that point
    /// at unknown nodes, are left out of the adjacency.
    pub(crate) fn from_weighted(graph: RoadGraph, traffic_multiplier: f64) -> Self {
        let mut cheapest: HashMap<NodeId, HashMap<NodeId, f64>> = HashMap::new();
        for edge in graph.edges() {
            let Some(weight) = edge.traffic_weight_seconds else {
                continue;
            };
            if !weight.is_finite() || weight < 0.0 {
                continue;
            }
            if !graph.contains(edge.source) || !graph.contains(edge.target) {
                continue;
            }

            let slot = cheapest
                .entry(edge.source)
                .or_default()
                .entry(edge.target)
                .or_insert(weight);
            if weight < *slot {
                *slot = weight;
            }
        }

        let mut adjacency: HashMap<NodeId, Vec<Neighbour>> = HashMap::new();
        for node in graph.nodes() {
            let mut neighbours: Vec<Neighbour> = cheapest
                .remove(&node.id)
                .unwrap_or_default()
                .into_iter()
                .map(|(target, weight)| Neighbour { target, weight })
                .collect();
            neighbours.sort_by_key(|neighbour| neighbour.target);
            adjacency.insert(node.id, neighbours);
        }

        let index = NodeIndex::build(graph.nodes());

        Self {
            graph,
            adjacency: Arc::new(adjacency),
            index: Arc::new(index),
            traffic_multiplier,
        }
    }

    /// Collapsed outgoing edges of `node`.
    pub fn neighbours(&self, node: NodeId) -> &[Neighbour] {
        self.adjacency
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Weight of the cheapest edge from `source` to `target`, if connected.
    pub fn edge_weight(&self, source: NodeId, target: NodeId) -> Option<f64> {
        self.neighbours(source)
            .iter()
            .find(|neighbour| neighbour.target == target)
            .map(|neighbour| neighbour.weight)
    }

    pub fn coordinate(&self, node: NodeId) -> Option<Coordinate> {
        self.graph.node(node).map(|node| node.coordinate)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.graph.contains(node)
    }

    /// Node closest to `coordinate` by great-circle distance.
    pub fn nearest_node(&self, coordinate: Coordinate) -> Option<NodeId> {
        self.index.nearest(coordinate).map(|(id, _)| id)
    }

    /// Segment-wide multiplier applied to every edge.
    pub fn traffic_multiplier(&self) -> f64 {
        self.traffic_multiplier
    }

    /// Underlying graph including the derived edge weights.
    pub fn road_graph(&self) -> &RoadGraph {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }
}
