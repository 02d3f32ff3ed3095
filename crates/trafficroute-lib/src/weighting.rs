//! Free-flow and traffic-adjusted edge weights for a road graph.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::geo::{haversine_distance, Coordinate};
use crate::graph::{GraphEdge, RoadGraph, WeightedGraph};
use crate::traffic::{traffic_multiplier, TrafficProvider};

/// Reference speed (m/s, about 30 km/h) for the free-flow estimate of a
/// whole origin to destination span.
pub const SPAN_REFERENCE_SPEED_MPS: f64 = 8.3;

/// Speed used when nothing in the graph says otherwise.
const FALLBACK_SPEED_KPH: f64 = 40.0;

/// Typical speeds per `highway` class when the graph has no posted limits for it.
static DEFAULT_HIGHWAY_SPEEDS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        ("motorway", 100.0),
        ("motorway_link", 60.0),
        ("trunk", 80.0),
        ("trunk_link", 50.0),
        ("primary", 60.0),
        ("primary_link", 40.0),
        ("secondary", 50.0),
        ("secondary_link", 40.0),
        ("tertiary", 40.0),
        ("tertiary_link", 30.0),
        ("unclassified", 30.0),
        ("residential", 30.0),
        ("living_street", 10.0),
        ("road", 30.0),
    ])
});

/// Apply free-flow travel times and the segment's traffic multiplier to every
/// edge, then build the search structures.
///
/// One multiplier is computed for the whole segment from a single traffic
/// lookup over `origin -> destination`, assuming congestion is uniform across
/// the cached area. Lookup failures degrade to a multiplier of `1.0`.
pub fn apply_traffic<T>(
    mut graph: RoadGraph,
    origin: Coordinate,
    destination: Coordinate,
    traffic: &T,
) -> WeightedGraph
where
    T: TrafficProvider + ?Sized,
{
    add_travel_times(&mut graph);

    let free_flow_seconds = haversine_distance(origin, destination) / SPAN_REFERENCE_SPEED_MPS;
    let real_seconds = match traffic.duration_in_traffic(origin, destination) {
        Ok(duration) => duration,
        Err(error) => {
            warn!(
                %error,
                %origin,
                %destination,
                "traffic lookup failed, assuming free-flow conditions"
            );
            None
        }
    };
    let multiplier = traffic_multiplier(free_flow_seconds, real_seconds);

    for edge in graph.edges_mut() {
        let base = edge.travel_time_seconds.unwrap_or(0.0);
        edge.traffic_weight_seconds = Some(base * multiplier);
    }

    debug!(
        free_flow_seconds,
        real_seconds = ?real_seconds,
        multiplier,
        edges = graph.edge_count(),
        "applied traffic weights"
    );

    WeightedGraph::from_weighted(graph, multiplier)
}

/// Fill in `travel_time_seconds` for edges the provider left without one.
///
/// Speed resolution per edge: posted limit, then the mean posted limit of its
/// `highway` class in this graph, then the mean of all posted limits in this
/// graph, then [`DEFAULT_HIGHWAY_SPEEDS`], then [`FALLBACK_SPEED_KPH`].
/// Provider values that are negative or not finite are recomputed.
pub fn add_travel_times(graph: &mut RoadGraph) {
    let speeds = SpeedTable::from_edges(graph.edges());

    for edge in graph.edges_mut() {
        if let Some(seconds) = edge.travel_time_seconds {
            if seconds.is_finite() && seconds >= 0.0 {
                continue;
            }
        }

        let speed_kph = speeds.speed_for(edge);
        let length = if edge.length_meters.is_finite() {
            edge.length_meters.max(0.0)
        } else {
            0.0
        };
        edge.travel_time_seconds = Some(length / (speed_kph * 1000.0 / 3600.0));
    }
}

/// Observed mean speeds of a graph, grouped by highway class.
struct SpeedTable {
    by_highway: HashMap<String, f64>,
    overall: Option<f64>,
}

impl SpeedTable {
    fn from_edges(edges: &[GraphEdge]) -> Self {
        let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
        let mut total = (0.0, 0usize);

        for edge in edges {
            let Some(speed) = edge.max_speed_kph.filter(|s| usable_speed(*s)) else {
                continue;
            };
            total.0 += speed;
            total.1 += 1;
            if let Some(highway) = &edge.highway {
                let entry = sums.entry(highway.clone()).or_insert((0.0, 0));
                entry.0 += speed;
                entry.1 += 1;
            }
        }

        let by_highway = sums
            .into_iter()
            .map(|(highway, (sum, count))| (highway, sum / count as f64))
            .collect();
        let overall = (total.1 > 0).then(|| total.0 / total.1 as f64);

        Self {
            by_highway,
            overall,
        }
    }

    fn speed_for(&self, edge: &GraphEdge) -> f64 {
        if let Some(speed) = edge.max_speed_kph.filter(|s| usable_speed(*s)) {
            return speed;
        }

        let highway = edge.highway.as_deref();
        highway
            .and_then(|h| self.by_highway.get(h).copied())
            .or(self.overall)
            .or_else(|| highway.and_then(|h| DEFAULT_HIGHWAY_SPEEDS.get(h).copied()))
            .unwrap_or(FALLBACK_SPEED_KPH)
    }
}

fn usable_speed(speed: f64) -> bool {
    speed.is_finite() && speed > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};

    const ORIGIN: Coordinate = Coordinate::new(21.0285, 105.8542);
    const DESTINATION: Coordinate = Coordinate::new(21.0455, 105.8880);

    fn line_graph(edges: Vec<GraphEdge>) -> RoadGraph {
        let mut graph = RoadGraph::new();
        graph.add_node(1, Coordinate::new(21.0, 105.8));
        graph.add_node(2, Coordinate::new(21.001, 105.8));
        graph.add_node(3, Coordinate::new(21.002, 105.8));
        for edge in edges {
            graph.add_edge(edge);
        }
        graph
    }

    fn travel_times(graph: &RoadGraph) -> Vec<f64> {
        graph
            .edges()
            .iter()
            .map(|edge| edge.travel_time_seconds.expect("weighted"))
            .collect()
    }

    #[test]
    fn posted_speed_drives_travel_time() {
        let mut graph = line_graph(vec![GraphEdge::new(1, 2, 1_000.0).with_max_speed(36.0)]);
        add_travel_times(&mut graph);
        assert!((travel_times(&graph)[0] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn provider_travel_time_is_kept() {
        let mut graph = line_graph(vec![GraphEdge::new(1, 2, 1_000.0)
            .with_max_speed(36.0)
            .with_travel_time(7.0)]);
        add_travel_times(&mut graph);
        assert_eq!(travel_times(&graph), vec![7.0]);
    }

    #[test]
    fn missing_speed_uses_class_mean_then_graph_mean() {
        let mut graph = line_graph(vec![
            GraphEdge::new(1, 2, 100.0)
                .with_highway("primary")
                .with_max_speed(50.0),
            GraphEdge::new(2, 3, 100.0)
                .with_highway("primary")
                .with_max_speed(70.0),
            GraphEdge::new(2, 1, 1_200.0).with_highway("primary"),
            GraphEdge::new(3, 2, 1_200.0).with_highway("residential"),
        ]);
        add_travel_times(&mut graph);

        let times = travel_times(&graph);
        // primary mean is 60 km/h; residential has no data so the graph mean applies.
        assert!((times[2] - 72.0).abs() < 1e-9, "got {}", times[2]);
        assert!((times[3] - 72.0).abs() < 1e-9, "got {}", times[3]);
    }

    #[test]
    fn graphs_without_speeds_use_defaults() {
        let mut graph = line_graph(vec![
            GraphEdge::new(1, 2, 1_000.0).with_highway("residential"),
            GraphEdge::new(2, 3, 1_000.0).with_highway("footway"),
            GraphEdge::new(3, 2, 1_000.0),
        ]);
        add_travel_times(&mut graph);

        let times = travel_times(&graph);
        assert!((times[0] - 120.0).abs() < 1e-9);
        assert!((times[1] - 90.0).abs() < 1e-9);
        assert!((times[2] - 90.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_provider_times_are_recomputed() {
        let mut graph = line_graph(vec![GraphEdge::new(1, 2, 1_000.0)
            .with_max_speed(36.0)
            .with_travel_time(f64::NAN)]);
        add_travel_times(&mut graph);
        assert!((travel_times(&graph)[0] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn segment_multiplier_scales_every_edge() {
        let graph = line_graph(vec![
            GraphEdge::new(1, 2, 100.0).with_travel_time(10.0),
            GraphEdge::new(2, 3, 100.0).with_travel_time(20.0),
        ]);
        let free_flow = haversine_distance(ORIGIN, DESTINATION) / SPAN_REFERENCE_SPEED_MPS;
        let congested = move |_: Coordinate, _: Coordinate| -> Result<Option<f64>> {
            Ok(Some(free_flow * 2.0))
        };

        let weighted = apply_traffic(graph, ORIGIN, DESTINATION, &congested);
        assert!((weighted.traffic_multiplier() - 2.0).abs() < 1e-9);
        assert!((weighted.edge_weight(1, 2).expect("edge") - 20.0).abs() < 1e-9);
        assert!((weighted.edge_weight(2, 3).expect("edge") - 40.0).abs() < 1e-9);

        let edge = &weighted.road_graph().edges()[0];
        assert_eq!(edge.travel_time_seconds, Some(10.0));
    }

    #[test]
    fn lookup_errors_fall_back_to_free_flow() {
        let graph = line_graph(vec![GraphEdge::new(1, 2, 100.0).with_travel_time(10.0)]);
        let failing = |_: Coordinate, _: Coordinate| -> Result<Option<f64>> {
            Err(Error::provider("quota exceeded"))
        };

        let weighted = apply_traffic(graph, ORIGIN, DESTINATION, &failing);
        assert_eq!(weighted.traffic_multiplier(), 1.0);
        assert_eq!(weighted.edge_weight(1, 2), Some(10.0));
    }
}
