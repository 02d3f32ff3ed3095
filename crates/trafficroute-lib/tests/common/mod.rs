#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use trafficroute_lib::{Coordinate, GraphEdge, NodeId, RoadGraph, Result};

pub const GRID_ORIGIN: Coordinate = Coordinate::new(21.020, 105.840);
pub const GRID_STEP_DEGREES: f64 = 0.001;

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures")
}

pub fn sample_graph_path() -> PathBuf {
    fixtures_dir().join("sample_road_graph.json")
}

pub fn grid_node(row: usize, col: usize, cols: usize) -> NodeId {
    (row * cols + col) as NodeId + 1
}

pub fn grid_coordinate(row: usize, col: usize) -> Coordinate {
    Coordinate::new(
        GRID_ORIGIN.lat + row as f64 * GRID_STEP_DEGREES,
        GRID_ORIGIN.lng + col as f64 * GRID_STEP_DEGREES,
    )
}

/// Two-way street grid with deterministic, uneven speed limits between
/// 20 and 90 km/h so that the cheapest path is not the geometric one.
pub fn grid_graph(rows: usize, cols: usize, seed: u64) -> RoadGraph {
    let mut graph = RoadGraph::new();
    for row in 0..rows {
        for col in 0..cols {
            graph.add_node(grid_node(row, col, cols), grid_coordinate(row, col));
        }
    }

    let mut state = seed.max(1);
    let mut next_speed = move || {
        // xorshift64
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        20.0 + (state % 71) as f64
    };

    for row in 0..rows {
        for col in 0..cols {
            let here = grid_coordinate(row, col);
            if col + 1 < cols {
                let there = grid_coordinate(row, col + 1);
                graph.add_two_way(
                    GraphEdge::new(
                        grid_node(row, col, cols),
                        grid_node(row, col + 1, cols),
                        here.distance_to(&there),
                    )
                    .with_highway("residential")
                    .with_max_speed(next_speed()),
                );
            }
            if row + 1 < rows {
                let there = grid_coordinate(row + 1, col);
                graph.add_two_way(
                    GraphEdge::new(
                        grid_node(row, col, cols),
                        grid_node(row + 1, col, cols),
                        here.distance_to(&there),
                    )
                    .with_highway("tertiary")
                    .with_max_speed(next_speed()),
                );
            }
        }
    }
    graph
}

/// Provider closure returning `graph` for every segment and counting calls.
pub fn counting_provider(
    graph: RoadGraph,
) -> (
    impl Fn(Coordinate, f64) -> Result<RoadGraph> + Send + Sync + 'static,
    Arc<AtomicUsize>,
) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let provider = move |_center: Coordinate, _radius: f64| -> Result<RoadGraph> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(graph.clone())
    };
    (provider, calls)
}

pub fn calls(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
