use criterion::{criterion_group, criterion_main, Criterion};
use once_cell::sync::Lazy;
use std::hint::black_box;
use trafficroute_lib::{
    apply_traffic, find_path, find_path_dijkstra, Coordinate, GraphEdge, NoTraffic, NodeId,
    RoadGraph, WeightedGraph,
};

const SIZE: usize = 80;
const ORIGIN: Coordinate = Coordinate::new(21.0, 105.8);

fn node(row: usize, col: usize) -> NodeId {
    (row * SIZE + col) as NodeId + 1
}

fn coordinate(row: usize, col: usize) -> Coordinate {
    Coordinate::new(
        ORIGIN.lat + row as f64 * 0.001,
        ORIGIN.lng + col as f64 * 0.001,
    )
}

fn street_grid() -> RoadGraph {
    let mut graph = RoadGraph::new();
    for row in 0..SIZE {
        for col in 0..SIZE {
            graph.add_node(node(row, col), coordinate(row, col));
        }
    }
    for row in 0..SIZE {
        for col in 0..SIZE {
            // Every fifth street is an arterial road.
            let (highway, speed) = if row % 5 == 0 || col % 5 == 0 {
                ("primary", 60.0)
            } else {
                ("residential", 30.0)
            };
            for (r, c) in [(row, col + 1), (row + 1, col)] {
                if r < SIZE && c < SIZE {
                    let length = coordinate(row, col).distance_to(&coordinate(r, c));
                    graph.add_two_way(
                        GraphEdge::new(node(row, col), node(r, c), length)
                            .with_highway(highway)
                            .with_max_speed(speed),
                    );
                }
            }
        }
    }
    graph
}

static GRID: Lazy<WeightedGraph> = Lazy::new(|| {
    apply_traffic(
        street_grid(),
        coordinate(0, 0),
        coordinate(SIZE - 1, SIZE - 1),
        &NoTraffic,
    )
});

fn benchmark_pathfinding(c: &mut Criterion) {
    let graph = &*GRID;
    let start = node(1, 1);
    let goal = node(SIZE - 2, SIZE - 3);

    c.bench_function("astar_street_grid", |b| {
        b.iter(|| {
            let path = find_path(graph, start, goal).expect("route exists");
            black_box(path.cost_seconds)
        });
    });

    c.bench_function("dijkstra_street_grid", |b| {
        b.iter(|| {
            let path = find_path_dijkstra(graph, start, goal).expect("route exists");
            black_box(path.cost_seconds)
        });
    });

    c.bench_function("weighting_street_grid", |b| {
        let raw = street_grid();
        b.iter(|| {
            let weighted = apply_traffic(
                raw.clone(),
                coordinate(0, 0),
                coordinate(SIZE - 1, SIZE - 1),
                &NoTraffic,
            );
            black_box(weighted.node_count())
        });
    });
}

criterion_group!(benches, benchmark_pathfinding);
criterion_main!(benches);
