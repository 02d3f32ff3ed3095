//! Road network provider backed by the Overpass API.
//!
//! Fetches the drivable OpenStreetMap ways around a point and converts them
//! into a [`RoadGraph`]: consecutive way nodes become edges with great-circle
//! length, honouring one-way tags, and `maxspeed` is normalized to km/h.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::geo::{haversine_distance, Coordinate};
use crate::graph::{GraphEdge, NodeId, RoadGraph};
use crate::provider::RoadNetworkProvider;

/// Public Overpass interpreter.
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

const KPH_PER_MPH: f64 = 1.609_344;

/// Highway classes considered part of the drivable network.
const DRIVABLE_HIGHWAYS: &[&str] = &[
    "motorway",
    "motorway_link",
    "trunk",
    "trunk_link",
    "primary",
    "primary_link",
    "secondary",
    "secondary_link",
    "tertiary",
    "tertiary_link",
    "unclassified",
    "residential",
    "living_street",
    "road",
];

/// Blocking Overpass client. Build once and reuse.
#[derive(Debug, Clone)]
pub struct OverpassClient {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl OverpassClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(crate::user_agent())
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    fn query(&self, center: Coordinate, radius_meters: f64) -> String {
        let classes = DRIVABLE_HIGHWAYS.join("|");
        format!(
            "[out:json][timeout:{timeout}];\
             (way[\"highway\"~\"^({classes})$\"][\"area\"!~\"yes\"][\"access\"!~\"private|no\"]\
             (around:{radius:.0},{lat},{lng}););\
             (._;>;);\
             out body;",
            timeout = self.timeout.as_secs().max(1),
            radius = radius_meters,
            lat = center.lat,
            lng = center.lng,
        )
    }
}

impl RoadNetworkProvider for OverpassClient {
    fn fetch_graph(&self, center: Coordinate, radius_meters: f64) -> Result<RoadGraph> {
        info!(%center, radius_meters, endpoint = %self.endpoint, "requesting road network");

        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("data", self.query(center, radius_meters))])
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(Error::provider)?;

        let body: OverpassResponse = response.json().map_err(Error::provider)?;
        let graph = build_road_graph(&body);
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "converted overpass response"
        );
        Ok(graph)
    }
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Element {
    Node {
        id: NodeId,
        lat: f64,
        lon: f64,
    },
    Way {
        #[serde(default)]
        nodes: Vec<NodeId>,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Both,
    Forward,
    Backward,
}

fn build_road_graph(response: &OverpassResponse) -> RoadGraph {
    let positions: HashMap<NodeId, Coordinate> = response
        .elements
        .iter()
        .filter_map(|element| match element {
            Element::Node { id, lat, lon } => Some((*id, Coordinate::new(*lat, *lon))),
            _ => None,
        })
        .collect();

    let mut graph = RoadGraph::new();
    let mut used: HashSet<NodeId> = HashSet::new();

    for element in &response.elements {
        let Element::Way { nodes, tags } = element else {
            continue;
        };
        let Some(highway) = tags.get("highway") else {
            continue;
        };
        if !DRIVABLE_HIGHWAYS.contains(&highway.as_str()) {
            continue;
        }

        let direction = way_direction(tags);
        let max_speed = tags.get("maxspeed").and_then(|raw| parse_max_speed(raw));

        for pair in nodes.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let (Some(&from), Some(&to)) = (positions.get(&a), positions.get(&b)) else {
                continue;
            };

            let mut edge = GraphEdge::new(a, b, haversine_distance(from, to)).with_highway(highway);
            if let Some(speed) = max_speed {
                edge = edge.with_max_speed(speed);
            }

            match direction {
                Direction::Both => graph.add_two_way(edge),
                Direction::Forward => graph.add_edge(edge),
                Direction::Backward => graph.add_edge(edge.reversed()),
            }
            used.insert(a);
            used.insert(b);
        }
    }

    for id in used {
        if let Some(&coordinate) = positions.get(&id) {
            graph.add_node(id, coordinate);
        }
    }

    graph
}

fn way_direction(tags: &HashMap<String, String>) -> Direction {
    match tags.get("oneway").map(|value| value.trim().to_ascii_lowercase()) {
        Some(value) if matches!(value.as_str(), "yes" | "true" | "1") => Direction::Forward,
        Some(value) if matches!(value.as_str(), "-1" | "reverse") => Direction::Backward,
        Some(value) if matches!(value.as_str(), "no" | "false" | "0") => Direction::Both,
        _ => {
            let motorway = tags.get("highway").map(String::as_str) == Some("motorway");
            let roundabout = matches!(
                tags.get("junction").map(String::as_str),
                Some("roundabout") | Some("circular")
            );
            if motorway || roundabout {
                Direction::Forward
            } else {
                Direction::Both
            }
        }
    }
}

/// Parse an OSM `maxspeed` value into km/h.
///
/// Handles plain numbers, `km/h` and `mph` suffixes and `;`-separated lists
/// (averaged). Symbolic values such as `none` or `signals` yield `None`.
fn parse_max_speed(raw: &str) -> Option<f64> {
    let speeds: Vec<f64> = raw
        .split(|c| c == ';' || c == '|')
        .filter_map(|part| {
            let part = part.trim().to_ascii_lowercase();
            let (number, factor) = match part.strip_suffix("mph") {
                Some(number) => (number.to_string(), KPH_PER_MPH),
                None => (
                    part.trim_end_matches("km/h")
                        .trim_end_matches("kmh")
                        .trim_end_matches("kph")
                        .to_string(),
                    1.0,
                ),
            };
            number
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|speed| speed.is_finite() && *speed > 0.0)
                .map(|speed| speed * factor)
        })
        .collect();

    if speeds.is_empty() {
        None
    } else {
        Some(speeds.iter().sum::<f64>() / speeds.len() as f64)
    }
}
