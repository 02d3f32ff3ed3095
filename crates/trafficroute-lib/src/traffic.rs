//! Congestion model and traffic-duration providers.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::geo::Coordinate;

/// Free-flow estimates shorter than this are too noisy to compare against.
pub const MIN_FREE_FLOW_SECONDS: f64 = 10.0;

const DISTANCE_MATRIX_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";

/// Congestion factor for a span given its free-flow estimate and the observed
/// travel time.
///
/// Missing observations and very short spans yield `1.0`. Otherwise the ratio
/// of observed to free-flow time, floored at `1.0`: congestion only ever slows
/// a route down.
pub fn traffic_multiplier(free_flow_seconds: f64, real_seconds: Option<f64>) -> f64 {
    let Some(real) = real_seconds else {
        return 1.0;
    };
    if free_flow_seconds.is_nan() || free_flow_seconds < MIN_FREE_FLOW_SECONDS {
        return 1.0;
    }

    let ratio = real / free_flow_seconds;
    if ratio.is_finite() {
        ratio.max(1.0)
    } else {
        1.0
    }
}

/// Source of live travel durations between two points.
///
/// `Ok(None)` means the provider has no data for the span. Errors are treated
/// the same way by the weighting step, but are logged first.
pub trait TrafficProvider {
    fn duration_in_traffic(&self, origin: Coordinate, destination: Coordinate)
        -> Result<Option<f64>>;
}

impl<F> TrafficProvider for F
where
    F: Fn(Coordinate, Coordinate) -> Result<Option<f64>>,
{
    fn duration_in_traffic(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<Option<f64>> {
        self(origin, destination)
    }
}

/// Provider used when no traffic source is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTraffic;

impl TrafficProvider for NoTraffic {
    fn duration_in_traffic(&self, _: Coordinate, _: Coordinate) -> Result<Option<f64>> {
        Ok(None)
    }
}

/// Distance-matrix client reporting driving time in current traffic.
///
/// Build once and reuse; the underlying HTTP client pools connections.
#[derive(Debug, Clone)]
pub struct DistanceMatrixClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl DistanceMatrixClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(crate::user_agent())
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: DISTANCE_MATRIX_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint, e.g. a local mock server.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl TrafficProvider for DistanceMatrixClient {
    fn duration_in_traffic(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<Option<f64>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("origins", origin.to_string()),
                ("destinations", destination.to_string()),
                ("mode", "driving".to_string()),
                ("departure_time", "now".to_string()),
                ("key", self.api_key.clone()),
            ])
            .send()?
            .error_for_status()?;

        let body: DistanceMatrixResponse = response.json()?;
        let duration = body.duration_in_traffic();
        debug!(
            %origin,
            %destination,
            status = %body.status,
            duration_seconds = ?duration,
            "distance matrix lookup"
        );
        Ok(duration)
    }
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixResponse {
    status: String,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    #[serde(default)]
    duration_in_traffic: Option<MatrixValue>,
}

#[derive(Debug, Deserialize)]
struct MatrixValue {
    value: f64,
}

impl DistanceMatrixResponse {
    /// Traffic duration of the single origin/destination element, if reported.
    fn duration_in_traffic(&self) -> Option<f64> {
        if self.status != "OK" {
            return None;
        }

        let element = self.rows.first()?.elements.first()?;
        if element.status != "OK" {
            return None;
        }
        element.duration_in_traffic.as_ref().map(|value| value.value)
    }
}
