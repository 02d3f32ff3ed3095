//! Route command handler for planning multi-stop trips.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use trafficroute_cli::output::{render_route, OutputFormat};
use trafficroute_lib::{Coordinate, EngineConfig, RouteAlgorithm, RouteEngine};

/// Arguments for the route command.
#[derive(Args, Debug, Clone)]
pub struct RouteArgs {
    /// Stop as LAT,LNG. Repeat for every stop, in visiting order.
    #[arg(long = "stop", required = true, allow_hyphen_values = true)]
    pub stops: Vec<Coordinate>,

    /// Search algorithm used for every leg (a-star or dijkstra).
    #[arg(long, default_value_t = RouteAlgorithm::AStar)]
    pub algorithm: RouteAlgorithm,

    /// Ignore live traffic even when an API key is configured.
    #[arg(long)]
    pub no_traffic: bool,
}

pub fn handle_route(cache_dir: Option<&Path>, args: &RouteArgs, format: OutputFormat) -> Result<()> {
    let mut config = EngineConfig::from_env(cache_dir).context("failed to resolve configuration")?;
    if args.no_traffic {
        config.maps_api_key = None;
    }

    let engine = RouteEngine::from_config(&config)
        .context("failed to initialise the route engine")?
        .with_algorithm(args.algorithm);
    info!(
        stops = args.stops.len(),
        algorithm = %args.algorithm,
        cache_dir = %config.cache_dir.display(),
        "planning route"
    );

    let plan = engine
        .plan_route(&args.stops)
        .with_context(|| format!("failed to plan a route through {} stops", args.stops.len()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    render_route(&mut out, &plan, format)?;
    out.flush()?;
    Ok(())
}
