use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use trafficroute_cli::output::OutputFormat;
use trafficroute_lib::Coordinate;

mod commands;

use commands::cache::CacheAction;
use commands::route::RouteArgs;

#[derive(Parser, Debug)]
#[command(author, version, about = "Traffic-aware multi-stop road route planner")]
struct Cli {
    /// Override the directory holding cached road graphs.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Output format for command results.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plan a route through two or more stops, in order.
    Route(RouteArgs),
    /// Show the cache key and file a leg between two points maps to.
    CacheKey {
        /// Leg origin as LAT,LNG.
        #[arg(long, allow_hyphen_values = true)]
        from: Coordinate,
        /// Leg destination as LAT,LNG.
        #[arg(long, allow_hyphen_values = true)]
        to: Coordinate,
    },
    /// Inspect or clear the road graph cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cache_dir = cli.cache_dir.as_deref();

    match cli.command {
        Command::Route(args) => commands::route::handle_route(cache_dir, &args, cli.format),
        Command::CacheKey { from, to } => {
            commands::cache::handle_cache_key(cache_dir, from, to, cli.format)
        }
        Command::Cache { action } => commands::cache::handle_cache(cache_dir, action, cli.format),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
