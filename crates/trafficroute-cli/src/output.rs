//! Output formatting for route plans and cache listings.
//!
//! Renderers write to any `io::Write` so the handlers can target stdout and
//! the unit tests can target a buffer.

use std::io::{self, Write};
use std::path::Path;

use clap::ValueEnum;
use serde::Serialize;

use trafficroute_lib::{CacheEntry, CacheKey, RoutePlan};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Format a duration in seconds as `1h 02m 03s`, `4m 05s` or `42s`.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {secs:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs:02}s")
    } else {
        format!("{secs}s")
    }
}

/// Format a byte count with a binary unit suffix.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Render a route plan.
pub fn render_route<W: Write>(out: &mut W, plan: &RoutePlan, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Text => render_route_text(out, plan),
        OutputFormat::Json => write_json(out, plan),
    }
}

fn render_route_text<W: Write>(out: &mut W, plan: &RoutePlan) -> io::Result<()> {
    writeln!(
        out,
        "Route with {} stops ({} legs; algorithm: {}):",
        plan.stops.len(),
        plan.leg_count(),
        plan.algorithm
    )?;

    for (index, stop) in plan.stops.iter().enumerate() {
        writeln!(out, "  Stop {}: {}", index + 1, stop)?;
    }

    writeln!(out)?;
    for leg in &plan.legs {
        let cache = if leg.cache_hit { "cached" } else { "fetched" };
        writeln!(
            out,
            "  Leg {} -> {}: {} over {} nodes (traffic x{:.2}, {} graph {})",
            leg.from_stop,
            leg.to_stop,
            format_duration(leg.cost_seconds),
            leg.node_count,
            leg.traffic_multiplier,
            cache,
            leg.segment
        )?;
    }

    writeln!(out)?;
    writeln!(out, "Path ({} points):", plan.path.len())?;
    for point in &plan.path {
        writeln!(out, "  {}", point)?;
    }

    writeln!(
        out,
        "\nEstimated travel time: {}",
        format_duration(plan.total_cost_seconds)
    )
}

#[derive(Serialize)]
struct CacheKeyView<'a> {
    key: String,
    file_name: String,
    path: &'a Path,
    center: trafficroute_lib::Coordinate,
    radius_meters: u32,
    cached: bool,
}

/// Render the cache key a segment maps to.
pub fn render_cache_key<W: Write>(
    out: &mut W,
    key: &CacheKey,
    path: &Path,
    format: OutputFormat,
) -> io::Result<()> {
    let cached = path.exists();
    match format {
        OutputFormat::Text => {
            writeln!(out, "Segment key: {}", key)?;
            writeln!(out, "File name:   {}", key.file_name())?;
            writeln!(
                out,
                "Cache file:  {} ({})",
                path.display(),
                if cached { "present" } else { "missing" }
            )
        }
        OutputFormat::Json => write_json(
            out,
            &CacheKeyView {
                key: key.to_string(),
                file_name: key.file_name(),
                path,
                center: key.center(),
                radius_meters: key.radius_meters(),
                cached,
            },
        ),
    }
}

#[derive(Serialize)]
struct CacheEntryView<'a> {
    path: &'a Path,
    size_bytes: u64,
}

/// Render the persisted graph files of a cache directory.
pub fn render_cache_entries<W: Write>(
    out: &mut W,
    dir: &Path,
    entries: &[CacheEntry],
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Text => {
            if entries.is_empty() {
                return writeln!(out, "No cached road graphs in {}", dir.display());
            }
            writeln!(out, "Cached road graphs in {}:", dir.display())?;
            for entry in entries {
                let name = entry
                    .path
                    .file_name()
                    .map(|name| name.to_string_lossy())
                    .unwrap_or_default();
                writeln!(out, "  {:<40} {:>10}", name, format_size(entry.size_bytes))?;
            }
            let total: u64 = entries.iter().map(|entry| entry.size_bytes).sum();
            writeln!(out, "{} files, {}", entries.len(), format_size(total))
        }
        OutputFormat::Json => {
            let views: Vec<CacheEntryView<'_>> = entries
                .iter()
                .map(|entry| CacheEntryView {
                    path: &entry.path,
                    size_bytes: entry.size_bytes,
                })
                .collect();
            write_json(out, &views)
        }
    }
}

fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trafficroute_lib::{Coordinate, LegSummary, RouteAlgorithm};

    fn sample_plan() -> RoutePlan {
        let a = Coordinate::new(21.028, 105.85);
        let b = Coordinate::new(21.029, 105.85);
        RoutePlan {
            algorithm: RouteAlgorithm::AStar,
            path: vec![a, b],
            stops: vec![a, b],
            legs: vec![LegSummary {
                from_stop: 1,
                to_stop: 2,
                segment: "21.029,105.850 r=2000m".to_string(),
                cache_hit: false,
                traffic_multiplier: 1.25,
                start_node: 1,
                goal_node: 4,
                node_count: 2,
                cost_seconds: 75.4,
            }],
            total_cost_seconds: 75.4,
        }
    }

    #[test]
    fn durations_are_compact() {
        assert_eq!(format_duration(0.4), "0s");
        assert_eq!(format_duration(42.0), "42s");
        assert_eq!(format_duration(245.0), "4m 05s");
        assert_eq!(format_duration(3723.0), "1h 02m 03s");
        assert_eq!(format_duration(-5.0), "0s");
    }

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn text_route_lists_stops_and_legs() {
        let mut buffer = Vec::new();
        render_route(&mut buffer, &sample_plan(), OutputFormat::Text).expect("render");
        let text = String::from_utf8(buffer).expect("utf8");

        assert!(text.contains("algorithm: a-star"));
        assert!(text.contains("Stop 1: 21.028000,105.850000"));
        assert!(text.contains("Leg 1 -> 2: 1m 15s over 2 nodes (traffic x1.25, fetched graph"));
        assert!(text.contains("Estimated travel time: 1m 15s"));
    }

    #[test]
    fn json_route_is_machine_readable() {
        let mut buffer = Vec::new();
        render_route(&mut buffer, &sample_plan(), OutputFormat::Json).expect("render");
        let value: serde_json::Value = serde_json::from_slice(&buffer).expect("valid json");

        assert_eq!(value["algorithm"], "a-star");
        assert_eq!(value["path"][1]["lat"], 21.029);
        assert_eq!(value["legs"][0]["to_stop"], 2);
    }

    #[test]
    fn empty_cache_listing_says_so() {
        let mut buffer = Vec::new();
        render_cache_entries(&mut buffer, Path::new("/tmp/graphs"), &[], OutputFormat::Text)
            .expect("render");
        assert_eq!(
            String::from_utf8(buffer).expect("utf8"),
            "No cached road graphs in /tmp/graphs\n"
        );
    }
}
