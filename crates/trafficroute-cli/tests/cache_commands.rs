use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../docs/fixtures/sample_road_graph.json")
        .canonicalize()
        .expect("fixture road graph present")
}

fn cli(cache_dir: &std::path::Path) -> Command {
    let mut cmd = cargo_bin_cmd!("trafficroute");
    cmd.env("TRAFFICROUTE_GRAPH_SOURCE", fixture_path())
        .env_remove("TRAFFICROUTE_MAPS_API_KEY")
        .env("RUST_LOG", "error")
        .arg("--cache-dir")
        .arg(cache_dir);
    cmd
}

#[test]
fn cache_key_reports_quantized_segment() {
    let temp = tempdir().expect("create temp dir");
    cli(temp.path())
        .args([
            "cache-key",
            "--from",
            "21.0285,105.8542",
            "--to",
            "21.0455,105.8880",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("21.037,105.871 r=3100m"))
        .stdout(predicate::str::contains("graph_21.037_105.871_3100.bin"))
        .stdout(predicate::str::contains("missing"));
}

#[test]
fn cache_key_accepts_southern_and_western_coordinates() {
    let temp = tempdir().expect("create temp dir");
    cli(temp.path())
        .args(["cache-key", "--from", "-33.8688,151.2093", "--to", "-33.8650,151.2094"])
        .assert()
        .success()
        .stdout(predicate::str::contains("graph_-33.867_151.209_2000.bin"));
}

#[test]
fn list_and_clear_cached_graphs() {
    let temp = tempdir().expect("create temp dir");

    cli(temp.path())
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached road graphs"));

    cli(temp.path())
        .args(["route", "--stop", "21.0280,105.8500", "--stop", "21.0300,105.8520"])
        .assert()
        .success();

    cli(temp.path())
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("graph_21.029_105.851_2000.bin"))
        .stdout(predicate::str::contains("1 files"));

    fs::write(temp.path().join("README.txt"), "not a graph").expect("write unrelated file");

    cli(temp.path())
        .args(["cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 cached road graphs"));

    assert!(temp.path().join("README.txt").exists());
}

#[test]
fn cache_list_supports_json() {
    let temp = tempdir().expect("create temp dir");
    let output = cli(temp.path())
        .args(["--format", "json", "cache", "list"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let entries: serde_json::Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(entries, serde_json::json!([]));
}
