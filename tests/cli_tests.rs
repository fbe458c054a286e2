//! Command-line tests for the vatio binary
#![allow(deprecated)] // suppress assert_cmd::Command::cargo_bin deprecation in tests

mod utils;

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;
use utils::*;

fn vatio() -> Command {
    Command::cargo_bin("vatio").unwrap()
}

#[test]
fn test_attribute_prints_summary() {
    let dir = TempDir::new().unwrap();
    let (trace, power) = write_reference_scenario(dir.path(), "ref");

    vatio()
        .arg("attribute")
        .arg("--trace")
        .arg(&trace)
        .arg("--power")
        .arg(&power)
        .assert()
        .success()
        .stderr(predicate::str::contains("Energy Attribution Summary"))
        .stderr(predicate::str::contains("Samples: 3"));
}

#[test]
fn test_attribute_writes_outputs() {
    let dir = TempDir::new().unwrap();
    let (trace, power) = write_reference_scenario(dir.path(), "ref");
    let reg = dir.path().join("ref.json");
    let csv = dir.path().join("ref.csv");
    let json = dir.path().join("report.json");

    vatio()
        .args(["attribute", "--trace"])
        .arg(&trace)
        .arg("--power")
        .arg(&power)
        .arg("--out")
        .arg(&reg)
        .arg("--csv")
        .arg(&csv)
        .arg("--json")
        .arg(&json)
        .assert()
        .success();

    let registry = vatio::store::load_registry(&reg).unwrap();
    assert_eq!(registry.total_samples(), 3);

    let csv = fs::read_to_string(&csv).unwrap();
    assert!(csv.starts_with("address,names,leaf_samples,tree_samples,"));
    assert!(csv.lines().nth(1).unwrap().starts_with("0xa,A,3,0,"));

    let json = fs::read_to_string(&json).unwrap();
    assert!(json.contains("\"format\": \"vatio-json-v1\""));
}

#[test]
fn test_attribute_filter_restricts_csv() {
    let dir = TempDir::new().unwrap();
    let (trace, power) = write_reference_scenario(dir.path(), "ref");
    let csv = dir.path().join("ref.csv");

    vatio()
        .arg("attribute")
        .arg("-t")
        .arg(&trace)
        .arg("-p")
        .arg(&power)
        .arg("--csv")
        .arg(&csv)
        .args(["--filter", "^B$"])
        .assert()
        .success();

    let csv = fs::read_to_string(&csv).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains("0xb,B,"));
}

#[test]
fn test_attribute_filter_restricts_json() {
    let dir = TempDir::new().unwrap();
    let (trace, power) = write_reference_scenario(dir.path(), "ref");
    let json = dir.path().join("ref.json");
    let stored = dir.path().join("ref.msgpack");

    vatio()
        .arg("attribute")
        .arg("-t")
        .arg(&trace)
        .arg("-p")
        .arg(&power)
        .arg("--json")
        .arg(&json)
        .arg("--out")
        .arg(&stored)
        .args(["--filter", "^B$"])
        .assert()
        .success();

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    let functions = value["report"]["functions"].as_array().unwrap();
    assert_eq!(functions.len(), 1);
    assert_eq!(functions[0]["address"], 0xb);
    assert_eq!(value["summary"]["functions"], 1);

    // the stored registry stays complete
    let registry = vatio::store::load_registry(&stored).unwrap();
    assert!(registry.get(0xa).is_some());
}

#[test]
fn test_attribute_missing_power_log_fails() {
    let dir = TempDir::new().unwrap();
    let (trace, _) = write_reference_scenario(dir.path(), "ref");

    vatio()
        .arg("attribute")
        .arg("--trace")
        .arg(&trace)
        .arg("--power")
        .arg(dir.path().join("absent.power.log"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to attribute"));
}

#[test]
fn test_unsupported_registry_extension_fails() {
    let dir = TempDir::new().unwrap();
    let (trace, power) = write_reference_scenario(dir.path(), "ref");

    vatio()
        .arg("attribute")
        .arg("--trace")
        .arg(&trace)
        .arg("--power")
        .arg(&power)
        .arg("--out")
        .arg(dir.path().join("ref.pickle"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported registry file"));
}

#[test]
fn test_batch_then_merge() {
    let dir = TempDir::new().unwrap();
    write_workload(dir.path(), "a", 10, 1.0);
    write_workload(dir.path(), "b", 12, 1.0);
    let merged = dir.path().join("merged.msgpack");

    vatio()
        .arg("batch")
        .arg(dir.path())
        .args(["--workers", "2"])
        .arg("--out")
        .arg(&merged)
        .assert()
        .success()
        .stderr(predicate::str::contains("Analysed 2 traces (0 failed)"));

    assert_eq!(vatio::store::load_registry(&merged).unwrap().total_samples(), 40);

    let twice = dir.path().join("twice.json");
    vatio()
        .arg("merge")
        .arg(&merged)
        .arg(&merged)
        .arg("--out")
        .arg(&twice)
        .assert()
        .success();

    assert_eq!(vatio::store::load_registry(&twice).unwrap().total_samples(), 80);
}

#[test]
fn test_batch_empty_directory_fails() {
    let dir = TempDir::new().unwrap();
    vatio()
        .arg("batch")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no trace"));
}

#[test]
fn test_merge_requires_out() {
    let dir = TempDir::new().unwrap();
    vatio()
        .arg("merge")
        .arg(dir.path().join("a.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--out"));
}

#[test]
fn test_compare_writes_csvs() {
    let dir = TempDir::new().unwrap();
    let mut baseline = Vec::new();
    let mut candidate = Vec::new();
    for i in 0..3 {
        for (prefix, share, list) in [("base", 5, &mut baseline), ("cand", 15, &mut candidate)] {
            let stem = format!("{prefix}{i}");
            let (trace, power) = write_workload(dir.path(), &stem, share + i, 1.0);
            let reg = dir.path().join(format!("{stem}.json"));
            vatio()
                .arg("attribute")
                .arg("--trace")
                .arg(&trace)
                .arg("--power")
                .arg(&power)
                .arg("--out")
                .arg(&reg)
                .assert()
                .success();
            list.push(reg);
        }
    }
    let csv = dir.path().join("cmp.csv");

    vatio()
        .arg("compare")
        .arg("--baseline")
        .args(&baseline)
        .arg("--candidate")
        .args(&candidate)
        .args(["--test", "welch", "--totals"])
        .arg("--csv")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("hot"))
        .stdout(predicate::str::contains("Whole-trace energy"));

    let rows = fs::read_to_string(&csv).unwrap();
    assert_eq!(rows.lines().count(), 4);
    assert!(rows.contains(",welch,"));
    assert!(dir.path().join("cmp.unmatched.csv").is_file());
}

/// Attribute one trace of 8 one-second samples and store its registry
fn stored_power_run(dir: &std::path::Path, stem: &str, watts: &[f64]) -> std::path::PathBuf {
    const WORK: (u64, &str) = (0x10, "work");
    const MAIN: (u64, &str) = (0x20, "main");
    let samples: Vec<_> = (0..watts.len() as i64)
        .map(|i| sample(i * 1000, 1000, &[WORK, MAIN]))
        .collect();
    let readings: Vec<(i64, f64)> = watts
        .iter()
        .enumerate()
        .map(|(i, w)| (i as i64 * 1000, *w))
        .collect();
    let (trace, power) = write_pair(dir, stem, &samples, &readings);
    let reg = dir.join(format!("{stem}.json"));
    vatio()
        .arg("attribute")
        .arg("-t")
        .arg(&trace)
        .arg("-p")
        .arg(&power)
        .arg("--out")
        .arg(&reg)
        .assert()
        .success();
    reg
}

const LOW: [f64; 8] = [1.0, 1.1, 0.9, 1.05, 0.95, 1.02, 0.98, 1.0];
const HIGH: [f64; 8] = [3.0, 3.1, 2.9, 3.05, 2.95, 3.02, 2.98, 3.0];

#[test]
fn test_compare_power_two_traces() {
    let dir = TempDir::new().unwrap();
    let low = stored_power_run(dir.path(), "low", &LOW);
    let high = stored_power_run(dir.path(), "high", &HIGH);
    let csv = dir.path().join("power.csv");

    vatio()
        .arg("compare-power")
        .arg("-b")
        .arg(&low)
        .arg("-n")
        .arg(&high)
        .arg("--csv")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("POWER DRAW DIFFERS"))
        .stdout(predicate::str::contains("Matched functions: 2"));

    let rows = fs::read_to_string(&csv).unwrap();
    // header, trace, three rows for each of two functions
    assert_eq!(rows.lines().count(), 8);
    assert!(rows.lines().nth(1).unwrap().starts_with(",,trace,"));
    assert!(rows.contains("0x10,work,local,"));
}

#[test]
fn test_power_matrix_tsv() {
    let dir = TempDir::new().unwrap();
    let a = stored_power_run(dir.path(), "a", &LOW);
    let b = stored_power_run(dir.path(), "b", &HIGH);
    let out = dir.path().join("matrix.tsv");

    vatio()
        .arg("power-matrix")
        .arg(&b)
        .arg(&a)
        .args(["--decimals", "3"])
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let tsv = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = tsv.lines().collect();
    assert_eq!(lines, [" \ta\tb", "a\t\t", "b\t0.000\t"]);
}

#[test]
fn test_avg_power() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("run.power.log");
    write_power_log(&log, &[(0, 1.0), (1000, 3.0), (2000, 3.0)]);

    vatio()
        .arg("avg-power")
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("2.000000 W"));
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("vatio.toml");
    fs::write(&config, "[estimation]\nalpha = 2.0\n").unwrap();
    let log = dir.path().join("run.power.log");
    write_power_log(&log, &[(0, 1.0)]);

    vatio()
        .arg("--config")
        .arg(&config)
        .arg("avg-power")
        .arg(&log)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn test_current_divider_from_config() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("vatio.toml");
    fs::write(&config, "[power]\ncurrent_divider = 1e6\n").unwrap();
    let log = dir.path().join("run.power.log");
    fs::write(&log, "0 voltage 2000\n0 current 1500000\n").unwrap();

    vatio()
        .arg("--config")
        .arg(&config)
        .arg("avg-power")
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("3.000000 W"));
}
