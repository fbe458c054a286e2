// Shared fixtures for integration tests
//
// Traces are written in the JSON-lines sample format and power logs in the
// device's environment log format, so tests exercise the same readers the
// binary uses.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// One sample: timestamp and period in milliseconds, leaf-to-root `(address, symbol)` frames
pub struct Sample<'a> {
    pub ts_ms: i64,
    pub period_ms: i64,
    pub stack: &'a [(u64, &'a str)],
}

pub fn sample<'a>(ts_ms: i64, period_ms: i64, stack: &'a [(u64, &'a str)]) -> Sample<'a> {
    Sample {
        ts_ms,
        period_ms,
        stack,
    }
}

pub fn trace_line(s: &Sample) -> String {
    let frames: Vec<String> = s
        .stack
        .iter()
        .map(|(addr, symbol)| format!(r#"{{"addr": {addr}, "symbol": "{symbol}"}}"#))
        .collect();
    format!(
        r#"{{"timestamp_ns": {}, "period_ns": {}, "event": "cpu-clock", "threads": [[{}]]}}"#,
        s.ts_ms * 1_000_000,
        s.period_ms * 1_000_000,
        frames.join(", ")
    )
}

pub fn write_trace(path: &Path, samples: &[Sample]) {
    let body: Vec<String> = samples.iter().map(trace_line).collect();
    fs::write(path, body.join("\n") + "\n").unwrap();
}

/// Environment log at a constant 1 V where each `(ms, watts)` sets the current
pub fn power_log(readings: &[(i64, f64)]) -> String {
    let mut log = String::from("INIT FILE\n");
    for (i, (ms, watts)) in readings.iter().enumerate() {
        if i == 0 {
            log.push_str(&format!("{ms} voltage 1000\n"));
        }
        log.push_str(&format!("{ms} current {}\n", (watts * 1e9) as i64));
    }
    log
}

pub fn write_power_log(path: &Path, readings: &[(i64, f64)]) {
    fs::write(path, power_log(readings)).unwrap();
}

/// Write `<stem>.trace.jsonl` and `<stem>.power.log` into `dir`
pub fn write_pair(
    dir: &Path,
    stem: &str,
    samples: &[Sample],
    readings: &[(i64, f64)],
) -> (PathBuf, PathBuf) {
    let trace = dir.join(format!("{stem}.trace.jsonl"));
    let power = dir.join(format!("{stem}.power.log"));
    write_trace(&trace, samples);
    write_power_log(&power, readings);
    (trace, power)
}

/// Three one-second samples `[A]`, `[A, B]`, `[A]` priced at 1 W, 1 W, 2 W
pub fn write_reference_scenario(dir: &Path, stem: &str) -> (PathBuf, PathBuf) {
    const A: (u64, &str) = (0xa, "A");
    const B: (u64, &str) = (0xb, "B");
    write_pair(
        dir,
        stem,
        &[
            sample(0, 1000, &[A]),
            sample(1000, 1000, &[A, B]),
            sample(2000, 1000, &[A]),
        ],
        &[(0, 1.0), (1000, 1.0), (2000, 2.0)],
    )
}

/// A trace where `hot` is the leaf in `hot_share` of 20 samples, the rest in `cold`
pub fn write_workload(dir: &Path, stem: &str, hot_share: usize, watts: f64) -> (PathBuf, PathBuf) {
    const MAIN: (u64, &str) = (0x100, "main");
    const HOT: (u64, &str) = (0x200, "hot");
    const COLD: (u64, &str) = (0x300, "cold");
    let hot_stack = [HOT, MAIN];
    let cold_stack = [COLD, MAIN];
    let samples: Vec<Sample> = (0..20)
        .map(|i| {
            let stack: &[(u64, &str)] = if (i as usize) < hot_share {
                &hot_stack
            } else {
                &cold_stack
            };
            sample(i * 50, 50, stack)
        })
        .collect();
    write_pair(dir, stem, &samples, &[(0, watts), (1000, watts)])
}
