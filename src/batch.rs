//! Batch attribution over a directory of traces
//!
//! Each trace `<stem>.trace.jsonl` is paired with the power log
//! `<stem>.power.log` recorded alongside it. Traces are independent, so they
//! are analysed by a pool of worker threads; the merge is a sequential
//! reduction once every worker is done.
//!
//! Failures are per trace: a trace without a power log, or one that fails to
//! parse, is logged and left out of the merge.

use crate::aggregate::merge_all;
use crate::attribution::{attribute_window, AnalysisWindow, FunctionRegistry};
use crate::config::AnalysisConfig;
use crate::correlator::correlate;
use crate::error::{Result, VatioError};
use crate::power::EnvironmentLog;
use crate::trace_reader::JsonLinesReader;
use crossbeam::channel;
use std::path::{Path, PathBuf};

pub const TRACE_SUFFIX: &str = ".trace.jsonl";
pub const POWER_SUFFIX: &str = ".power.log";

/// A trace file and the power log recorded with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracePair {
    pub stem: String,
    pub trace: PathBuf,
    pub power: PathBuf,
}

/// Find every trace in `dir` that has a matching power log
///
/// Traces without one are skipped with a warning. Pairs are sorted by stem.
pub fn discover_pairs(dir: &Path) -> Result<Vec<TracePair>> {
    let mut pairs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(stem) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(TRACE_SUFFIX))
        else {
            continue;
        };

        let power = dir.join(format!("{stem}{POWER_SUFFIX}"));
        if !power.is_file() {
            tracing::warn!(trace = %path.display(), "no power log for trace, skipping");
            continue;
        }
        pairs.push(TracePair {
            stem: stem.to_string(),
            trace: path.clone(),
            power,
        });
    }
    pairs.sort_by(|a, b| a.stem.cmp(&b.stem));
    Ok(pairs)
}

/// Full single-trace pipeline: power log, samples, correlation, attribution
pub fn analyze_trace(
    trace: &Path,
    power: &Path,
    config: &AnalysisConfig,
    window: AnalysisWindow,
) -> Result<FunctionRegistry> {
    let timeline = EnvironmentLog::from_file(power, config.power.current_divider)?.into_timeline();
    let samples = JsonLinesReader::open(trace)?;
    let snapshots = correlate(samples, &timeline)?;
    Ok(attribute_window(&snapshots, &config.estimation, window))
}

/// Per-trace result of a batch run
#[derive(Debug)]
pub struct TraceOutcome {
    pub pair: TracePair,
    pub result: Result<FunctionRegistry>,
}

/// Analyse every pair on a worker pool
///
/// Outcomes come back in the order of `pairs`, whatever order the workers
/// finished in.
pub fn analyze_pairs(
    pairs: &[TracePair],
    config: &AnalysisConfig,
    window: AnalysisWindow,
) -> Result<Vec<TraceOutcome>> {
    let workers = config.batch.effective_workers().min(pairs.len()).max(1);
    let (job_tx, job_rx) = channel::unbounded::<usize>();
    let (result_tx, result_rx) = channel::unbounded::<(usize, Result<FunctionRegistry>)>();

    for idx in 0..pairs.len() {
        // Receiver is alive for the whole function
        let _ = job_tx.send(idx);
    }
    drop(job_tx);

    tracing::info!(traces = pairs.len(), workers, "starting batch attribution");

    crossbeam::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move |_| {
                for idx in job_rx.iter() {
                    let pair = &pairs[idx];
                    let result = analyze_trace(&pair.trace, &pair.power, config, window);
                    if result_tx.send((idx, result)).is_err() {
                        break;
                    }
                }
            });
        }
    })
    .map_err(|_| VatioError::WorkerPanicked)?;
    drop(result_tx);

    let mut results: Vec<(usize, Result<FunctionRegistry>)> = result_rx.iter().collect();
    results.sort_by_key(|(idx, _)| *idx);

    Ok(results
        .into_iter()
        .map(|(idx, result)| TraceOutcome {
            pair: pairs[idx].clone(),
            result,
        })
        .collect())
}

/// Result of a batch run
#[derive(Debug)]
pub struct BatchSummary {
    /// Registries of the traces that analysed cleanly, by stem
    pub registries: Vec<(String, FunctionRegistry)>,
    /// Traces that failed, with the reason
    pub failed: Vec<(PathBuf, String)>,
    /// Sum of all successful registries
    pub merged: Option<FunctionRegistry>,
}

/// Discover, analyse and merge every trace in `dir`
pub fn run_batch(
    dir: &Path,
    config: &AnalysisConfig,
    window: AnalysisWindow,
) -> Result<BatchSummary> {
    let pairs = discover_pairs(dir)?;
    let outcomes = analyze_pairs(&pairs, config, window)?;

    let mut registries = Vec::new();
    let mut failed = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(registry) => registries.push((outcome.pair.stem, registry)),
            Err(e) => {
                tracing::warn!(
                    trace = %outcome.pair.trace.display(),
                    error = %e,
                    "trace failed, excluded from merge"
                );
                failed.push((outcome.pair.trace, e.to_string()));
            }
        }
    }

    let merged = merge_all(registries.iter().map(|(_, r)| r));
    Ok(BatchSummary {
        registries,
        failed,
        merged,
    })
}
