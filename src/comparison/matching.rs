// Pairing functions across conditions and running the tests
//
// Every baseline function is looked up in the candidate condition. A match is
// tested and removed from the candidate pool, so each candidate pairs at most
// once; whatever remains on either side is reported as unmatched.

use crate::comparison::config::{ComparisonConfig, MatchMode};
use crate::comparison::energy_sum::{build_energy_sums, trace_energy_total, FunctionEnergySum};
use crate::comparison::outcome::{
    ComparisonReport, FunctionComparison, Side, TestOutcome, UnmatchedFunction,
};
use crate::comparison::statistics::{compare_populations, StatisticalTest};
use crate::estimator::RegistryReport;
use crate::filter::FunctionFilter;
use anyhow::Result;
use std::collections::BTreeMap;

/// Compare per-function energy between two conditions
///
/// # Example
/// ```
/// use vatio::comparison::{compare_conditions, ComparisonConfig};
/// use vatio::filter::FunctionFilter;
///
/// let report = compare_conditions(&[], &[], &FunctionFilter::all(), &ComparisonConfig::default())
///     .unwrap();
/// assert!(report.comparisons.is_empty());
/// ```
pub fn compare_conditions(
    baseline: &[RegistryReport],
    candidate: &[RegistryReport],
    filter: &FunctionFilter,
    config: &ComparisonConfig,
) -> Result<ComparisonReport> {
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let baseline_sums = build_energy_sums(baseline, filter);
    let mut candidate_sums = build_energy_sums(candidate, filter);

    let mut comparisons = Vec::new();
    let mut unmatched = Vec::new();

    for sum in baseline_sums.into_values() {
        match take_match(&sum, &mut candidate_sums, config.match_by) {
            Some(other) => comparisons.push(compare_pair(sum, other, config)),
            None => unmatched.push(UnmatchedFunction {
                side: Side::Baseline,
                sum,
            }),
        }
    }
    unmatched.extend(candidate_sums.into_values().map(|sum| UnmatchedFunction {
        side: Side::Candidate,
        sum,
    }));

    comparisons.sort_by(|a, b| b.sort_key().total_cmp(&a.sort_key()));

    tracing::info!(
        matched = comparisons.len(),
        unmatched = unmatched.len(),
        test = config.test.name(),
        "compared conditions"
    );

    Ok(ComparisonReport {
        config: config.clone(),
        baseline_traces: baseline.len(),
        candidate_traces: candidate.len(),
        comparisons,
        unmatched,
    })
}

fn take_match(
    sum: &FunctionEnergySum,
    pool: &mut BTreeMap<u64, FunctionEnergySum>,
    mode: MatchMode,
) -> Option<FunctionEnergySum> {
    let key = match mode {
        MatchMode::Address => sum.address,
        MatchMode::Name => *pool
            .iter()
            .find(|(_, other)| !sum.names.is_disjoint(&other.names))?
            .0,
    };
    pool.remove(&key)
}

fn compare_pair(
    baseline: FunctionEnergySum,
    candidate: FunctionEnergySum,
    config: &ComparisonConfig,
) -> FunctionComparison {
    let local = run_test(&baseline.local_energies, &candidate.local_energies, config);
    let nonlocal = run_test(
        &baseline.nonlocal_energies,
        &candidate.nonlocal_energies,
        config,
    );
    FunctionComparison {
        baseline,
        candidate,
        local,
        nonlocal,
    }
}

fn run_test(baseline: &[f64], candidate: &[f64], config: &ComparisonConfig) -> TestOutcome {
    let smallest = baseline.len().min(candidate.len());
    if smallest < config.min_sample_size {
        return TestOutcome::Untestable {
            reason: format!(
                "{} traces, need at least {}",
                smallest, config.min_sample_size
            ),
        };
    }
    match compare_populations(baseline, candidate, config.test) {
        Ok(test) => TestOutcome::Tested(test),
        Err(e) => TestOutcome::Untestable {
            reason: e.to_string(),
        },
    }
}

/// Test whole-trace energy estimates between two conditions
pub fn compare_trace_totals(
    baseline: &[RegistryReport],
    candidate: &[RegistryReport],
    filter: &FunctionFilter,
    config: &ComparisonConfig,
) -> Result<StatisticalTest> {
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let totals = |reports: &[RegistryReport]| -> Vec<f64> {
        reports.iter().map(|r| trace_energy_total(r, filter)).collect()
    };
    compare_populations(&totals(baseline), &totals(candidate), config.test)
}
