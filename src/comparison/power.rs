// Power-draw comparison between individual traces
//
// The energy comparison needs several traces per condition. These tests
// instead treat every power reading a trace observed as one observation, so
// two single traces can be told apart: by whole-trace power draw, and per
// function by local, non-local and combined power. All tests are Welch's
// t-test.

use crate::attribution::{FunctionAccumulator, FunctionRegistry, PowerPopulation};
use crate::comparison::outcome::TestOutcome;
use crate::comparison::statistics::{mean_of, welch};
use crate::filter::FunctionFilter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which power population a test ran on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerQuantity {
    /// Every snapshot of the trace
    Trace,
    Local,
    Nonlocal,
    /// Local and non-local readings together
    Combined,
}

impl PowerQuantity {
    pub fn name(&self) -> &'static str {
        match self {
            PowerQuantity::Trace => "trace",
            PowerQuantity::Local => "local",
            PowerQuantity::Nonlocal => "nonlocal",
            PowerQuantity::Combined => "combined",
        }
    }
}

/// Welch's t-test on two power populations, with their means in watts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerTest {
    pub quantity: PowerQuantity,
    pub baseline_mean: f64,
    pub candidate_mean: f64,
    pub baseline_readings: usize,
    pub candidate_readings: usize,
    pub outcome: TestOutcome,
}

impl PowerTest {
    pub fn new(quantity: PowerQuantity, baseline: &[f64], candidate: &[f64]) -> Self {
        let outcome = match welch(baseline, candidate) {
            Ok(test) if test.pvalue.is_finite() => TestOutcome::Tested(test),
            Ok(_) => TestOutcome::Untestable {
                reason: "power does not vary in either population".to_string(),
            },
            Err(e) => TestOutcome::Untestable {
                reason: e.to_string(),
            },
        };
        Self {
            quantity,
            baseline_mean: mean_of(baseline),
            candidate_mean: mean_of(candidate),
            baseline_readings: baseline.len(),
            candidate_readings: candidate.len(),
            outcome,
        }
    }
}

/// Power tests of one function present at the same address in both traces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionPowerComparison {
    pub address: u64,
    pub names: BTreeSet<String>,
    pub local: PowerTest,
    pub nonlocal: PowerTest,
    pub combined: PowerTest,
}

impl FunctionPowerComparison {
    pub fn tests(&self) -> [&PowerTest; 3] {
        [&self.local, &self.nonlocal, &self.combined]
    }

    pub fn display_name(&self) -> String {
        crate::attribution::join_names(&self.names)
    }
}

/// Result of comparing the power draw of two traces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerComparisonReport {
    pub filter_duplicates: bool,
    pub significance_level: f64,
    pub trace: PowerTest,
    /// In baseline address order
    pub functions: Vec<FunctionPowerComparison>,
}

impl PowerComparisonReport {
    /// Generate human-readable report
    pub fn to_report_string(&self) -> String {
        let alpha = self.significance_level;
        let mut report = String::new();

        if self.trace.outcome.is_significant(alpha) {
            report.push_str("❌ POWER DRAW DIFFERS\n\n");
        } else {
            report.push_str("✅ NO SIGNIFICANT POWER DIFFERENCE\n\n");
        }
        report.push_str(&format!(
            "Trace power: {:.4} W -> {:.4} W ({} vs {} readings, p={})\n",
            self.trace.baseline_mean,
            self.trace.candidate_mean,
            self.trace.baseline_readings,
            self.trace.candidate_readings,
            format_pvalue(&self.trace.outcome)
        ));
        report.push_str(&format!(
            "Duplicate readings: {}\n",
            if self.filter_duplicates { "filtered" } else { "kept" }
        ));
        report.push_str(&format!("Matched functions: {}\n", self.functions.len()));

        let significant: Vec<&FunctionPowerComparison> = self
            .functions
            .iter()
            .filter(|f| f.tests().iter().any(|t| t.outcome.is_significant(alpha)))
            .collect();
        if !significant.is_empty() {
            report.push_str("\n📊 Functions drawing different power:\n");
            for function in significant {
                report.push_str(&format!("  {}", function.display_name()));
                for test in function.tests() {
                    report.push_str(&format!(
                        " {} {:.4} W -> {:.4} W (p={})",
                        test.quantity.name(),
                        test.baseline_mean,
                        test.candidate_mean,
                        format_pvalue(&test.outcome)
                    ));
                }
                report.push('\n');
            }
        }
        report
    }
}

/// Every reading the trace's snapshots were priced with
///
/// Each snapshot credits exactly one leaf, so the local populations of all
/// functions together cover the whole trace once.
pub fn trace_power_population(registry: &FunctionRegistry) -> PowerPopulation {
    let mut population = PowerPopulation::default();
    for function in registry.functions() {
        population.merge(&function.local_readings);
    }
    population
}

fn combined_population(function: &FunctionAccumulator) -> PowerPopulation {
    let mut population = function.local_readings.clone();
    population.merge(&function.nonlocal_readings);
    population
}

/// Compare the power draw of two traces, overall and per function
///
/// Functions are paired by address; functions missing from either trace are
/// skipped.
pub fn compare_power(
    baseline: &FunctionRegistry,
    candidate: &FunctionRegistry,
    filter: &FunctionFilter,
    filter_duplicates: bool,
    significance_level: f64,
) -> PowerComparisonReport {
    let trace = PowerTest::new(
        PowerQuantity::Trace,
        &trace_power_population(baseline).values(filter_duplicates),
        &trace_power_population(candidate).values(filter_duplicates),
    );

    let mut functions = Vec::new();
    for function in baseline.functions().filter(|f| filter.matches(&f.names)) {
        let Some(other) = candidate.get(function.address) else {
            continue;
        };
        let test = |quantity, a: &PowerPopulation, b: &PowerPopulation| {
            PowerTest::new(
                quantity,
                &a.values(filter_duplicates),
                &b.values(filter_duplicates),
            )
        };
        functions.push(FunctionPowerComparison {
            address: function.address,
            names: function.names.clone(),
            local: test(
                PowerQuantity::Local,
                &function.local_readings,
                &other.local_readings,
            ),
            nonlocal: test(
                PowerQuantity::Nonlocal,
                &function.nonlocal_readings,
                &other.nonlocal_readings,
            ),
            combined: test(
                PowerQuantity::Combined,
                &combined_population(function),
                &combined_population(other),
            ),
        });
    }

    tracing::info!(
        matched = functions.len(),
        filter_duplicates,
        "compared power draw"
    );

    PowerComparisonReport {
        filter_duplicates,
        significance_level,
        trace,
        functions,
    }
}

/// Pairwise whole-trace power p-values of several traces
///
/// Only the lower triangle is filled: `pvalues[i][j]` for `j < i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerMatrix {
    pub names: Vec<String>,
    pub pvalues: Vec<Vec<Option<f64>>>,
}

impl PowerMatrix {
    /// Tab-separated table with a header row and column
    ///
    /// `decimals` rounds the p-values; untestable pairs are written as `n/a`.
    pub fn to_tsv(&self, decimals: Option<usize>) -> String {
        let mut header = vec![" ".to_string()];
        header.extend(self.names.iter().cloned());
        let mut output = header.join("\t");
        output.push('\n');

        for (name, row) in self.names.iter().zip(&self.pvalues) {
            let mut cells = vec![name.clone()];
            cells.extend(row.iter().map(|p| match (p, decimals) {
                (Some(p), Some(d)) => format!("{:.*}", d, p),
                (Some(p), None) => p.to_string(),
                (None, _) => "n/a".to_string(),
            }));
            cells.resize(self.names.len() + 1, String::new());
            output.push_str(&cells.join("\t"));
            output.push('\n');
        }
        output
    }
}

/// Test every pair of traces against each other, sorted by name
pub fn power_matrix(
    traces: &[(String, FunctionRegistry)],
    filter_duplicates: bool,
) -> PowerMatrix {
    let mut sorted: Vec<(&str, Vec<f64>)> = traces
        .iter()
        .map(|(name, registry)| {
            (
                name.as_str(),
                trace_power_population(registry).values(filter_duplicates),
            )
        })
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let pvalues: Vec<Vec<Option<f64>>> = sorted
        .iter()
        .enumerate()
        .map(|(i, (_, row))| {
            sorted[..i]
                .iter()
                .map(|(_, column)| {
                    PowerTest::new(PowerQuantity::Trace, row, column)
                        .outcome
                        .pvalue()
                })
                .collect::<Vec<_>>()
        })
        .collect();

    PowerMatrix {
        names: sorted.iter().map(|(name, _)| name.to_string()).collect(),
        pvalues,
    }
}

fn format_pvalue(outcome: &TestOutcome) -> String {
    match outcome.pvalue() {
        Some(p) => format!("{:.4}", p),
        None => "n/a".to_string(),
    }
}
