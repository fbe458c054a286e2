// Comparison outcomes and the human-readable report

use crate::comparison::config::ComparisonConfig;
use crate::comparison::energy_sum::FunctionEnergySum;
use crate::comparison::statistics::StatisticalTest;
use serde::{Deserialize, Serialize};

/// Result of testing one quantity (local or non-local energy)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TestOutcome {
    Tested(StatisticalTest),
    /// Too few traces, or the test itself could not run
    Untestable { reason: String },
}

impl TestOutcome {
    pub fn pvalue(&self) -> Option<f64> {
        match self {
            TestOutcome::Tested(test) => Some(test.pvalue),
            TestOutcome::Untestable { .. } => None,
        }
    }

    pub fn is_significant(&self, significance_level: f64) -> bool {
        match self {
            TestOutcome::Tested(test) => test.is_significant(significance_level),
            TestOutcome::Untestable { .. } => false,
        }
    }
}

/// A function present in both conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionComparison {
    pub baseline: FunctionEnergySum,
    pub candidate: FunctionEnergySum,
    pub local: TestOutcome,
    pub nonlocal: TestOutcome,
}

impl FunctionComparison {
    /// Mean of both conditions' median local energy
    pub fn sort_key(&self) -> f64 {
        (self.baseline.median_local() + self.candidate.median_local()) / 2.0
    }
}

/// Condition a function was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Baseline,
    Candidate,
}

impl Side {
    pub fn name(&self) -> &'static str {
        match self {
            Side::Baseline => "baseline",
            Side::Candidate => "candidate",
        }
    }
}

/// A function present in only one condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedFunction {
    pub side: Side,
    pub sum: FunctionEnergySum,
}

/// Full result of comparing two conditions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub config: ComparisonConfig,
    pub baseline_traces: usize,
    pub candidate_traces: usize,
    /// Sorted by [`FunctionComparison::sort_key`], largest first
    pub comparisons: Vec<FunctionComparison>,
    pub unmatched: Vec<UnmatchedFunction>,
}

impl ComparisonReport {
    /// Comparisons where local or non-local energy differs significantly
    pub fn significant(&self) -> Vec<&FunctionComparison> {
        let alpha = self.config.significance_level;
        self.comparisons
            .iter()
            .filter(|c| c.local.is_significant(alpha) || c.nonlocal.is_significant(alpha))
            .collect()
    }

    /// Generate human-readable report
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();
        let significant = self.significant();

        if significant.is_empty() {
            report.push_str("✅ NO SIGNIFICANT ENERGY DIFFERENCE\n\n");
        } else {
            report.push_str(&format!(
                "❌ ENERGY DIFFERENCE DETECTED ({} functions)\n\n",
                significant.len()
            ));
        }

        report.push_str(&format!(
            "Traces: {} baseline, {} candidate\n",
            self.baseline_traces, self.candidate_traces
        ));
        report.push_str(&format!(
            "Test: {} (significance level {}, {}% confidence)\n",
            self.config.test.name(),
            self.config.significance_level,
            (1.0 - self.config.significance_level) * 100.0
        ));
        report.push_str(&format!("Matched functions: {}\n", self.comparisons.len()));

        if !significant.is_empty() {
            report.push_str("\n📊 Significant differences:\n");
            for comparison in &significant {
                report.push_str(&format!(
                    "  {} (local p={}, non-local p={}, median local {:.4} J -> {:.4} J)\n",
                    comparison.baseline.display_name(),
                    format_pvalue(&comparison.local),
                    format_pvalue(&comparison.nonlocal),
                    comparison.baseline.median_local(),
                    comparison.candidate.median_local()
                ));
            }
        }

        if !self.unmatched.is_empty() {
            report.push_str(&format!("\n🔇 Unmatched functions ({}):\n", self.unmatched.len()));
            for unmatched in &self.unmatched {
                report.push_str(&format!(
                    "  - {} [{}]\n",
                    unmatched.sum.display_name(),
                    unmatched.side.name()
                ));
            }
        }

        report
    }
}

fn format_pvalue(outcome: &TestOutcome) -> String {
    match outcome.pvalue() {
        Some(p) => format!("{:.4}", p),
        None => "n/a".to_string(),
    }
}
