// Energy Comparison Between Two Populations of Runs
//
// Answers "did this change alter how much energy each function costs?" by
// treating every independent trace as one observation of each function's
// local and non-local energy cost, and testing baseline against candidate.
// Two single traces are compared by power draw instead, with every power
// reading as one observation.
//
// Implementation:
// - Uses aprender (crates.io) for Welch's t-test and medians
// - Uses trueno (crates.io) for vector variance
// - Mann-Whitney U is computed locally: exact for small untied samples,
//   tie-corrected normal approximation otherwise

mod config;
mod energy_sum;
mod matching;
mod outcome;
mod power;
mod statistics;

pub use config::{ComparisonConfig, MatchMode, TestKind};
pub use energy_sum::{build_energy_sums, trace_energy_total, FunctionEnergySum};
pub use matching::{compare_conditions, compare_trace_totals};
pub use outcome::{ComparisonReport, FunctionComparison, Side, TestOutcome, UnmatchedFunction};
pub use power::{
    compare_power, power_matrix, trace_power_population, FunctionPowerComparison,
    PowerComparisonReport, PowerMatrix, PowerQuantity, PowerTest,
};
pub use statistics::{
    compare_populations, mann_whitney, mean_of, median, median_of, welch, StatisticalTest,
};
