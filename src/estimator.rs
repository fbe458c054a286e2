//! Statistical estimation over attributed functions
//!
//! Turns a [`FunctionRegistry`]'s raw counts and sums into probabilities,
//! runtimes, mean power and energy, each with a normal-approximation
//! confidence interval.
//!
//! With `N` total samples and `T` total trace time:
//!
//! - probability `p = samples / N`, interval `p ± z·√(p(1−p)/N)`, usable only
//!   when `N·p ≥ 5` and `N·(1−p) ≥ 5`
//! - runtime `p·T`
//! - mean power: sum of credited readings over credited samples, interval
//!   `±z·s/√n` over the reading population (`n ≥ 2`)
//! - energy `mean power × runtime`
//!
//! The energy interval multiplies the endpoints of the probability and power
//! intervals. That is an approximation: it ignores any correlation between the
//! two and is wider than a proper propagated interval.

use crate::attribution::{FunctionAccumulator, FunctionRegistry, PowerPopulation};
use crate::error::{Result, VatioError};
use crate::stats;
use crate::time_unit::TimeUnit;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Estimation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    /// Two-sided significance level; intervals have `1 − alpha` coverage
    pub alpha: f64,
    /// Count each physical power reading once when building power populations
    pub filter_duplicate_readings: bool,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            filter_duplicate_readings: true,
        }
    }
}

impl EstimationConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(format!("alpha must be in (0, 1), got {}", self.alpha));
        }
        Ok(())
    }

    /// Critical value `z = Φ⁻¹(1 − α/2)`
    pub fn z_value(&self) -> Result<f64> {
        self.validate().map_err(VatioError::InvalidConfig)?;
        stats::inverse_normal_cdf(1.0 - self.alpha / 2.0)
            .ok_or_else(|| VatioError::InvalidConfig(format!("alpha {}", self.alpha)))
    }
}

/// Interval estimate with an explicit validity flag
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub valid: bool,
}

impl ConfidenceInterval {
    /// The interval reported when its preconditions do not hold
    pub const fn invalid() -> Self {
        Self {
            lower: -1.0,
            upper: -1.0,
            valid: false,
        }
    }

    /// Interval from explicit bounds; valid only when `0 ≤ lower ≤ upper`
    pub fn from_bounds(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            valid: lower >= 0.0 && lower <= upper,
        }
    }

    pub fn half_width(&self) -> f64 {
        (self.upper - self.lower) / 2.0
    }

    pub fn contains(&self, value: f64) -> bool {
        self.valid && value >= self.lower && value <= self.upper
    }
}

/// Interval for a sample proportion `p` out of `n` trials
pub fn probability_interval(p: f64, n: u64, z: f64) -> ConfidenceInterval {
    let n = n as f64;
    if n == 0.0 || n * p < 5.0 || n * (1.0 - p) < 5.0 {
        return ConfidenceInterval::invalid();
    }
    let half = z * (p * (1.0 - p) / n).sqrt();
    ConfidenceInterval::from_bounds(p - half, p + half)
}

/// Interval for mean power, centred on `point`
///
/// Deviations are taken about `point`, not about the population's own mean.
/// With duplicate filtering the two differ.
pub fn power_interval(population: &[f64], point: f64, z: f64) -> ConfidenceInterval {
    let Some(s) = stats::sample_std_dev_about(population, point) else {
        return ConfidenceInterval::invalid();
    };
    let half = z * s / (population.len() as f64).sqrt();
    ConfidenceInterval::from_bounds(point - half, point + half)
}

/// Endpoint-product energy interval over `total_seconds` of trace
pub fn energy_interval(
    probability: &ConfidenceInterval,
    power: &ConfidenceInterval,
    total_seconds: f64,
) -> ConfidenceInterval {
    if !probability.valid || !power.valid {
        return ConfidenceInterval::invalid();
    }
    ConfidenceInterval::from_bounds(
        probability.lower * total_seconds * power.lower,
        probability.upper * total_seconds * power.upper,
    )
}

/// Derived estimates for one side (local or non-local) of a function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub samples: u64,
    pub probability: f64,
    pub probability_ci: ConfidenceInterval,
    /// Estimated seconds, `probability × T`
    pub runtime: f64,
    pub runtime_ci: ConfidenceInterval,
    pub mean_power: f64,
    pub power_ci: ConfidenceInterval,
    /// Joules, `mean_power × runtime`
    pub energy_cost: f64,
    pub energy_ci: ConfidenceInterval,
}

struct EstimationContext {
    total_samples: u64,
    total_seconds: f64,
    z: f64,
    filter_duplicates: bool,
}

impl EstimationContext {
    fn estimate(&self, samples: u64, power_sum: f64, population: &PowerPopulation) -> CostEstimate {
        let probability = if self.total_samples == 0 {
            0.0
        } else {
            samples as f64 / self.total_samples as f64
        };
        let mean_power = if samples == 0 {
            0.0
        } else {
            power_sum / samples as f64
        };
        let runtime = probability * self.total_seconds;

        let probability_ci = probability_interval(probability, self.total_samples, self.z);
        let runtime_ci = if probability_ci.valid {
            ConfidenceInterval::from_bounds(
                probability_ci.lower * self.total_seconds,
                probability_ci.upper * self.total_seconds,
            )
        } else {
            ConfidenceInterval::invalid()
        };
        let power_ci = power_interval(
            &population.values(self.filter_duplicates),
            mean_power,
            self.z,
        );
        let energy_ci = energy_interval(&probability_ci, &power_ci, self.total_seconds);

        CostEstimate {
            samples,
            probability,
            probability_ci,
            runtime,
            runtime_ci,
            mean_power,
            power_ci,
            energy_cost: mean_power * runtime,
            energy_ci,
        }
    }
}

/// Immutable per-function estimates derived from an accumulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionReport {
    pub address: u64,
    pub names: BTreeSet<String>,
    pub local: CostEstimate,
    pub nonlocal: CostEstimate,
    /// Measured (not estimated) time as leaf and as active caller
    pub measured_local_time: TimeUnit,
    pub measured_nonlocal_time: TimeUnit,
    /// Measured Σ power × period (J) as leaf and as active caller
    pub measured_local_energy: f64,
    pub measured_nonlocal_energy: f64,
    pub children: BTreeSet<u64>,
}

impl FunctionReport {
    pub fn display_name(&self) -> String {
        crate::attribution::join_names(&self.names)
    }
}

/// Estimates for every function of a registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryReport {
    pub total_samples: u64,
    pub total_time: TimeUnit,
    pub config: EstimationConfig,
    pub functions: Vec<FunctionReport>,
}

impl RegistryReport {
    /// Functions ordered by local energy cost, largest first
    pub fn sorted_by_local_energy(&self) -> Vec<&FunctionReport> {
        let mut sorted: Vec<&FunctionReport> = self.functions.iter().collect();
        sorted.sort_by(|a, b| b.local.energy_cost.total_cmp(&a.local.energy_cost));
        sorted
    }

    pub fn get(&self, address: u64) -> Option<&FunctionReport> {
        self.functions.iter().find(|f| f.address == address)
    }

    /// Sum of local energy cost over all functions
    ///
    /// Local costs partition the trace, so this estimates whole-trace energy.
    pub fn total_local_energy(&self) -> f64 {
        self.functions.iter().map(|f| f.local.energy_cost).sum()
    }
}

/// Derive the report for one function
pub fn estimate_function(
    function: &FunctionAccumulator,
    total_samples: u64,
    total_time: TimeUnit,
    config: &EstimationConfig,
) -> Result<FunctionReport> {
    let context = EstimationContext {
        total_samples,
        total_seconds: total_time.to_seconds(),
        z: config.z_value()?,
        filter_duplicates: config.filter_duplicate_readings,
    };
    Ok(report_for(function, &context))
}

fn report_for(function: &FunctionAccumulator, context: &EstimationContext) -> FunctionReport {
    FunctionReport {
        address: function.address,
        names: function.names.clone(),
        local: context.estimate(
            function.leaf_samples,
            function.local_power,
            &function.local_readings,
        ),
        nonlocal: context.estimate(
            function.tree_samples,
            function.nonlocal_power,
            &function.nonlocal_readings,
        ),
        measured_local_time: function.local_time,
        measured_nonlocal_time: function.nonlocal_time,
        measured_local_energy: function.local_energy,
        measured_nonlocal_energy: function.nonlocal_energy,
        children: function.children.clone(),
    }
}

/// Derive reports for every function in `registry`
pub fn estimate_registry(
    registry: &FunctionRegistry,
    config: &EstimationConfig,
) -> Result<RegistryReport> {
    if registry.filter_duplicate_readings() != config.filter_duplicate_readings {
        tracing::debug!(
            registry = registry.filter_duplicate_readings(),
            estimation = config.filter_duplicate_readings,
            "estimating with a duplicate-reading setting different from attribution"
        );
    }

    let context = EstimationContext {
        total_samples: registry.total_samples(),
        total_seconds: registry.total_time().to_seconds(),
        z: config.z_value()?,
        filter_duplicates: config.filter_duplicate_readings,
    };

    let functions = registry
        .functions()
        .map(|f| report_for(f, &context))
        .collect();

    Ok(RegistryReport {
        total_samples: registry.total_samples(),
        total_time: registry.total_time(),
        config: *config,
        functions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::attribute;
    use crate::correlator::Snapshot;
    use crate::power::{PowerReading, PowerTimeline, ReadingId};
    use crate::trace_reader::StackFrame;

    const Z95: f64 = 1.959_963_985;

    #[test]
    fn test_probability_ci_boundary() {
        // N·p = 2 < 5
        assert!(!probability_interval(0.02, 100, Z95).valid);

        let ci = probability_interval(0.10, 100, Z95);
        assert!(ci.valid);
        assert!((ci.half_width() - 0.0588).abs() < 1e-4);
        assert!(ci.contains(0.10));
    }

    #[test]
    fn test_probability_ci_needs_complement_too() {
        // N·(1 − p) = 3
        assert!(!probability_interval(0.97, 100, Z95).valid);
        assert!(!probability_interval(0.0, 0, Z95).valid);
        assert!(!probability_interval(1.0, 1000, Z95).valid);
    }

    #[test]
    fn test_invalid_sentinel() {
        let ci = ConfidenceInterval::invalid();
        assert!(!ci.valid);
        assert_eq!(ci.lower, -1.0);
        assert!(!ci.contains(-1.0));
    }

    #[test]
    fn test_from_bounds_validity() {
        assert!(ConfidenceInterval::from_bounds(0.0, 0.0).valid);
        assert!(!ConfidenceInterval::from_bounds(-0.1, 0.2).valid);
        assert!(!ConfidenceInterval::from_bounds(0.3, 0.2).valid);
    }

    #[test]
    fn test_power_interval_about_point_estimate() {
        let ci = power_interval(&[1.0, 3.0], 2.0, Z95);
        // s = sqrt(2 / 1)
        let half = Z95 * 2.0f64.sqrt() / 2.0f64.sqrt();
        assert!(ci.valid);
        assert!((ci.lower - (2.0 - half)).abs() < 1e-12);
        assert!((ci.upper - (2.0 + half)).abs() < 1e-12);

        // Same population, off-centre point: interval moves with the point
        let shifted = power_interval(&[1.0, 3.0], 2.5, Z95);
        assert!((shifted.lower + shifted.upper - 5.0).abs() < 1e-12);
        assert!(shifted.half_width() > ci.half_width());
    }

    #[test]
    fn test_power_interval_single_reading_invalid() {
        assert!(!power_interval(&[4.0], 4.0, Z95).valid);
        assert!(!power_interval(&[], 0.0, Z95).valid);
    }

    #[test]
    fn test_energy_interval_requires_both() {
        let good = ConfidenceInterval::from_bounds(0.1, 0.2);
        let power = ConfidenceInterval::from_bounds(2.0, 3.0);
        let energy = energy_interval(&good, &power, 10.0);
        assert!(energy.valid);
        assert!((energy.lower - 2.0).abs() < 1e-12);
        assert!((energy.upper - 6.0).abs() < 1e-12);

        assert!(!energy_interval(&ConfidenceInterval::invalid(), &power, 10.0).valid);
        assert!(!energy_interval(&good, &ConfidenceInterval::invalid(), 10.0).valid);
    }

    #[test]
    fn test_config_validation() {
        assert!(EstimationConfig::default().validate().is_ok());
        let bad = EstimationConfig {
            alpha: 1.5,
            ..EstimationConfig::default()
        };
        assert!(bad.validate().is_err());
        assert!(matches!(bad.z_value(), Err(VatioError::InvalidConfig(_))));
        assert!((EstimationConfig::default().z_value().unwrap() - Z95).abs() < 1e-6);
    }

    fn scenario_registry() -> FunctionRegistry {
        let timeline = PowerTimeline::from_samples(vec![
            (TimeUnit::from_secs(0), 1.0),
            (TimeUnit::from_secs(1), 1.0),
            (TimeUnit::from_secs(2), 2.0),
        ])
        .unwrap();
        let stacks: [&[u64]; 3] = [&[0xA], &[0xA, 0xB], &[0xA]];
        let snaps: Vec<Snapshot> = stacks
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let t = TimeUnit::from_secs(i as i128);
                Snapshot::new(
                    t,
                    TimeUnit::from_secs(1),
                    *timeline.nearest_at_or_before(t).unwrap(),
                    s.iter().map(|a| StackFrame::new(*a, "f")).collect(),
                )
            })
            .collect();
        attribute(&snaps, &EstimationConfig::default())
    }

    #[test]
    fn test_scenario_estimates() {
        let report = estimate_registry(&scenario_registry(), &EstimationConfig::default()).unwrap();
        assert_eq!(report.total_samples, 3);

        let a = report.get(0xA).unwrap();
        assert_eq!(a.local.probability, 1.0);
        assert!(!a.local.probability_ci.valid);
        assert!(!a.local.energy_ci.valid);
        assert!((a.local.runtime - 3.0).abs() < 1e-12);
        assert!((a.local.mean_power - 4.0 / 3.0).abs() < 1e-12);
        assert!((a.local.energy_cost - 4.0).abs() < 1e-12);
        assert!((a.measured_local_energy - 4.0).abs() < 1e-12);
        assert_eq!(a.nonlocal.probability, 0.0);
        assert_eq!(a.nonlocal.mean_power, 0.0);

        let b = report.get(0xB).unwrap();
        assert!((b.nonlocal.probability - 1.0 / 3.0).abs() < 1e-12);
        assert!((b.nonlocal.energy_cost - 1.0).abs() < 1e-12);
        assert!((b.measured_nonlocal_energy - 1.0).abs() < 1e-12);
        assert!(!b.nonlocal.power_ci.valid);
    }

    #[test]
    fn test_zero_samples_registry() {
        let registry = FunctionRegistry::new(true);
        let report = estimate_registry(&registry, &EstimationConfig::default()).unwrap();
        assert!(report.functions.is_empty());
        assert_eq!(report.total_local_energy(), 0.0);
    }

    #[test]
    fn test_duplicate_filter_changes_population_only() {
        let reading = |seq, power| PowerReading {
            id: ReadingId { source: 1, seq },
            timestamp: TimeUnit::from_secs(seq as i128),
            power,
        };
        let mut f = FunctionAccumulator::new(1, "f");
        for r in [reading(0, 1.0), reading(0, 1.0), reading(0, 1.0), reading(1, 5.0)] {
            f.credit_leaf(&Snapshot::new(
                r.timestamp,
                TimeUnit::from_secs(1),
                r,
                vec![StackFrame::new(1, "f")],
            ));
        }

        let filtered = estimate_function(&f, 4, TimeUnit::from_secs(4), &EstimationConfig::default())
            .unwrap();
        let unfiltered = estimate_function(
            &f,
            4,
            TimeUnit::from_secs(4),
            &EstimationConfig {
                filter_duplicate_readings: false,
                ..EstimationConfig::default()
            },
        )
        .unwrap();

        assert_eq!(filtered.local.mean_power, unfiltered.local.mean_power);
        assert!((filtered.local.mean_power - 2.0).abs() < 1e-12);
        // n = 2 vs n = 4 readings in the population
        assert!(filtered.local.power_ci.half_width() > unfiltered.local.power_ci.half_width());
    }

    #[test]
    fn test_sorted_by_local_energy() {
        let report = estimate_registry(&scenario_registry(), &EstimationConfig::default()).unwrap();
        let sorted = report.sorted_by_local_energy();
        assert_eq!(sorted[0].address, 0xA);
        assert_eq!(sorted[1].address, 0xB);
    }
}
