// Per-function energy populations across traces
//
// Each independent trace contributes one local and one non-local energy cost
// per function. Unlike a merged registry, nothing is summed: the values stay
// separate so two conditions can be tested against each other.

use crate::attribution::join_names;
use crate::comparison::statistics::median_of;
use crate::estimator::{FunctionReport, RegistryReport};
use crate::filter::FunctionFilter;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Energy cost of one function in every trace of a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionEnergySum {
    pub address: u64,
    pub names: BTreeSet<String>,
    /// One local energy cost (J) per trace the function appeared in
    pub local_energies: Vec<f64>,
    pub nonlocal_energies: Vec<f64>,
}

impl FunctionEnergySum {
    pub fn from_report(report: &FunctionReport) -> Self {
        Self {
            address: report.address,
            names: report.names.clone(),
            local_energies: vec![report.local.energy_cost],
            nonlocal_energies: vec![report.nonlocal.energy_cost],
        }
    }

    /// Add one more trace's costs for this function
    pub fn push(&mut self, report: &FunctionReport) {
        if self.address != report.address && self.names.is_disjoint(&report.names) {
            tracing::warn!(
                left = self.address,
                right = report.address,
                "adding energy costs of functions that appear unrelated"
            );
        }
        self.names.extend(report.names.iter().cloned());
        self.local_energies.push(report.local.energy_cost);
        self.nonlocal_energies.push(report.nonlocal.energy_cost);
    }

    /// Number of traces contributing
    pub fn traces(&self) -> usize {
        self.local_energies.len()
    }

    pub fn median_local(&self) -> f64 {
        median_of(&self.local_energies).unwrap_or(0.0)
    }

    pub fn median_nonlocal(&self) -> f64 {
        median_of(&self.nonlocal_energies).unwrap_or(0.0)
    }

    pub fn display_name(&self) -> String {
        join_names(&self.names)
    }
}

/// Build one energy population per address over a condition's traces
pub fn build_energy_sums(
    reports: &[RegistryReport],
    filter: &FunctionFilter,
) -> BTreeMap<u64, FunctionEnergySum> {
    let mut sums: BTreeMap<u64, FunctionEnergySum> = BTreeMap::new();
    for report in reports {
        for function in report.functions.iter().filter(|f| filter.matches(&f.names)) {
            match sums.get_mut(&function.address) {
                Some(sum) => sum.push(function),
                None => {
                    sums.insert(function.address, FunctionEnergySum::from_report(function));
                }
            }
        }
    }
    sums
}

/// Measured energy of a whole trace: leaf periods partition the samples
pub fn trace_energy_total(report: &RegistryReport, filter: &FunctionFilter) -> f64 {
    report
        .functions
        .iter()
        .filter(|f| filter.matches(&f.names))
        .map(|f| f.measured_local_energy)
        .sum()
}
