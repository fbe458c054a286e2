//! CSV export of function reports and comparison results
//!
//! Intervals are written as two columns (lower, upper); an invalid interval
//! leaves both empty.

use crate::comparison::{
    ComparisonReport, FunctionEnergySum, PowerComparisonReport, PowerTest, TestOutcome,
};
use crate::estimator::{ConfidenceInterval, CostEstimate, FunctionReport, RegistryReport};

/// Escape CSV field (handle commas, quotes, newlines)
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn push_interval(fields: &mut Vec<String>, ci: &ConfidenceInterval) {
    if ci.valid {
        fields.push(ci.lower.to_string());
        fields.push(ci.upper.to_string());
    } else {
        fields.push(String::new());
        fields.push(String::new());
    }
}

/// Per-function CSV export
#[derive(Debug)]
pub struct FunctionCsvOutput<'a> {
    functions: Vec<&'a FunctionReport>,
}

impl<'a> FunctionCsvOutput<'a> {
    /// Rows ordered by local energy cost, largest first
    pub fn new(report: &'a RegistryReport) -> Self {
        Self {
            functions: report.sorted_by_local_energy(),
        }
    }

    /// Keep only the rows accepted by `keep`
    pub fn retain<F>(mut self, mut keep: F) -> Self
    where
        F: FnMut(&FunctionReport) -> bool,
    {
        self.functions.retain(|f| keep(f));
        self
    }

    fn header() -> String {
        let mut headers: Vec<String> = ["address", "names", "leaf_samples", "tree_samples"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        for side in ["local", "nonlocal"] {
            for quantity in ["probability", "runtime_s", "energy_j", "mean_power_w"] {
                headers.push(format!("{side}_{quantity}"));
                headers.push(format!("{side}_{quantity}_lower"));
                headers.push(format!("{side}_{quantity}_upper"));
            }
        }
        headers.join(",")
    }

    fn push_estimate(fields: &mut Vec<String>, estimate: &CostEstimate) {
        fields.push(estimate.probability.to_string());
        push_interval(fields, &estimate.probability_ci);
        fields.push(estimate.runtime.to_string());
        push_interval(fields, &estimate.runtime_ci);
        fields.push(estimate.energy_cost.to_string());
        push_interval(fields, &estimate.energy_ci);
        fields.push(estimate.mean_power.to_string());
        push_interval(fields, &estimate.power_ci);
    }

    fn format_function(function: &FunctionReport) -> String {
        let mut fields = vec![
            format!("0x{:x}", function.address),
            escape_field(&function.display_name()),
            function.local.samples.to_string(),
            function.nonlocal.samples.to_string(),
        ];
        Self::push_estimate(&mut fields, &function.local);
        Self::push_estimate(&mut fields, &function.nonlocal);
        fields.join(",")
    }

    /// Generate CSV output as string
    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str(&Self::header());
        output.push('\n');
        for function in &self.functions {
            output.push_str(&Self::format_function(function));
            output.push('\n');
        }
        output
    }
}

fn outcome_fields(outcome: &TestOutcome) -> [String; 2] {
    match outcome {
        TestOutcome::Tested(test) => [test.statistic.to_string(), test.pvalue.to_string()],
        TestOutcome::Untestable { reason } => [String::new(), escape_field(reason)],
    }
}

fn join_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Matched-function comparison rows
pub fn comparison_csv(report: &ComparisonReport) -> String {
    let mut output = String::from(
        "baseline_address,candidate_address,names,test,\
         baseline_median_local_j,candidate_median_local_j,local_statistic,local_pvalue,\
         baseline_median_nonlocal_j,candidate_median_nonlocal_j,nonlocal_statistic,nonlocal_pvalue\n",
    );

    for comparison in &report.comparisons {
        let mut names = comparison.baseline.names.clone();
        names.extend(comparison.candidate.names.iter().cloned());
        let [local_stat, local_p] = outcome_fields(&comparison.local);
        let [nonlocal_stat, nonlocal_p] = outcome_fields(&comparison.nonlocal);

        let fields = [
            format!("0x{:x}", comparison.baseline.address),
            format!("0x{:x}", comparison.candidate.address),
            escape_field(&crate::attribution::join_names(&names)),
            report.config.test.name().to_string(),
            comparison.baseline.median_local().to_string(),
            comparison.candidate.median_local().to_string(),
            local_stat,
            local_p,
            comparison.baseline.median_nonlocal().to_string(),
            comparison.candidate.median_nonlocal().to_string(),
            nonlocal_stat,
            nonlocal_p,
        ];
        output.push_str(&fields.join(","));
        output.push('\n');
    }

    output
}

fn format_power_test(address: &str, names: &str, test: &PowerTest) -> String {
    let [statistic, pvalue] = outcome_fields(&test.outcome);
    [
        address.to_string(),
        escape_field(names),
        test.quantity.name().to_string(),
        test.baseline_mean.to_string(),
        test.candidate_mean.to_string(),
        test.baseline_readings.to_string(),
        test.candidate_readings.to_string(),
        statistic,
        pvalue,
    ]
    .join(",")
}

/// Power-draw comparison rows: the whole trace first, then three per function
pub fn power_comparison_csv(report: &PowerComparisonReport) -> String {
    let mut output = String::from(
        "address,names,quantity,baseline_mean_w,candidate_mean_w,\
         baseline_readings,candidate_readings,statistic,pvalue\n",
    );
    output.push_str(&format_power_test("", "", &report.trace));
    output.push('\n');

    for function in &report.functions {
        let address = format!("0x{:x}", function.address);
        let names = function.display_name();
        for test in function.tests() {
            output.push_str(&format_power_test(&address, &names, test));
            output.push('\n');
        }
    }
    output
}

fn format_energy_sum(side: &str, sum: &FunctionEnergySum) -> String {
    [
        side.to_string(),
        format!("0x{:x}", sum.address),
        escape_field(&sum.display_name()),
        sum.traces().to_string(),
        join_values(&sum.local_energies),
        join_values(&sum.nonlocal_energies),
    ]
    .join(",")
}

/// Functions present in only one condition
pub fn unmatched_csv(report: &ComparisonReport) -> String {
    let mut output = String::from("side,address,names,traces,local_energies_j,nonlocal_energies_j\n");
    for unmatched in &report.unmatched {
        output.push_str(&format_energy_sum(unmatched.side.name(), &unmatched.sum));
        output.push('\n');
    }
    output
}
