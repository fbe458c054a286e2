//! Human-readable summary tables

use crate::estimator::{ConfidenceInterval, RegistryReport};
use crate::filter::FunctionFilter;

const RULE_WIDTH: usize = 96;

fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    let kept: String = name.chars().take(width.saturating_sub(1)).collect();
    format!("{kept}…")
}

fn format_interval(ci: &ConfidenceInterval) -> String {
    if ci.valid {
        format!("±{:.3}", ci.half_width())
    } else {
        "n/a".to_string()
    }
}

/// Function table sorted by local energy, at most `top` rows
pub fn format_summary(report: &RegistryReport, filter: &FunctionFilter, top: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("╔{}╗\n", "═".repeat(RULE_WIDTH - 2)));
    out.push_str(&format!(
        "║  {:<width$}║\n",
        "Energy Attribution Summary (sorted by local energy)",
        width = RULE_WIDTH - 4
    ));
    out.push_str(&format!("╚{}╝\n", "═".repeat(RULE_WIDTH - 2)));
    out.push_str(&format!(
        "Samples: {}   Runtime: {:.3}s   Estimated energy: {:.3}J   (alpha = {})\n\n",
        report.total_samples,
        report.total_time.to_seconds(),
        report.total_local_energy(),
        report.config.alpha
    ));

    let rows: Vec<_> = report
        .sorted_by_local_energy()
        .into_iter()
        .filter(|f| filter.matches(&f.names))
        .collect();

    if rows.is_empty() {
        out.push_str("No functions attributed.\n");
        return out;
    }

    out.push_str(&format!(
        "{:<40} {:>8} {:>10} {:>10} {:>12} {:>12}\n",
        "Function", "Leaf %", "Local J", "± CI", "Non-local J", "± CI"
    ));
    out.push_str(&"─".repeat(RULE_WIDTH));
    out.push('\n');

    for function in rows.iter().take(top) {
        out.push_str(&format!(
            "{:<40} {:>7.2}% {:>10.4} {:>10} {:>12.4} {:>12}\n",
            truncate(&function.display_name(), 40),
            function.local.probability * 100.0,
            function.local.energy_cost,
            format_interval(&function.local.energy_ci),
            function.nonlocal.energy_cost,
            format_interval(&function.nonlocal.energy_ci),
        ));
    }

    out.push_str(&"─".repeat(RULE_WIDTH));
    out.push('\n');
    if rows.len() > top {
        out.push_str(&format!("... {} more functions\n", rows.len() - top));
    }
    out
}

/// Print the function table to stderr
pub fn print_summary(report: &RegistryReport, filter: &FunctionFilter, top: usize) {
    eprintln!();
    eprint!("{}", format_summary(report, filter, top));
}
