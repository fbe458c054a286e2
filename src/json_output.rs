//! JSON output of estimation and comparison results

use crate::comparison::{ComparisonReport, PowerComparisonReport};
use crate::estimator::RegistryReport;
use serde::{Deserialize, Serialize};

/// Summary statistics for the analysed traces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSummary {
    pub total_samples: u64,
    pub total_time_s: f64,
    pub functions: usize,
    /// Sum of local energy cost, the estimated trace energy
    pub total_energy_j: f64,
}

/// Root JSON output structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonOutput {
    /// Format version identifier
    pub version: String,
    /// Format name
    pub format: String,
    pub summary: JsonSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RegistryReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_comparison: Option<PowerComparisonReport>,
}

impl JsonOutput {
    pub fn from_report(report: RegistryReport) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "vatio-json-v1".to_string(),
            summary: JsonSummary {
                total_samples: report.total_samples,
                total_time_s: report.total_time.to_seconds(),
                functions: report.functions.len(),
                total_energy_j: report.total_local_energy(),
            },
            report: Some(report),
            comparison: None,
            power_comparison: None,
        }
    }

    pub fn from_comparison(comparison: ComparisonReport) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "vatio-json-v1".to_string(),
            summary: JsonSummary {
                total_samples: 0,
                total_time_s: 0.0,
                functions: comparison.comparisons.len() + comparison.unmatched.len(),
                total_energy_j: 0.0,
            },
            report: None,
            comparison: Some(comparison),
            power_comparison: None,
        }
    }

    pub fn from_power_comparison(comparison: PowerComparisonReport) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "vatio-json-v1".to_string(),
            summary: JsonSummary {
                total_samples: 0,
                total_time_s: 0.0,
                functions: comparison.functions.len(),
                total_energy_j: 0.0,
            },
            report: None,
            comparison: None,
            power_comparison: Some(comparison),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
