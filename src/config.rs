//! Analysis configuration file
//!
//! Every setting has a default, so an empty file (or no file) is valid:
//!
//! ```toml
//! [estimation]
//! alpha = 0.05
//! filter_duplicate_readings = true
//!
//! [power]
//! current_divider = 1e9
//!
//! [comparison]
//! significance_level = 0.05
//! test = "mann-whitney"      # or "welch"
//! match_by = "address"       # or "name"
//! min_sample_size = 3
//!
//! [batch]
//! workers = 4
//! ```

use crate::comparison::ComparisonConfig;
use crate::error::{Result, VatioError};
use crate::estimator::EstimationConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Power log interpretation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    /// Raw current readings are divided by this to get amperes
    pub current_divider: f64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            current_divider: 1e9,
        }
    }
}

impl PowerConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.current_divider.is_finite() || self.current_divider == 0.0 {
            return Err(format!(
                "current_divider must be finite and non-zero, got {}",
                self.current_divider
            ));
        }
        Ok(())
    }
}

/// Parallel trace processing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker threads; 0 uses the available parallelism
    pub workers: usize,
}

impl BatchConfig {
    /// Worker count to actually spawn
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Complete analysis configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub estimation: EstimationConfig,
    pub power: PowerConfig,
    pub comparison: ComparisonConfig,
    pub batch: BatchConfig,
}

impl AnalysisConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AnalysisConfig = toml::from_str(content)?;
        config.validate().map_err(VatioError::InvalidConfig)?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.estimation
            .validate()
            .map_err(|e| format!("[estimation] {e}"))?;
        self.power.validate().map_err(|e| format!("[power] {e}"))?;
        self.comparison
            .validate()
            .map_err(|e| format!("[comparison] {e}"))?;
        Ok(())
    }
}
