// Configuration for cross-condition energy comparison
//
// A condition is a population of independent traces (e.g. every run before a
// change). Functions are matched across the two conditions and their
// per-trace energy costs tested for a difference.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Two-sample test applied to matched functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TestKind {
    /// Mann-Whitney U (rank based, no distribution assumption)
    #[default]
    MannWhitney,
    /// Welch's t-test (unequal variances)
    Welch,
}

impl TestKind {
    pub fn name(&self) -> &'static str {
        match self {
            TestKind::MannWhitney => "mann-whitney",
            TestKind::Welch => "welch",
        }
    }

    /// Smallest per-condition population the test can run on
    pub fn minimum_population(&self) -> usize {
        match self {
            TestKind::MannWhitney => 1,
            TestKind::Welch => 2,
        }
    }
}

/// How functions of one condition are paired with the other's
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Same code address
    #[default]
    Address,
    /// At least one symbol name in common (survives relinking)
    Name,
}

/// Configuration for energy comparison between two conditions
///
/// # Example
/// ```
/// use vatio::comparison::{ComparisonConfig, TestKind};
///
/// let config = ComparisonConfig::default();
/// assert_eq!(config.significance_level, 0.05);
/// assert_eq!(config.test, TestKind::MannWhitney);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Significance level (alpha) used to flag a difference
    ///
    /// - 0.05 (default): 95% confidence
    /// - 0.01: stricter, fewer false positives
    /// - 0.10: looser, catches smaller shifts
    pub significance_level: f64,

    /// Test applied to local and non-local populations
    pub test: TestKind,

    /// Pairing rule between conditions
    pub match_by: MatchMode,

    /// Minimum traces per condition before a function is tested
    ///
    /// Populations below this size are reported as untestable, not dropped.
    pub min_sample_size: usize,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            test: TestKind::MannWhitney,
            match_by: MatchMode::Address,
            min_sample_size: 3,
        }
    }
}

impl ComparisonConfig {
    /// Create a strict configuration (fewer false positives, more false negatives)
    pub fn strict() -> Self {
        Self {
            significance_level: 0.01,
            min_sample_size: 10,
            ..Self::default()
        }
    }

    /// Create a permissive configuration (more false positives, fewer false negatives)
    pub fn permissive() -> Self {
        Self {
            significance_level: 0.10,
            min_sample_size: 2,
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.significance_level > 0.0 && self.significance_level <= 1.0) {
            return Err(format!(
                "significance_level must be in (0, 1], got {}",
                self.significance_level
            ));
        }

        let minimum = self.test.minimum_population();
        if self.min_sample_size < minimum {
            return Err(format!(
                "min_sample_size must be >= {} for {}, got {}",
                minimum,
                self.test.name(),
                self.min_sample_size
            ));
        }

        Ok(())
    }
}
