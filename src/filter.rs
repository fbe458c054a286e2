//! Function filtering by symbol name
//!
//! Supports:
//! - Include pattern: `render_.*` keeps functions with a matching name
//! - Exclude pattern: `!^std::` drops functions with a matching name
//! - Both, comma separated: `app::,!app::log`

use crate::error::{Result, VatioError};
use regex::Regex;
use std::collections::BTreeSet;

/// Decides which functions take part in exports and comparisons
#[derive(Debug, Clone, Default)]
pub struct FunctionFilter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl FunctionFilter {
    /// Create a filter that keeps every function
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse a filter expression
    ///
    /// Comma-separated regex patterns; a leading `!` makes a pattern an
    /// exclusion. Several patterns of one kind are alternatives.
    pub fn from_expr(expr: &str) -> Result<Self> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();

        for part in expr.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match part.strip_prefix('!') {
                Some(negated) if !negated.is_empty() => exclude.push(negated),
                Some(_) => {
                    return Err(VatioError::InvalidConfig(format!(
                        "empty exclusion in filter expression '{expr}'"
                    )))
                }
                None => include.push(part),
            }
        }

        Ok(Self {
            include: compile(&include)?,
            exclude: compile(&exclude)?,
        })
    }

    /// Whether a function known under `names` passes the filter
    ///
    /// A function passes when any name matches an include pattern (or there
    /// is none) and no name matches an exclude pattern.
    pub fn matches(&self, names: &BTreeSet<String>) -> bool {
        let included = match &self.include {
            Some(re) => names.iter().any(|n| re.is_match(n)),
            None => true,
        };
        let excluded = match &self.exclude {
            Some(re) => names.iter().any(|n| re.is_match(n)),
            None => false,
        };
        included && !excluded
    }

    pub fn matches_name(&self, name: &str) -> bool {
        let included = match &self.include {
            Some(re) => re.is_match(name),
            None => true,
        };
        let excluded = self.exclude.as_ref().is_some_and(|re| re.is_match(name));
        included && !excluded
    }

    pub fn is_all(&self) -> bool {
        self.include.is_none() && self.exclude.is_none()
    }
}

fn compile(patterns: &[&str]) -> Result<Option<Regex>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let joined = patterns
        .iter()
        .map(|p| format!("(?:{p})"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&joined)
        .map(Some)
        .map_err(|e| VatioError::InvalidConfig(format!("invalid function filter: {e}")))
}
