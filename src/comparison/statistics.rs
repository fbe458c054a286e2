// Two-sample tests over per-trace energy populations
//
// - Welch's t-test through aprender's `ttest_ind` (unequal variances)
// - Mann-Whitney U: exact U distribution for small untied samples, otherwise
//   average ranks with the tie-corrected normal approximation (continuity
//   corrected, two-sided)
// - Medians through aprender's DescriptiveStats, variances through trueno

use crate::comparison::config::TestKind;
use crate::stats;
use anyhow::{Context, Result};
use aprender::stats::DescriptiveStats;
use serde::{Deserialize, Serialize};
use trueno::Vector;

/// Result of comparing a baseline population with a candidate population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalTest {
    pub test: TestKind,

    /// t statistic (Welch) or U of the baseline sample (Mann-Whitney)
    pub statistic: f64,

    /// Two-sided p-value
    pub pvalue: f64,

    pub baseline_median: f64,
    pub candidate_median: f64,

    /// Population variances (divide by n)
    pub baseline_variance: f64,
    pub candidate_variance: f64,
}

impl StatisticalTest {
    pub fn is_significant(&self, significance_level: f64) -> bool {
        self.pvalue < significance_level
    }
}

/// Run the configured test on two populations
pub fn compare_populations(
    baseline: &[f64],
    candidate: &[f64],
    test: TestKind,
) -> Result<StatisticalTest> {
    match test {
        TestKind::MannWhitney => mann_whitney(baseline, candidate),
        TestKind::Welch => welch(baseline, candidate),
    }
}

/// Welch's independent t-test
pub fn welch(baseline: &[f64], candidate: &[f64]) -> Result<StatisticalTest> {
    if baseline.len() < 2 || candidate.len() < 2 {
        anyhow::bail!("Need at least 2 samples per population for t-test");
    }

    let a = to_f32(baseline);
    let b = to_f32(candidate);
    let ttest = aprender::stats::hypothesis::ttest_ind(&a, &b, false)
        .context("Failed to compute t-test")?;

    let (baseline_median, baseline_variance) = describe(&a)?;
    let (candidate_median, candidate_variance) = describe(&b)?;

    Ok(StatisticalTest {
        test: TestKind::Welch,
        statistic: f64::from(ttest.statistic),
        pvalue: f64::from(ttest.pvalue),
        baseline_median,
        candidate_median,
        baseline_variance,
        candidate_variance,
    })
}

/// Largest sample size for which the exact U distribution is enumerated
const EXACT_MAX_SAMPLE: usize = 8;

/// Mann-Whitney U test
///
/// Untied samples of at most eight values per side get an exact p-value;
/// everything else uses the tie-corrected normal approximation.
///
/// # Example
/// ```
/// use vatio::comparison::mann_whitney;
///
/// let before = [1.0, 2.0, 3.0, 4.0, 5.0];
/// let after = [6.0, 7.0, 8.0, 9.0, 10.0];
/// let result = mann_whitney(&before, &after).unwrap();
/// assert_eq!(result.statistic, 0.0);
/// assert!(result.pvalue < 0.05);
/// ```
pub fn mann_whitney(baseline: &[f64], candidate: &[f64]) -> Result<StatisticalTest> {
    if baseline.is_empty() || candidate.is_empty() {
        anyhow::bail!("Cannot compare empty populations");
    }
    if baseline.iter().chain(candidate).any(|v| !v.is_finite()) {
        anyhow::bail!("Populations contain non-finite values");
    }

    let n1 = baseline.len() as f64;
    let n2 = candidate.len() as f64;
    let n = n1 + n2;

    let mut pooled: Vec<(f64, bool)> = baseline
        .iter()
        .map(|v| (*v, true))
        .chain(candidate.iter().map(|v| (*v, false)))
        .collect();
    pooled.sort_by(|x, y| x.0.total_cmp(&y.0));

    // Average ranks over tie groups
    let mut baseline_rank_sum = 0.0;
    let mut tie_term = 0.0;
    let mut start = 0;
    while start < pooled.len() {
        let mut end = start + 1;
        while end < pooled.len() && pooled[end].0 == pooled[start].0 {
            end += 1;
        }
        let ties = (end - start) as f64;
        let rank = (start + end + 1) as f64 / 2.0;
        baseline_rank_sum += rank * pooled[start..end].iter().filter(|(_, b)| *b).count() as f64;
        tie_term += ties.powi(3) - ties;
        start = end;
    }

    let u = baseline_rank_sum - n1 * (n1 + 1.0) / 2.0;
    let mean_u = n1 * n2 / 2.0;
    let variance_u = n1 * n2 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));

    let pvalue = if tie_term == 0.0 && baseline.len().max(candidate.len()) <= EXACT_MAX_SAMPLE {
        exact_pvalue(u, baseline.len(), candidate.len())
    } else if variance_u <= 0.0 {
        // Every value tied
        1.0
    } else {
        let z = ((u - mean_u).abs() - 0.5).max(0.0) / variance_u.sqrt();
        stats::two_sided_pvalue(z)
    };

    let (baseline_median, baseline_variance) = describe(&to_f32(baseline))?;
    let (candidate_median, candidate_variance) = describe(&to_f32(candidate))?;

    Ok(StatisticalTest {
        test: TestKind::MannWhitney,
        statistic: u,
        pvalue,
        baseline_median,
        candidate_median,
        baseline_variance,
        candidate_variance,
    })
}

/// Exact two-sided p-value of U for untied samples of size `n1` and `n2`
///
/// `c(i, j, u)` counts orderings of i baseline and j candidate values with
/// statistic u. The largest value either comes from the baseline, beating all
/// j candidates, or from the candidate side:
/// `c(i, j, u) = c(i - 1, j, u - j) + c(i, j - 1, u)`.
fn exact_pvalue(u: f64, n1: usize, n2: usize) -> f64 {
    let mut counts: Vec<Vec<Vec<f64>>> = vec![vec![Vec::new(); n2 + 1]; n1 + 1];
    for i in 0..=n1 {
        for j in 0..=n2 {
            let mut dist = vec![0.0; i * j + 1];
            if i == 0 || j == 0 {
                dist[0] = 1.0;
            } else {
                let beats_all = &counts[i - 1][j];
                let beats_none = &counts[i][j - 1];
                for (k, slot) in dist.iter_mut().enumerate() {
                    if k >= j {
                        *slot += beats_all.get(k - j).copied().unwrap_or(0.0);
                    }
                    *slot += beats_none.get(k).copied().unwrap_or(0.0);
                }
            }
            counts[i][j] = dist;
        }
    }

    let dist = &counts[n1][n2];
    let total: f64 = dist.iter().sum();
    let observed = (u.round().max(0.0) as usize).min(dist.len() - 1);
    let lower: f64 = dist[..=observed].iter().sum();
    let upper: f64 = dist[observed..].iter().sum();
    (2.0 * lower.min(upper) / total).min(1.0)
}

/// Calculate median using aprender's DescriptiveStats
pub fn median(vector: &Vector<f32>) -> Result<f32> {
    let stats = DescriptiveStats::new(vector);
    stats
        .quantile(0.5)
        .map_err(|e| anyhow::anyhow!("Failed to compute median: {}", e))
}

/// Median of an f64 population, computed by aprender in f32
pub fn median_of(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        anyhow::bail!("Cannot take the median of an empty population");
    }
    let vector = Vector::from_slice(&to_f32(values));
    Ok(f64::from(median(&vector)?))
}

/// Mean of an f64 population through trueno; 0 when empty
pub fn mean_of(values: &[f64]) -> f64 {
    let vector = Vector::from_slice(&to_f32(values));
    f64::from(vector.mean().unwrap_or(0.0))
}

fn describe(values: &[f32]) -> Result<(f64, f64)> {
    let vector = Vector::from_slice(values);
    let median = median(&vector)?;
    let variance = vector
        .variance()
        .context("Failed to compute variance")?;
    Ok((f64::from(median), f64::from(variance)))
}

fn to_f32(values: &[f64]) -> Vec<f32> {
    values.iter().map(|v| *v as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_length() {
        let vec = Vector::from_slice(&[1.0, 3.0, 5.0, 7.0, 9.0]);
        assert_eq!(median(&vec).unwrap(), 5.0);
    }

    #[test]
    fn test_median_even_length() {
        let vec = Vector::from_slice(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(median(&vec).unwrap(), 2.5);
    }

    #[test]
    fn test_median_of_f64_population() {
        assert_eq!(median_of(&[3.0, 1.0, 2.0]).unwrap(), 2.0);
        assert_eq!(median_of(&[4.0, 1.0, 2.0, 3.0]).unwrap(), 2.5);
        assert!(median_of(&[]).is_err());
    }

    #[test]
    fn test_mean_of() {
        assert_eq!(mean_of(&[1.0, 2.0, 6.0]), 3.0);
        assert_eq!(mean_of(&[]), 0.0);
    }

    #[test]
    fn test_median_of_matches_reported_median() {
        let values = [0.3, 1.7, 0.9, 2.2];
        let result = mann_whitney(&values, &[5.0, 6.0]).unwrap();
        assert_eq!(median_of(&values).unwrap(), result.baseline_median);
    }

    #[test]
    fn test_mann_whitney_separated() {
        let result = mann_whitney(&[1.0, 2.0, 3.0, 4.0, 5.0], &[6.0, 7.0, 8.0, 9.0, 10.0]).unwrap();
        assert_eq!(result.statistic, 0.0);
        // 2 of C(10, 5) = 252 orderings are this extreme
        assert!((result.pvalue - 2.0 / 252.0).abs() < 1e-12, "p = {}", result.pvalue);
        assert_eq!(result.baseline_median, 3.0);
        assert_eq!(result.candidate_median, 8.0);
    }

    #[test]
    fn test_mann_whitney_exact_three_per_side() {
        // 2 of C(6, 3) = 20 orderings: never below a 0.10 threshold
        let result = mann_whitney(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap();
        assert!((result.pvalue - 0.1).abs() < 1e-12, "p = {}", result.pvalue);
        assert!(!result.is_significant(0.10));
    }

    #[test]
    fn test_mann_whitney_exact_interleaved() {
        // U = 1 for 3 vs 3: P(U <= 1) = 2 / 20
        let result = mann_whitney(&[1.0, 2.0, 3.5], &[3.0, 4.0, 5.0]).unwrap();
        assert_eq!(result.statistic, 1.0);
        assert!((result.pvalue - 0.2).abs() < 1e-12, "p = {}", result.pvalue);

        // U at the centre of the distribution
        let result = mann_whitney(&[1.0, 4.0], &[2.0, 3.0]).unwrap();
        assert_eq!(result.pvalue, 1.0);
    }

    #[test]
    fn test_mann_whitney_large_samples_use_normal_approximation() {
        let a: Vec<f64> = (0..9).map(f64::from).collect();
        let b: Vec<f64> = (9..18).map(f64::from).collect();
        let result = mann_whitney(&a, &b).unwrap();
        // exact would be 2 / C(18, 9) ~ 4.1e-5
        assert!(result.pvalue > 1e-4 && result.pvalue < 1e-3, "p = {}", result.pvalue);
    }

    #[test]
    fn test_mann_whitney_symmetric_pvalue() {
        let a = [1.0, 4.0, 2.5, 7.0];
        let b = [3.0, 5.0, 6.0];
        let ab = mann_whitney(&a, &b).unwrap();
        let ba = mann_whitney(&b, &a).unwrap();
        assert!((ab.pvalue - ba.pvalue).abs() < 1e-12);
        assert!((ab.statistic + ba.statistic - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_mann_whitney_ties() {
        let result = mann_whitney(&[1.0, 2.0, 2.0, 3.0], &[2.0, 3.0, 3.0, 4.0]).unwrap();
        assert!(result.pvalue > 0.05);
        assert!(result.pvalue <= 1.0);
    }

    #[test]
    fn test_mann_whitney_all_tied() {
        let result = mann_whitney(&[2.0, 2.0], &[2.0, 2.0, 2.0]).unwrap();
        assert_eq!(result.pvalue, 1.0);
    }

    #[test]
    fn test_mann_whitney_rejects_empty() {
        assert!(mann_whitney(&[], &[1.0]).is_err());
        assert!(mann_whitney(&[f64::NAN], &[1.0]).is_err());
    }

    #[test]
    fn test_welch_significant_difference() {
        let baseline = [10.0, 12.0, 11.0, 13.0, 10.0];
        let candidate = [25.0, 27.0, 26.0, 28.0, 25.0];
        let result = welch(&baseline, &candidate).unwrap();
        assert!(result.pvalue < 0.05, "p-value {} should be < 0.05", result.pvalue);
        assert!(result.candidate_median > result.baseline_median);
        assert!(result.is_significant(0.05));
    }

    #[test]
    fn test_welch_no_difference() {
        let baseline = [10.0, 12.0, 11.0, 13.0, 10.0];
        let candidate = [11.0, 13.0, 10.0, 12.0, 11.0];
        let result = welch(&baseline, &candidate).unwrap();
        assert!(result.pvalue >= 0.05, "p-value {} should be >= 0.05", result.pvalue);
    }

    #[test]
    fn test_welch_insufficient_samples() {
        assert!(welch(&[10.0], &[12.0, 13.0]).is_err());
    }

    #[test]
    fn test_dispatch_by_kind() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        assert_eq!(compare_populations(&a, &b, TestKind::Welch).unwrap().test, TestKind::Welch);
        assert_eq!(
            compare_populations(&a, &b, TestKind::MannWhitney).unwrap().test,
            TestKind::MannWhitney
        );
    }
}
