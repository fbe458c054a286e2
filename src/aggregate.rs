//! Cross-trace summation
//!
//! Independent runs of the same binary are summed into one registry to
//! tighten the confidence intervals. Reports are re-derived afterwards from
//! the merged accumulators; nothing derived is ever merged.

use crate::attribution::FunctionRegistry;

/// Sum two registries into a new one
pub fn merge_registries(left: &FunctionRegistry, right: &FunctionRegistry) -> FunctionRegistry {
    let mut merged = left.clone();
    merged.merge(right);
    merged
}

/// Sum any number of registries, left to right
///
/// Returns `None` for an empty input.
pub fn merge_all<'a, I>(registries: I) -> Option<FunctionRegistry>
where
    I: IntoIterator<Item = &'a FunctionRegistry>,
{
    let mut iter = registries.into_iter();
    let mut merged = iter.next()?.clone();
    let mut count = 1usize;
    for registry in iter {
        merged.merge(registry);
        count += 1;
    }
    tracing::info!(
        traces = count,
        functions = merged.len(),
        samples = merged.total_samples(),
        "merged registries"
    );
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::attribute;
    use crate::correlator::Snapshot;
    use crate::estimator::{estimate_registry, EstimationConfig};
    use crate::power::PowerTimeline;
    use crate::time_unit::TimeUnit;
    use crate::trace_reader::StackFrame;

    fn registry(powers: &[f64], stacks: &[&[u64]]) -> FunctionRegistry {
        let timeline = PowerTimeline::from_samples(
            powers
                .iter()
                .enumerate()
                .map(|(i, p)| (TimeUnit::from_millis(i as i128 * 100), *p)),
        )
        .unwrap();
        let snaps: Vec<Snapshot> = stacks
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let t = TimeUnit::from_millis(i as i128 * 100);
                Snapshot::new(
                    t,
                    TimeUnit::from_millis(100),
                    *timeline.nearest_at_or_before(t).unwrap(),
                    s.iter().map(|a| StackFrame::new(*a, format!("f{a}"))).collect(),
                )
            })
            .collect();
        attribute(&snaps, &EstimationConfig::default())
    }

    fn r1() -> FunctionRegistry {
        registry(&[1.0, 2.0], &[&[1, 2], &[2]])
    }
    fn r2() -> FunctionRegistry {
        registry(&[3.0, 1.0, 2.0], &[&[3], &[1, 3], &[1, 2, 3]])
    }
    fn r3() -> FunctionRegistry {
        registry(&[0.5], &[&[2, 1]])
    }

    #[test]
    fn test_merge_associative() {
        let left = merge_registries(&merge_registries(&r1(), &r2()), &r3());
        let right = merge_registries(&r1(), &merge_registries(&r2(), &r3()));

        assert_eq!(left.total_samples(), right.total_samples());
        assert_eq!(left.total_time(), right.total_time());
        assert_eq!(left.len(), right.len());
        for f in left.functions() {
            let g = right.get(f.address).unwrap();
            assert_eq!(f.leaf_samples, g.leaf_samples);
            assert_eq!(f.tree_samples, g.tree_samples);
            assert_eq!(f.local_time, g.local_time);
            assert!((f.local_energy - g.local_energy).abs() < 1e-9);
            assert!((f.nonlocal_energy - g.nonlocal_energy).abs() < 1e-9);
            assert_eq!(f.local_readings, g.local_readings);
            assert_eq!(f.children, g.children);
            assert_eq!(f.names, g.names);
        }
    }

    #[test]
    fn test_merge_commutative_counts() {
        let ab = merge_registries(&r1(), &r2());
        let ba = merge_registries(&r2(), &r1());
        for f in ab.functions() {
            let g = ba.get(f.address).unwrap();
            assert_eq!(f.leaf_samples, g.leaf_samples);
            assert_eq!(f.tree_samples, g.tree_samples);
        }
    }

    #[test]
    fn test_merge_all_matches_pairwise() {
        let all = merge_all([&r1(), &r2(), &r3()]).unwrap();
        let pairwise = merge_registries(&merge_registries(&r1(), &r2()), &r3());
        assert_eq!(all, pairwise);
        assert_eq!(all.total_samples(), 6);
    }

    #[test]
    fn test_merge_all_empty() {
        let none: [&FunctionRegistry; 0] = [];
        assert!(merge_all(none).is_none());
    }

    #[test]
    fn test_readings_from_different_traces_stay_distinct() {
        // Same position, same wattage, different power logs
        let a = registry(&[1.0, 9.0], &[&[5]]);
        let b = registry(&[1.0, 7.0], &[&[5]]);
        let merged = merge_registries(&a, &b);
        let f5 = merged.get(5).unwrap();
        assert_eq!(f5.local_readings.distinct(), 2);
        assert_eq!(f5.local_readings.total(), 2);
    }

    #[test]
    fn test_report_rederived_after_merge() {
        let merged = merge_registries(&r1(), &r3());
        let report = estimate_registry(&merged, &EstimationConfig::default()).unwrap();
        let f2 = report.get(2).unwrap();
        // f2 is leaf in 2 of 3 samples
        assert!((f2.local.probability - 2.0 / 3.0).abs() < 1e-12);
    }
}
