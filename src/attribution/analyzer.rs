// Single-threaded call-chain attribution
//
// The target program is modelled as one thread that may or may not be
// scheduled. Each snapshot credits its leaf with local cost and every distinct
// caller on the stack with the full snapshot as non-local cost.

use crate::attribution::registry::FunctionRegistry;
use crate::correlator::Snapshot;
use crate::estimator::EstimationConfig;
use crate::time_unit::TimeUnit;
use std::collections::HashSet;

/// Inclusive timestamp window restricting which snapshots are analysed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisWindow {
    pub begin: Option<TimeUnit>,
    pub end: Option<TimeUnit>,
}

impl AnalysisWindow {
    pub fn contains(&self, t: TimeUnit) -> bool {
        let after_begin = match self.begin {
            Some(begin) => t >= begin,
            None => true,
        };
        let before_end = match self.end {
            Some(end) => t <= end,
            None => true,
        };
        after_begin && before_end
    }
}

/// Streams snapshots into a [`FunctionRegistry`]
///
/// Ordering matters: snapshots must be observed in trace order, one trace per
/// attributor.
#[derive(Debug)]
pub struct Attributor {
    registry: FunctionRegistry,
    window: AnalysisWindow,
    // Addresses credited within the current snapshot
    credited: HashSet<u64>,
    skipped: u64,
}

impl Attributor {
    pub fn new(config: &EstimationConfig) -> Self {
        Self {
            registry: FunctionRegistry::new(config.filter_duplicate_readings),
            window: AnalysisWindow::default(),
            credited: HashSet::new(),
            skipped: 0,
        }
    }

    pub fn with_window(mut self, window: AnalysisWindow) -> Self {
        self.window = window;
        self
    }

    /// Attribute one snapshot
    pub fn observe(&mut self, snapshot: &Snapshot) {
        if !self.window.contains(snapshot.timestamp) {
            self.skipped += 1;
            return;
        }
        let Some((leaf, callers)) = snapshot.stack.split_first() else {
            return;
        };

        self.registry.resolve(leaf).credit_leaf(snapshot);

        // Recursion: a caller appearing several times is credited once, but
        // every edge is still recorded
        self.credited.clear();
        let mut child = leaf.address;
        for frame in callers {
            let function = self.registry.resolve(frame);
            function.children.insert(child);
            if self.credited.insert(frame.address) {
                function.credit_tree(snapshot);
            }
            child = frame.address;
        }

        self.registry.record_sample(snapshot.duration);
    }

    pub fn finish(self) -> FunctionRegistry {
        if self.skipped > 0 {
            tracing::debug!(skipped = self.skipped, "snapshots outside analysis window");
        }
        tracing::debug!(
            functions = self.registry.len(),
            samples = self.registry.total_samples(),
            "attribution finished"
        );
        self.registry
    }
}

/// Attribute a complete snapshot sequence
///
/// # Example
/// ```
/// use vatio::attribution::attribute;
/// use vatio::correlator::Snapshot;
/// use vatio::estimator::EstimationConfig;
/// use vatio::power::PowerTimeline;
/// use vatio::time_unit::TimeUnit;
/// use vatio::trace_reader::StackFrame;
///
/// let timeline = PowerTimeline::from_samples(vec![(TimeUnit::ZERO, 2.0)]).unwrap();
/// let reading = timeline.readings()[0];
/// let snapshots = vec![Snapshot::new(
///     TimeUnit::ZERO,
///     TimeUnit::from_secs(1),
///     reading,
///     vec![StackFrame::new(0x10, "leaf"), StackFrame::new(0x20, "main")],
/// )];
///
/// let registry = attribute(&snapshots, &EstimationConfig::default());
/// assert_eq!(registry.get(0x10).unwrap().leaf_samples, 1);
/// assert_eq!(registry.get(0x20).unwrap().tree_samples, 1);
/// ```
pub fn attribute(snapshots: &[Snapshot], config: &EstimationConfig) -> FunctionRegistry {
    attribute_window(snapshots, config, AnalysisWindow::default())
}

/// Attribute the snapshots whose timestamp falls inside `window`
pub fn attribute_window(
    snapshots: &[Snapshot],
    config: &EstimationConfig,
    window: AnalysisWindow,
) -> FunctionRegistry {
    let mut attributor = Attributor::new(config).with_window(window);
    for snapshot in snapshots {
        attributor.observe(snapshot);
    }
    attributor.finish()
}
