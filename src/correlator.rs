//! Sample correlation: stack samples × power timeline → execution snapshots
//!
//! Each stack sample is priced with the most recent power reading known at the
//! sample's timestamp: `energy = watts × duration_seconds`.

use crate::error::{Result, VatioError};
use crate::power::{PowerReading, PowerTimeline};
use crate::time_unit::TimeUnit;
use crate::trace_reader::{SampleSource, StackFrame};

/// One priced profiling sample
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub timestamp: TimeUnit,
    /// Time until the next snapshot
    pub duration: TimeUnit,
    /// Joules attributed to this snapshot
    pub energy: f64,
    /// Power reading used for pricing
    pub reading: PowerReading,
    /// Leaf-to-root call stack (never empty)
    pub stack: Vec<StackFrame>,
}

impl Snapshot {
    pub fn new(
        timestamp: TimeUnit,
        duration: TimeUnit,
        reading: PowerReading,
        stack: Vec<StackFrame>,
    ) -> Self {
        Self {
            timestamp,
            duration,
            energy: reading.power * duration.to_seconds(),
            reading,
            stack,
        }
    }

    /// Currently executing frame
    pub fn leaf(&self) -> Option<&StackFrame> {
        self.stack.first()
    }
}

/// Correlate an ordered sample stream with a power timeline
///
/// Only the first thread of each sample is used. Samples without a stack are
/// dropped. Any non-time-based sampling event aborts the whole trace with
/// [`VatioError::UnsupportedEvent`]: pricing such samples by duration would
/// produce silently wrong attribution.
pub fn correlate<S: SampleSource>(samples: S, timeline: &PowerTimeline) -> Result<Vec<Snapshot>> {
    if timeline.is_empty() {
        return Err(VatioError::EmptyTimeline);
    }

    let mut snapshots = Vec::new();
    let mut dropped = 0usize;

    for sample in samples {
        let sample = sample?;
        if !sample.event.is_time_based() {
            return Err(VatioError::UnsupportedEvent(sample.event.name().to_string()));
        }

        let stack = match sample.first_stack() {
            Some(stack) if !stack.is_empty() => stack.to_vec(),
            _ => {
                dropped += 1;
                continue;
            }
        };

        let reading = *timeline.nearest_at_or_before(sample.timestamp)?;
        snapshots.push(Snapshot::new(
            sample.timestamp,
            sample.duration,
            reading,
            stack,
        ));
    }

    if dropped > 0 {
        tracing::debug!(dropped, "dropped samples without a call stack");
    }
    tracing::debug!(snapshots = snapshots.len(), "correlated samples with power timeline");

    Ok(snapshots)
}
