// Function registry: address-indexed arena of function accumulators
//
// The call graph is stored as address keys inside each accumulator, so
// recursion (self-loops, cycles) never creates reference cycles and the whole
// registry serializes as plain data.

use crate::attribution::function::FunctionAccumulator;
use crate::time_unit::TimeUnit;
use crate::trace_reader::StackFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All functions observed in one or more traces, plus trace-wide totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionRegistry {
    functions: BTreeMap<u64, FunctionAccumulator>,
    total_samples: u64,
    total_time: TimeUnit,
    /// Methodology flag: whether duplicate power readings were filtered when
    /// this registry was produced
    filter_duplicate_readings: bool,
}

impl FunctionRegistry {
    pub fn new(filter_duplicate_readings: bool) -> Self {
        Self {
            filter_duplicate_readings,
            ..Self::default()
        }
    }

    /// Resolve a frame to its accumulator, creating it on first sight
    pub fn resolve(&mut self, frame: &StackFrame) -> &mut FunctionAccumulator {
        let function = self
            .functions
            .entry(frame.address)
            .or_insert_with(|| FunctionAccumulator::new(frame.address, &frame.symbol));
        function.add_name(&frame.symbol);
        function
    }

    pub(crate) fn record_sample(&mut self, duration: TimeUnit) {
        self.total_samples += 1;
        self.total_time += duration;
    }

    pub fn get(&self, address: u64) -> Option<&FunctionAccumulator> {
        self.functions.get(&address)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionAccumulator> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn total_time(&self) -> TimeUnit {
        self.total_time
    }

    pub fn filter_duplicate_readings(&self) -> bool {
        self.filter_duplicate_readings
    }

    /// Sum another registry into this one
    ///
    /// Functions only present in `other` are copied in; functions present in
    /// both are added together. Totals add. Summation is associative and
    /// commutative up to floating-point reordering.
    pub fn merge(&mut self, other: &FunctionRegistry) {
        if self.filter_duplicate_readings != other.filter_duplicate_readings {
            tracing::warn!(
                left = self.filter_duplicate_readings,
                right = other.filter_duplicate_readings,
                "merging registries produced with different duplicate-reading settings; \
                 results mix methodologies"
            );
        }

        for (address, function) in &other.functions {
            match self.functions.get_mut(address) {
                Some(existing) => existing.merge(function),
                None => {
                    self.functions.insert(*address, function.clone());
                }
            }
        }

        self.total_samples += other.total_samples;
        self.total_time += other.total_time;
    }
}
