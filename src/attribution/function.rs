// Per-function accumulators
//
// An accumulator only ever holds counts and sums. Everything derived from
// them (probabilities, runtimes, intervals) lives in `estimator`, so merging
// two accumulators never has to touch stale derived values.

use crate::correlator::Snapshot;
use crate::power::{PowerReading, ReadingId};
use crate::time_unit::TimeUnit;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How often one physical power reading was credited to a function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadingTally {
    pub id: ReadingId,
    pub power: f64,
    pub count: u64,
}

/// Power readings credited to a function, keyed by reading identity
///
/// Many snapshots share one sensor reading. Keeping a count per reading lets
/// the estimator use either every credited sample or each physical reading
/// once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ReadingTally>", into = "Vec<ReadingTally>")]
pub struct PowerPopulation {
    tallies: BTreeMap<ReadingId, ReadingTally>,
}

impl PowerPopulation {
    pub fn record(&mut self, reading: &PowerReading) {
        self.tallies
            .entry(reading.id)
            .and_modify(|t| t.count += 1)
            .or_insert(ReadingTally {
                id: reading.id,
                power: reading.power,
                count: 1,
            });
    }

    pub fn merge(&mut self, other: &PowerPopulation) {
        for tally in other.tallies.values() {
            self.tallies
                .entry(tally.id)
                .and_modify(|t| t.count += tally.count)
                .or_insert(*tally);
        }
    }

    /// Number of distinct physical readings
    pub fn distinct(&self) -> usize {
        self.tallies.len()
    }

    /// Number of credited samples, duplicates included
    pub fn total(&self) -> u64 {
        self.tallies.values().map(|t| t.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }

    /// Power values of the population
    ///
    /// With `filter_duplicates` each physical reading contributes once;
    /// otherwise once per credited sample.
    pub fn values(&self, filter_duplicates: bool) -> Vec<f64> {
        if filter_duplicates {
            return self.tallies.values().map(|t| t.power).collect();
        }
        self.tallies
            .values()
            .flat_map(|t| std::iter::repeat(t.power).take(t.count as usize))
            .collect()
    }
}

impl From<Vec<ReadingTally>> for PowerPopulation {
    fn from(tallies: Vec<ReadingTally>) -> Self {
        let mut population = PowerPopulation::default();
        for tally in tallies {
            population
                .tallies
                .entry(tally.id)
                .and_modify(|t| t.count += tally.count)
                .or_insert(tally);
        }
        population
    }
}

impl From<PowerPopulation> for Vec<ReadingTally> {
    fn from(population: PowerPopulation) -> Self {
        population.tallies.into_values().collect()
    }
}

/// Accumulated cost of one function (keyed by code address)
///
/// - local: the function was the innermost frame
/// - non-local: the function was somewhere up the stack, i.e. something it
///   called (transitively) was executing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionAccumulator {
    pub address: u64,
    /// Every symbol name seen for this address
    pub names: BTreeSet<String>,
    pub leaf_samples: u64,
    pub tree_samples: u64,
    pub local_time: TimeUnit,
    pub nonlocal_time: TimeUnit,
    pub local_energy: f64,
    pub nonlocal_energy: f64,
    /// Sum of the power readings of all leaf samples
    pub local_power: f64,
    /// Sum of the power readings of all tree samples
    pub nonlocal_power: f64,
    pub local_readings: PowerPopulation,
    pub nonlocal_readings: PowerPopulation,
    /// Addresses of functions observed one frame closer to the leaf
    pub children: BTreeSet<u64>,
}

impl FunctionAccumulator {
    pub fn new(address: u64, name: &str) -> Self {
        let mut names = BTreeSet::new();
        names.insert(name.to_string());
        Self {
            address,
            names,
            leaf_samples: 0,
            tree_samples: 0,
            local_time: TimeUnit::ZERO,
            nonlocal_time: TimeUnit::ZERO,
            local_energy: 0.0,
            nonlocal_energy: 0.0,
            local_power: 0.0,
            nonlocal_power: 0.0,
            local_readings: PowerPopulation::default(),
            nonlocal_readings: PowerPopulation::default(),
            children: BTreeSet::new(),
        }
    }

    pub fn add_name(&mut self, name: &str) {
        if !self.names.contains(name) {
            self.names.insert(name.to_string());
        }
    }

    /// Credit a snapshot in which this function was the leaf
    pub fn credit_leaf(&mut self, snapshot: &Snapshot) {
        self.leaf_samples += 1;
        self.local_time += snapshot.duration;
        self.local_energy += snapshot.energy;
        self.local_power += snapshot.reading.power;
        self.local_readings.record(&snapshot.reading);
    }

    /// Credit a snapshot in which this function was an active caller
    ///
    /// The whole snapshot is credited, not a share of it.
    pub fn credit_tree(&mut self, snapshot: &Snapshot) {
        self.tree_samples += 1;
        self.nonlocal_time += snapshot.duration;
        self.nonlocal_energy += snapshot.energy;
        self.nonlocal_power += snapshot.reading.power;
        self.nonlocal_readings.record(&snapshot.reading);
    }

    /// Fold another accumulator's counts and sums into this one
    pub fn merge(&mut self, other: &FunctionAccumulator) {
        if self.address != other.address && self.names.is_disjoint(&other.names) {
            tracing::warn!(
                left = self.address,
                right = other.address,
                "merging functions with different addresses and disjoint names; \
                 they may not be the same function"
            );
        }

        self.names.extend(other.names.iter().cloned());
        self.leaf_samples += other.leaf_samples;
        self.tree_samples += other.tree_samples;
        self.local_time += other.local_time;
        self.nonlocal_time += other.nonlocal_time;
        self.local_energy += other.local_energy;
        self.nonlocal_energy += other.nonlocal_energy;
        self.local_power += other.local_power;
        self.nonlocal_power += other.nonlocal_power;
        self.local_readings.merge(&other.local_readings);
        self.nonlocal_readings.merge(&other.nonlocal_readings);
        self.children.extend(other.children.iter().copied());
    }

    /// Names joined for display, e.g. `"foo .. foo_v2"`
    pub fn display_name(&self) -> String {
        join_names(&self.names)
    }
}

pub(crate) fn join_names(names: &BTreeSet<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(" .. ")
}
