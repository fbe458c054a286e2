// Power timeline: ordered power readings with "latest at or before t" lookup
//
// The power sensor and the stack sampler run on independent clocks and at
// different rates. Every stack sample is priced with the most recent power
// reading that was already known when the sample was taken, never one from
// the future.

use crate::error::{Result, VatioError};
use crate::time_unit::TimeUnit;
use fnv::FnvHasher;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;

/// Stable identity of one physical sensor reading
///
/// The sensor updates slower than the stack sampler, so many snapshots share
/// one reading. Identity (not value equality) decides whether two snapshots
/// observed the same reading.
///
/// - `source`: fingerprint of the timeline the reading belongs to, salted
///   with where it was ingested from
/// - `seq`: position of the reading within that timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReadingId {
    pub source: u64,
    pub seq: u64,
}

/// A single power reading in watts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerReading {
    pub id: ReadingId,
    pub timestamp: TimeUnit,
    pub power: f64,
}

/// Power readings sorted by timestamp (non-decreasing)
#[derive(Debug, Clone)]
pub struct PowerTimeline {
    readings: Vec<PowerReading>,
    source: u64,
}

impl PowerTimeline {
    /// Build a timeline from `(timestamp, watts)` pairs in source order
    ///
    /// Fails with [`VatioError::UnorderedInput`] if a timestamp is earlier than
    /// its predecessor. The input is never re-sorted: the order the sensor
    /// produced readings in is part of the data.
    ///
    /// # Example
    /// ```
    /// use vatio::power::PowerTimeline;
    /// use vatio::time_unit::TimeUnit;
    ///
    /// let timeline = PowerTimeline::from_samples(vec![
    ///     (TimeUnit::from_millis(0), 1.0),
    ///     (TimeUnit::from_millis(10), 2.0),
    /// ])
    /// .unwrap();
    ///
    /// let reading = timeline.nearest_at_or_before(TimeUnit::from_millis(9)).unwrap();
    /// assert_eq!(reading.power, 1.0);
    /// ```
    pub fn from_samples<I>(samples: I) -> Result<Self>
    where
        I: IntoIterator<Item = (TimeUnit, f64)>,
    {
        let samples: Vec<(TimeUnit, f64)> = samples.into_iter().collect();

        for (index, pair) in samples.windows(2).enumerate() {
            if pair[1].0 < pair[0].0 {
                return Err(VatioError::UnorderedInput {
                    index: index + 1,
                    previous_ns: pair[0].0.to_nanos(),
                    found_ns: pair[1].0.to_nanos(),
                });
            }
        }

        let source = fingerprint(&samples);
        let readings = samples
            .into_iter()
            .enumerate()
            .map(|(seq, (timestamp, power))| PowerReading {
                id: ReadingId {
                    source,
                    seq: seq as u64,
                },
                timestamp,
                power,
            })
            .collect();

        Ok(Self { readings, source })
    }

    /// Salt every reading identity with an ingestion label
    ///
    /// Byte-identical logs from two independent runs would otherwise share
    /// reading identities, and merged populations would collapse across runs.
    pub fn with_source_label(mut self, label: &str) -> Self {
        let mut hasher = FnvHasher::default();
        hasher.write(label.as_bytes());
        hasher.write_u64(self.source);
        self.source = hasher.finish();
        for reading in &mut self.readings {
            reading.id.source = self.source;
        }
        self
    }

    /// Fingerprint shared by every [`ReadingId`] of this timeline
    pub fn source(&self) -> u64 {
        self.source
    }

    pub fn readings(&self) -> &[PowerReading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Latest reading whose timestamp is `<= t`
    ///
    /// Queries earlier than the first reading return the first reading, since
    /// nothing older is known. With several readings at the same timestamp the
    /// last one wins. O(log n).
    pub fn nearest_at_or_before(&self, t: TimeUnit) -> Result<&PowerReading> {
        let first = self.readings.first().ok_or(VatioError::EmptyTimeline)?;
        let idx = self.readings.partition_point(|r| r.timestamp <= t);
        if idx == 0 {
            return Ok(first);
        }
        Ok(&self.readings[idx - 1])
    }

    /// Time-weighted average power over the whole timeline
    ///
    /// Each reading is held until the next one arrives; the final reading only
    /// marks the end of the covered span. A timeline spanning zero time
    /// averages its readings arithmetically.
    pub fn time_weighted_average(&self) -> Result<f64> {
        let (first, last) = match (self.readings.first(), self.readings.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(VatioError::EmptyTimeline),
        };

        let total = (last.timestamp - first.timestamp).to_seconds();
        if total <= 0.0 {
            let sum: f64 = self.readings.iter().map(|r| r.power).sum();
            return Ok(sum / self.readings.len() as f64);
        }

        let joules: f64 = self
            .readings
            .windows(2)
            .map(|pair| pair[0].power * (pair[1].timestamp - pair[0].timestamp).to_seconds())
            .sum();

        Ok(joules / total)
    }
}

fn fingerprint(samples: &[(TimeUnit, f64)]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write_usize(samples.len());
    for (timestamp, power) in samples {
        hasher.write_i128(timestamp.to_nanos());
        hasher.write_u64(power.to_bits());
    }
    hasher.finish()
}
