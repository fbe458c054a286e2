//! Exact time quantities
//!
//! Timestamps from the profiler (nanoseconds since boot) and from the power
//! log (milliseconds since the epoch) are both compared and subtracted
//! constantly. Keeping them as integer nanoseconds avoids the drift that float
//! accumulation introduces over hundreds of thousands of samples.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

const NANOS_PER_MICRO: i128 = 1_000;
const NANOS_PER_MILLI: i128 = 1_000_000;
const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Signed time quantity stored as an integer nanosecond count
///
/// Used for both absolute timestamps and durations.
///
/// # Example
/// ```
/// use vatio::time_unit::TimeUnit;
///
/// let start = TimeUnit::from_millis(1_500);
/// let end = TimeUnit::from_secs(3);
/// assert_eq!((end - start).to_nanos(), 1_500_000_000);
/// assert_eq!((end - start).to_seconds(), 1.5);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeUnit {
    nanos: i128,
}

impl TimeUnit {
    pub const ZERO: TimeUnit = TimeUnit { nanos: 0 };

    pub const fn from_nanos(nanos: i128) -> Self {
        Self { nanos }
    }

    pub const fn from_micros(micros: i128) -> Self {
        Self {
            nanos: micros * NANOS_PER_MICRO,
        }
    }

    pub const fn from_millis(millis: i128) -> Self {
        Self {
            nanos: millis * NANOS_PER_MILLI,
        }
    }

    pub const fn from_secs(secs: i128) -> Self {
        Self {
            nanos: secs * NANOS_PER_SEC,
        }
    }

    /// Convert float seconds, splitting whole and fractional parts so that
    /// large epoch values keep nanosecond resolution in the fraction.
    pub fn from_secs_f64(secs: f64) -> Self {
        let whole = secs.trunc();
        let frac_nanos = (secs.fract() * NANOS_PER_SEC as f64).round();
        Self {
            nanos: whole as i128 * NANOS_PER_SEC + frac_nanos as i128,
        }
    }

    pub const fn to_nanos(self) -> i128 {
        self.nanos
    }

    pub fn to_micros(self) -> f64 {
        self.ratio(NANOS_PER_MICRO)
    }

    pub fn to_millis(self) -> f64 {
        self.ratio(NANOS_PER_MILLI)
    }

    pub fn to_seconds(self) -> f64 {
        self.ratio(NANOS_PER_SEC)
    }

    pub const fn is_negative(self) -> bool {
        self.nanos < 0
    }

    // Integer division first so epoch-sized values lose precision only in the remainder
    fn ratio(self, unit: i128) -> f64 {
        let whole = self.nanos / unit;
        let rem = self.nanos % unit;
        whole as f64 + rem as f64 / unit as f64
    }
}

impl Add for TimeUnit {
    type Output = TimeUnit;

    fn add(self, rhs: TimeUnit) -> TimeUnit {
        TimeUnit::from_nanos(self.nanos + rhs.nanos)
    }
}

impl AddAssign for TimeUnit {
    fn add_assign(&mut self, rhs: TimeUnit) {
        self.nanos += rhs.nanos;
    }
}

impl Sub for TimeUnit {
    type Output = TimeUnit;

    fn sub(self, rhs: TimeUnit) -> TimeUnit {
        TimeUnit::from_nanos(self.nanos - rhs.nanos)
    }
}

impl SubAssign for TimeUnit {
    fn sub_assign(&mut self, rhs: TimeUnit) {
        self.nanos -= rhs.nanos;
    }
}

impl Sum for TimeUnit {
    fn sum<I: Iterator<Item = TimeUnit>>(iter: I) -> TimeUnit {
        iter.fold(TimeUnit::ZERO, |acc, t| acc + t)
    }
}

impl<'a> Sum<&'a TimeUnit> for TimeUnit {
    fn sum<I: Iterator<Item = &'a TimeUnit>>(iter: I) -> TimeUnit {
        iter.copied().sum()
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.nanos)
    }
}

// Stored as a plain integer when it fits in i64, as a decimal string otherwise.
// Not every registry format can carry 128-bit integers.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StoredNanos {
    Int(i64),
    Text(String),
}

impl Serialize for TimeUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match i64::try_from(self.nanos) {
            Ok(n) => StoredNanos::Int(n).serialize(serializer),
            Err(_) => StoredNanos::Text(self.nanos.to_string()).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for TimeUnit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match StoredNanos::deserialize(deserializer)? {
            StoredNanos::Int(n) => Ok(TimeUnit::from_nanos(n as i128)),
            StoredNanos::Text(s) => s
                .parse::<i128>()
                .map(TimeUnit::from_nanos)
                .map_err(serde::de::Error::custom),
        }
    }
}
