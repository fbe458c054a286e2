//! Stack-sample input
//!
//! Decoding the profiler's binary record format and resolving symbols happens
//! outside this crate. What arrives here is an ordered stream of already
//! symbolized samples; [`SampleSource`] is the seam, and [`JsonLinesReader`]
//! is the adapter for the JSON-lines export of a simpleperf/perf report.
//!
//! One JSON object per line:
//!
//! ```text
//! {"timestamp_ns": 1000, "period_ns": 250000, "event": "cpu-clock",
//!  "threads": [[{"addr": 4096, "symbol": "leaf", "dso": "libapp.so"},
//!               {"addr": 8192, "symbol": "main", "dso": "libapp.so"}]]}
//! ```

use crate::error::{Result, VatioError};
use crate::time_unit::TimeUnit;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Lines};
use std::path::Path;

/// Sampling event that produced a sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    TaskClock,
    CpuClock,
    Other(String),
}

impl EventKind {
    /// Classify a profiler event name (e.g. `"cpu-clock:u"`)
    pub fn from_name(name: &str) -> Self {
        if name.contains("task-clock") {
            EventKind::TaskClock
        } else if name.contains("cpu-clock") {
            EventKind::CpuClock
        } else {
            EventKind::Other(name.to_string())
        }
    }

    /// Whether the sample period measures elapsed time
    ///
    /// Only time-based samples can be priced with power × duration.
    pub fn is_time_based(&self) -> bool {
        matches!(self, EventKind::TaskClock | EventKind::CpuClock)
    }

    pub fn name(&self) -> &str {
        match self {
            EventKind::TaskClock => "task-clock",
            EventKind::CpuClock => "cpu-clock",
            EventKind::Other(name) => name,
        }
    }
}

/// One resolved frame of a call stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Start address of the function containing the instruction
    #[serde(rename = "addr")]
    pub address: u64,
    pub symbol: String,
    /// Shared object or executable the symbol lives in
    #[serde(default)]
    pub dso: String,
}

impl StackFrame {
    pub fn new(address: u64, symbol: impl Into<String>) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            dso: String::new(),
        }
    }

    pub fn with_dso(mut self, dso: impl Into<String>) -> Self {
        self.dso = dso.into();
        self
    }
}

/// One profiler sample, possibly covering several threads
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub timestamp: TimeUnit,
    /// Time until the next sample
    pub duration: TimeUnit,
    pub event: EventKind,
    /// Leaf-to-root call stacks, one per thread
    pub threads: Vec<Vec<StackFrame>>,
}

impl RawSample {
    /// Stack of the first thread; the engine models the target as single-threaded
    pub fn first_stack(&self) -> Option<&[StackFrame]> {
        self.threads.first().map(Vec::as_slice)
    }
}

/// Ordered stream of stack samples
pub trait SampleSource: Iterator<Item = Result<RawSample>> {}

impl<T> SampleSource for T where T: Iterator<Item = Result<RawSample>> {}

#[derive(Debug, Deserialize)]
struct SampleRecord {
    timestamp_ns: i64,
    period_ns: i64,
    event: String,
    #[serde(default)]
    threads: Vec<Vec<StackFrame>>,
}

/// Reads samples from a JSON-lines export, one object per line
pub struct JsonLinesReader<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
}

impl JsonLinesReader<std::io::BufReader<std::fs::File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(Self::new(std::io::BufReader::new(file)))
    }
}

impl<R: BufRead> JsonLinesReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }

    fn parse_record(&self, text: &str) -> Result<RawSample> {
        let record: SampleRecord =
            serde_json::from_str(text).map_err(|e| VatioError::MalformedSample {
                line: self.line_no,
                reason: e.to_string(),
            })?;

        if record.period_ns < 0 {
            return Err(VatioError::MalformedSample {
                line: self.line_no,
                reason: format!("negative period {}", record.period_ns),
            });
        }

        Ok(RawSample {
            timestamp: TimeUnit::from_nanos(i128::from(record.timestamp_ns)),
            duration: TimeUnit::from_nanos(i128::from(record.period_ns)),
            event: EventKind::from_name(&record.event),
            threads: record.threads,
        })
    }
}

impl<R: BufRead> Iterator for JsonLinesReader<R> {
    type Item = Result<RawSample>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;

            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            return Some(self.parse_record(text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_event_kind_classification() {
        assert_eq!(EventKind::from_name("task-clock"), EventKind::TaskClock);
        assert_eq!(EventKind::from_name("cpu-clock:u"), EventKind::CpuClock);
        let other = EventKind::from_name("cache-misses");
        assert!(!other.is_time_based());
        assert_eq!(other.name(), "cache-misses");
    }

    #[test]
    fn test_reads_samples_in_order() {
        let text = r#"{"timestamp_ns": 10, "period_ns": 5, "event": "cpu-clock", "threads": [[{"addr": 1, "symbol": "a", "dso": "x.so"}]]}

{"timestamp_ns": 15, "period_ns": 5, "event": "cpu-clock", "threads": [[{"addr": 2, "symbol": "b"}]]}
"#;
        let samples: Vec<RawSample> = JsonLinesReader::new(Cursor::new(text))
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].timestamp, TimeUnit::from_nanos(10));
        assert_eq!(samples[0].first_stack().unwrap()[0].dso, "x.so");
        assert_eq!(samples[1].first_stack().unwrap()[0].symbol, "b");
        assert_eq!(samples[1].first_stack().unwrap()[0].dso, "");
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let text = "{\"timestamp_ns\": 1, \"period_ns\": 1, \"event\": \"cpu-clock\"}\nnot json\n";
        let results: Vec<Result<RawSample>> = JsonLinesReader::new(Cursor::new(text)).collect();
        assert!(results[0].is_ok());
        match &results[1] {
            Err(VatioError::MalformedSample { line, .. }) => assert_eq!(*line, 2),
            other => panic!("expected MalformedSample, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_period_rejected() {
        let text = r#"{"timestamp_ns": 1, "period_ns": -3, "event": "cpu-clock"}"#;
        let result = JsonLinesReader::new(Cursor::new(text)).next().unwrap();
        assert!(matches!(result, Err(VatioError::MalformedSample { .. })));
    }

    #[test]
    fn test_missing_threads_is_empty() {
        let text = r#"{"timestamp_ns": 1, "period_ns": 3, "event": "task-clock"}"#;
        let sample = JsonLinesReader::new(Cursor::new(text))
            .next()
            .unwrap()
            .unwrap();
        assert!(sample.first_stack().is_none());
    }
}
