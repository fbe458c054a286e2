// Environment log parsing
//
// The logging app on the device writes one line per sensor event:
//
//     <millis> <kind> <data...>
//
// Voltage (millivolts) and current (raw counter units) arrive as separate
// events. Power only exists once both are known, and every new voltage or
// current event produces a fresh power reading stamped with the later of the
// two timestamps.

use crate::error::{Result, VatioError};
use crate::power::timeline::PowerTimeline;
use crate::time_unit::TimeUnit;
use std::io::BufRead;
use std::path::Path;

/// Payload of one environment log line
#[derive(Debug, Clone, PartialEq)]
pub enum LogKind {
    /// Battery rail voltage in volts
    Voltage(f64),
    /// Battery rail current in amps
    Current(f64),
    DisplayState { display: String, state: String },
    Brightness(String),
    WifiStrength(String),
    WifiRoam(String),
    CellStrength(String),
}

/// One parsed environment log line
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: TimeUnit,
    pub kind: LogKind,
}

/// Parsed environment log with its derived power timeline
#[derive(Debug, Clone)]
pub struct EnvironmentLog {
    entries: Vec<LogEntry>,
    timeline: PowerTimeline,
}

impl EnvironmentLog {
    /// Read and parse an environment log file
    ///
    /// Reading identities are salted with the path, so two runs with
    /// identical logs never share readings.
    pub fn from_file(path: &Path, current_divider: f64) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut log = Self::from_reader(std::io::BufReader::new(file), current_divider)?;
        log.timeline = log.timeline.with_source_label(&path.to_string_lossy());
        Ok(log)
    }

    /// Parse an environment log from any line source
    ///
    /// `current_divider` converts the raw current counter into amps; it
    /// depends on the device's fuel gauge.
    pub fn from_reader<R: BufRead>(reader: R, current_divider: f64) -> Result<Self> {
        if !(current_divider.is_finite() && current_divider != 0.0) {
            return Err(VatioError::InvalidConfig(format!(
                "current_divider must be finite and non-zero, got {}",
                current_divider
            )));
        }

        let mut entries = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if let Some(entry) = parse_line(&line, idx + 1, current_divider)? {
                entries.push(entry);
            }
        }

        let timeline = PowerTimeline::from_samples(pair_power(&entries)?)?;
        tracing::debug!(
            entries = entries.len(),
            readings = timeline.len(),
            "parsed environment log"
        );

        Ok(Self { entries, timeline })
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn timeline(&self) -> &PowerTimeline {
        &self.timeline
    }

    pub fn into_timeline(self) -> PowerTimeline {
        self.timeline
    }
}

/// Parse a single log line
///
/// Returns `Ok(None)` for blank lines and for kinds this parser does not know
/// (such as the `INIT FILE` header). A known kind with missing or non-numeric
/// data is an error.
pub fn parse_line(line: &str, line_no: usize, current_divider: f64) -> Result<Option<LogEntry>> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 2 {
        return Ok(None);
    }

    let kind_name = fields[1].to_lowercase();
    if !is_known_kind(&kind_name) {
        tracing::warn!(line = line_no, "skipping unexpected log line: {}", line.trim());
        return Ok(None);
    }

    let malformed = |reason: String| VatioError::MalformedLogLine {
        line: line_no,
        reason,
    };

    let millis: i64 = fields[0]
        .parse()
        .map_err(|_| malformed(format!("invalid timestamp '{}'", fields[0])))?;
    let timestamp = TimeUnit::from_millis(i128::from(millis));

    let data = fields
        .get(2)
        .copied()
        .ok_or_else(|| malformed(format!("missing data for '{}'", kind_name)))?;
    let number = || -> Result<f64> {
        data.parse::<f64>()
            .map_err(|_| malformed(format!("invalid {} value '{}'", kind_name, data)))
    };

    let kind = match kind_name.as_str() {
        "voltage" => LogKind::Voltage(number()? / 1000.0),
        "current" => LogKind::Current(number()? / current_divider),
        "displaystate" => LogKind::DisplayState {
            display: data.to_string(),
            state: fields
                .get(3)
                .ok_or_else(|| malformed("missing display state".to_string()))?
                .to_string(),
        },
        "dispbrightness" => LogKind::Brightness(data.to_string()),
        "wifi" => LogKind::WifiStrength(data.to_string()),
        "wifiroam" => LogKind::WifiRoam(data.to_string()),
        "cellular" => LogKind::CellStrength(data.to_string()),
        _ => return Ok(None),
    };

    Ok(Some(LogEntry { timestamp, kind }))
}

fn is_known_kind(kind: &str) -> bool {
    matches!(
        kind,
        "voltage" | "current" | "displaystate" | "dispbrightness" | "wifi" | "wifiroam" | "cellular"
    )
}

/// Combine the voltage and current streams into `(timestamp, watts)` readings
fn pair_power(entries: &[LogEntry]) -> Result<Vec<(TimeUnit, f64)>> {
    let mut last_voltage: Option<(TimeUnit, f64)> = None;
    let mut last_current: Option<(TimeUnit, f64)> = None;
    let mut readings = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let (last, value) = match entry.kind {
            LogKind::Voltage(v) => (&mut last_voltage, v),
            LogKind::Current(a) => (&mut last_current, a),
            _ => continue,
        };

        if let Some((prev, _)) = *last {
            if entry.timestamp < prev {
                return Err(VatioError::UnorderedInput {
                    index,
                    previous_ns: prev.to_nanos(),
                    found_ns: entry.timestamp.to_nanos(),
                });
            }
        }
        *last = Some((entry.timestamp, value));

        if let (Some((vt, volts)), Some((ct, amps))) = (last_voltage, last_current) {
            readings.push((vt.max(ct), volts * amps));
        }
    }

    Ok(readings)
}
