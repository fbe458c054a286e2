//! Error types for the attribution engine
//!
//! Every fallible library operation returns [`Result`]. Degenerate statistics
//! (too few samples, probabilities too close to 0 or 1) are NOT errors: they
//! surface as invalid confidence intervals instead.

use thiserror::Error;

/// Errors that can occur while building timelines, reading traces or storing registries
#[derive(Error, Debug)]
pub enum VatioError {
    #[error("Power readings out of order: reading {index} at {found_ns}ns precedes previous reading at {previous_ns}ns")]
    UnorderedInput {
        index: usize,
        previous_ns: i128,
        found_ns: i128,
    },

    #[error("Power timeline is empty")]
    EmptyTimeline,

    #[error("Unsupported sampling event '{0}' (only task-clock and cpu-clock are supported)")]
    UnsupportedEvent(String),

    #[error("Malformed power log line {line}: {reason}")]
    MalformedLogLine { line: usize, reason: String },

    #[error("Malformed trace sample on line {line}: {reason}")]
    MalformedSample { line: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported registry file '{0}' (expected .json or .msgpack)")]
    UnsupportedFormat(String),

    #[error("Batch worker thread panicked")]
    WorkerPanicked,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for attribution engine operations
pub type Result<T> = std::result::Result<T, VatioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unordered_input_message() {
        let err = VatioError::UnorderedInput {
            index: 3,
            previous_ns: 2_000,
            found_ns: 1_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("reading 3"));
        assert!(msg.contains("1000ns"));
        assert!(msg.contains("2000ns"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: VatioError = io.into();
        assert!(matches!(err, VatioError::Io(_)));
    }

    #[test]
    fn test_unsupported_event_names_event() {
        let err = VatioError::UnsupportedEvent("cache-misses".to_string());
        assert!(err.to_string().contains("cache-misses"));
    }
}
