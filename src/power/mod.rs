// Power-rail data: environment log parsing and the power timeline
//
// The timeline is the only thing the rest of the engine needs; the
// environment log parser is one way to produce it.

mod env_log;
mod timeline;

pub use env_log::{parse_line, EnvironmentLog, LogEntry, LogKind};
pub use timeline::{PowerReading, PowerTimeline, ReadingId};
