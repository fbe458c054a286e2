//! Registry persistence
//!
//! Registries are stored as accumulators (never as derived reports) so they
//! can be merged later. The format follows the file extension: `.json` for
//! JSON, `.msgpack` or `.mp` for MessagePack.

use crate::attribution::FunctionRegistry;
use crate::error::{Result, VatioError};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// On-disk registry encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    Json,
    MessagePack,
}

impl StoreFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(StoreFormat::Json),
            Some("msgpack") | Some("mp") => Ok(StoreFormat::MessagePack),
            _ => Err(VatioError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

pub fn save_registry(path: &Path, registry: &FunctionRegistry) -> Result<()> {
    let format = StoreFormat::from_path(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    match format {
        StoreFormat::Json => serde_json::to_writer(&mut writer, registry)?,
        StoreFormat::MessagePack => rmp_serde::encode::write_named(&mut writer, registry)?,
    }
    writer.flush()?;
    tracing::debug!(path = %path.display(), functions = registry.len(), "saved registry");
    Ok(())
}

pub fn load_registry(path: &Path) -> Result<FunctionRegistry> {
    let format = StoreFormat::from_path(path)?;
    let reader = BufReader::new(File::open(path)?);
    let registry: FunctionRegistry = match format {
        StoreFormat::Json => serde_json::from_reader(reader)?,
        StoreFormat::MessagePack => rmp_serde::from_read(reader)?,
    };
    tracing::debug!(path = %path.display(), functions = registry.len(), "loaded registry");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::attribute;
    use crate::correlator::Snapshot;
    use crate::estimator::EstimationConfig;
    use crate::power::PowerTimeline;
    use crate::time_unit::TimeUnit;
    use crate::trace_reader::StackFrame;
    use tempfile::TempDir;

    fn sample_registry() -> FunctionRegistry {
        let timeline = PowerTimeline::from_samples(vec![
            (TimeUnit::ZERO, 1.5),
            (TimeUnit::from_millis(10), 2.5),
        ])
        .unwrap();
        let snaps: Vec<Snapshot> = (0..4)
            .map(|i| {
                let t = TimeUnit::from_millis(i * 5);
                Snapshot::new(
                    t,
                    TimeUnit::from_millis(5),
                    *timeline.nearest_at_or_before(t).unwrap(),
                    vec![
                        StackFrame::new(0x1000 + i as u64 % 2, "leaf"),
                        StackFrame::new(0xffff_ffff_ffff_0000, "main"),
                    ],
                )
            })
            .collect();
        attribute(&snaps, &EstimationConfig::default())
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(StoreFormat::from_path(Path::new("a.json")).unwrap(), StoreFormat::Json);
        assert_eq!(
            StoreFormat::from_path(Path::new("a.msgpack")).unwrap(),
            StoreFormat::MessagePack
        );
        assert!(matches!(
            StoreFormat::from_path(Path::new("a.pickle")),
            Err(VatioError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_json_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reg.json");
        let registry = sample_registry();
        save_registry(&path, &registry).unwrap();
        assert_eq!(load_registry(&path).unwrap(), registry);
    }

    #[test]
    fn test_msgpack_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reg.msgpack");
        let registry = sample_registry();
        save_registry(&path, &registry).unwrap();
        assert_eq!(load_registry(&path).unwrap(), registry);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_registry(&dir.path().join("absent.json")),
            Err(VatioError::Io(_))
        ));
    }
}
