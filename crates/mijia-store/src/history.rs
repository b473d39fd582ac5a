//! Per-device reading archives.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use time::format_description::well_known::Rfc3339;
use tracing::debug;

use mijia_core::{DeviceRecord, Reading};

use crate::error::{Error, Result};

/// Append-only timestamped archive, one JSON file per device.
///
/// The storage layer is not an append-only stream: each write loads the
/// device's full history, inserts the sample under its timestamp key and
/// rewrites the whole file. Memory is bounded by one device's history and
/// each write is O(history size), which is fine at the expected volumes.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    dir: PathBuf,
}

impl HistoryLog {
    /// A log rooted at `dir`; each device's file name comes from its
    /// `history_file` field.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the history file for `device`.
    pub fn path_for(&self, device: &DeviceRecord) -> PathBuf {
        self.dir.join(&device.history_file)
    }

    /// Append `reading` to the device's history.
    ///
    /// A duplicate timestamp overwrites the earlier sample. A history file
    /// that exists but cannot be parsed is an error: it is on-disk state
    /// the operator must recover by hand, not something to discard.
    pub fn append(&self, device: &DeviceRecord, reading: &Reading) -> Result<()> {
        let path = self.path_for(device);
        let mut history = self.load_file(&path)?;

        let key = reading.timestamp.format(&Rfc3339)?;
        history.insert(key, reading.clone());

        let json = serde_json::to_string_pretty(&history)?;
        fs::write(&path, json).map_err(|e| Error::Write {
            path: path.clone(),
            source: e,
        })?;
        debug!(
            "history for {} now holds {} entries",
            device.addr,
            history.len()
        );
        Ok(())
    }

    /// Load a device's full history; absent or empty files are empty maps.
    pub fn load(&self, device: &DeviceRecord) -> Result<BTreeMap<String, Reading>> {
        self.load_file(&self.path_for(device))
    }

    fn load_file(&self, path: &Path) -> Result<BTreeMap<String, Reading>> {
        match fs::read_to_string(path) {
            Ok(json) if json.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(json) => serde_json::from_str(&json).map_err(|e| Error::Parse {
                path: path.to_path_buf(),
                source: e,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(Error::Read {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn device() -> DeviceRecord {
        DeviceRecord::discovered("A4:C1:38:AA:BB:CC", "LYWSD03MMC", "Sensor 01")
    }

    fn reading_at(ts: time::OffsetDateTime, temperature: f64) -> Reading {
        Reading {
            timestamp: ts,
            temperature,
            humidity: 50,
            battery: 90,
        }
    }

    #[test]
    fn test_append_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path());
        let device = device();

        log.append(&device, &reading_at(datetime!(2020-06-01 12:00:00 UTC), 20.0))
            .unwrap();

        assert!(log.path_for(&device).exists());
        let history = log.load(&device).unwrap();
        assert_eq!(history.len(), 1);
        assert!(history.contains_key("2020-06-01T12:00:00Z"));
    }

    #[test]
    fn test_duplicate_timestamp_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path());
        let device = device();
        let ts = datetime!(2020-06-01 12:00:00 UTC);

        log.append(&device, &reading_at(ts, 20.0)).unwrap();
        log.append(&device, &reading_at(ts, 25.5)).unwrap();

        let history = log.load(&device).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history["2020-06-01T12:00:00Z"].temperature, 25.5);
    }

    #[test]
    fn test_appends_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path());
        let device = device();

        log.append(&device, &reading_at(datetime!(2020-06-01 12:00:00 UTC), 20.0))
            .unwrap();
        log.append(&device, &reading_at(datetime!(2020-06-01 12:02:30 UTC), 21.0))
            .unwrap();

        let history = log.load(&device).unwrap();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_empty_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path());
        let device = device();
        fs::write(log.path_for(&device), "").unwrap();

        assert!(log.load(&device).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path());
        let device = device();
        fs::write(log.path_for(&device), "broken [").unwrap();

        let result = log.append(
            &device,
            &reading_at(datetime!(2020-06-01 12:00:00 UTC), 20.0),
        );
        assert!(matches!(result, Err(Error::Parse { .. })));
    }
}
