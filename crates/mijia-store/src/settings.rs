//! Load/save of the run configuration.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use mijia_core::Settings;

use crate::error::{Error, Result};

/// File-backed store for [`Settings`].
///
/// Corruption of this file is self-healing: the defaults are restored and
/// persisted immediately, never surfaced as a fatal error. This is the
/// opposite policy from [`crate::DeviceRegistry`], whose contents cannot be
/// regenerated.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted settings.
    ///
    /// A missing, unreadable or unparseable file falls back to
    /// [`Settings::default`], which is saved straight away (so the very
    /// first load already counts one save).
    pub fn load(&self) -> Result<Settings> {
        match fs::read_to_string(&self.path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(settings) => {
                    debug!("loaded settings from {}", self.path.display());
                    return Ok(settings);
                }
                Err(e) => {
                    warn!(
                        "settings file {} is unreadable ({e}); starting fresh",
                        self.path.display()
                    );
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no settings file at {}; starting fresh", self.path.display());
            }
            Err(e) => {
                warn!(
                    "could not read settings file {} ({e}); starting fresh",
                    self.path.display()
                );
            }
        }

        let mut settings = Settings::default();
        self.save(&mut settings)?;
        Ok(settings)
    }

    /// Persist `settings`, incrementing `save_id` by exactly 1 as part of
    /// the save so it strictly counts completed saves.
    pub fn save(&self, settings: &mut Settings) -> Result<()> {
        settings.save_id += 1;
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json).map_err(|e| Error::Write {
            path: self.path.clone(),
            source: e,
        })?;
        info!("settings saved with index {}", settings.save_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mijia_core::Interval;

    #[test]
    fn test_load_missing_file_persists_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("wss_settings.json"));

        let settings = store.load().unwrap();
        assert_eq!(settings.interval, Interval { mins: 2, secs: 30 });
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.scan_seconds, 5);
        // The fallback itself is a completed save.
        assert_eq!(settings.save_id, 1);
        assert!(store.path().exists());
    }

    #[test]
    fn test_load_corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wss_settings.json");
        fs::write(&path, "not json {").unwrap();

        let store = SettingsStore::new(&path);
        let settings = store.load().unwrap();
        assert_eq!(settings.save_id, 1);

        // The repaired file parses on the next load.
        let reloaded = store.load().unwrap();
        assert_eq!(reloaded, settings);
    }

    #[test]
    fn test_save_id_counts_every_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("wss_settings.json"));

        let mut settings = store.load().unwrap();
        let initial = settings.save_id;
        for _ in 0..5 {
            store.save(&mut settings).unwrap();
        }
        assert_eq!(settings.save_id, initial + 5);

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.save_id, initial + 5);
    }

    #[test]
    fn test_roundtrip_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("wss_settings.json"));

        let mut settings = store.load().unwrap();
        settings.interval = Interval { mins: 0, secs: 45 };
        settings.max_attempts = 7;
        settings.sensor_file = "elsewhere.json".to_string();
        store.save(&mut settings).unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded, settings);
    }
}
