//! Persistent registry of known devices.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use mijia_core::DeviceMap;

use crate::error::{Error, Result};

/// File-backed store for the known-device map.
///
/// Unlike [`crate::SettingsStore`], a registry file that exists but cannot
/// be parsed is a hard error. Silently starting with an empty map would
/// orphan every history file the registry points at; the operator has to
/// recover the file instead.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    path: PathBuf,
}

impl DeviceRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the device map; an absent file is an empty map.
    pub fn load(&self) -> Result<DeviceMap> {
        match fs::read_to_string(&self.path) {
            Ok(json) => {
                let devices: DeviceMap =
                    serde_json::from_str(&json).map_err(|e| Error::Parse {
                        path: self.path.clone(),
                        source: e,
                    })?;
                debug!(
                    "loaded {} device(s) from {}",
                    devices.len(),
                    self.path.display()
                );
                Ok(devices)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(DeviceMap::new()),
            Err(e) => Err(Error::Read {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    /// Persist the device map with sorted keys and indentation.
    pub fn save(&self, devices: &DeviceMap) -> Result<()> {
        let json = serde_json::to_string_pretty(devices)?;
        fs::write(&self.path, json).map_err(|e| Error::Write {
            path: self.path.clone(),
            source: e,
        })
    }
}

/// Merge newly discovered devices into `existing`.
///
/// Keyed by address; a discovered entry whose address is already present is
/// dropped, so re-discovery never overwrites a record's `sensor_name`,
/// `active` flag or history file. Returns how many entries were added.
pub fn merge(existing: &mut DeviceMap, discovered: DeviceMap) -> usize {
    let mut added = 0;
    for (addr, record) in discovered {
        if existing.contains_key(&addr) {
            debug!("{addr} already registered; keeping existing record");
            continue;
        }
        info!("registering {} as {}", addr, record.sensor_name);
        existing.insert(addr, record);
        added += 1;
    }
    added
}
