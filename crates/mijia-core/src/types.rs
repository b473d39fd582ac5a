//! Shared data model for the sensor hub.
//!
//! Field names on the persisted types match the on-disk JSON exactly, so the
//! sensor file, settings file and history files stay readable by existing
//! tooling.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Address prefix shared by the supported temperature/humidity sensors.
pub const SENSOR_ADDR_PREFIX: &str = "A4:C1:38";

/// Advertised model name of the supported sensor.
pub const SENSOR_MODEL_NAME: &str = "LYWSD03MMC";

/// Known devices keyed by hardware address.
///
/// A `BTreeMap` so the persisted sensor file always has sorted keys.
pub type DeviceMap = BTreeMap<String, DeviceRecord>;

/// One timestamped temperature/humidity/battery sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Capture time. Doubles as the key for this sample in the device's
    /// history file; a duplicate timestamp overwrites the earlier sample.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Temperature in degrees Celsius. The radio reports hundredths of a
    /// degree; the read helper exposes the decimal value.
    pub temperature: f64,
    /// Relative humidity percentage.
    pub humidity: u8,
    /// Battery charge percentage.
    pub battery: u8,
}

/// One tracked sensor peripheral and its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Name the device advertised when discovered.
    pub dev_name: String,
    /// Hardware address. Unique and immutable once registered.
    pub addr: String,
    /// Human-facing label, assigned sequentially at discovery time.
    pub sensor_name: String,
    /// History file name, derived from the address.
    pub history_file: String,
    /// User toggle. The scheduler polls regardless; filtering on this flag
    /// is a surface concern.
    pub active: bool,
    /// Most recent successful reading, overwritten each cycle.
    pub last_reading: Option<Reading>,
}

impl DeviceRecord {
    /// Create a freshly discovered record with no reading yet.
    pub fn discovered(
        addr: impl Into<String>,
        dev_name: impl Into<String>,
        sensor_name: impl Into<String>,
    ) -> Self {
        let addr = addr.into();
        Self {
            dev_name: dev_name.into(),
            sensor_name: sensor_name.into(),
            history_file: history_file_name(&addr),
            active: true,
            last_reading: None,
            addr,
        }
    }
}

/// File name for a device's history log, derived from its address.
pub fn history_file_name(addr: &str) -> String {
    format!("sensor_{}_history.json", addr.replace(':', ""))
}

/// Scan cadence expressed as minutes plus seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub mins: u64,
    pub secs: u64,
}

impl Interval {
    /// The cadence as a [`Duration`].
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.mins * 60 + self.secs)
    }
}

/// Run configuration for the polling scheduler.
///
/// Persisted to the settings file; see [`Settings::default`] for the values
/// used on first run or after a corrupt file is discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Time between scan/read cycles.
    pub interval: Interval,
    /// File the device registry is persisted to.
    pub sensor_file: String,
    /// Generation counter, incremented on every completed save. Purely
    /// observational; not used for conflict resolution.
    pub save_id: u64,
    /// Discovery window duration in seconds.
    pub scan_seconds: u64,
    /// Retry ceiling for one device's read.
    pub max_attempts: u32,
    /// Absolute time of the next scheduler cycle.
    #[serde(with = "time::serde::rfc3339")]
    pub next_scan: OffsetDateTime,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: Interval { mins: 2, secs: 30 },
            sensor_file: "wss_sensors.json".to_string(),
            save_id: 0,
            scan_seconds: 5,
            max_attempts: 3,
            next_scan: OffsetDateTime::now_utc(),
        }
    }
}
