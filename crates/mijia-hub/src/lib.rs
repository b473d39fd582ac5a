//! Polling scheduler and WebSocket broadcast hub for Mijia sensors.
//!
//! This crate provides the long-running server that:
//! - Scans for new sensors and reads the known ones on a schedule
//! - Persists settings, the device registry and per-device history logs
//! - Pushes settings/sensor snapshots to connected WebSocket clients
//! - Routes client commands back into the shared state
//!
//! # Protocol
//!
//! All messages are `{"cmd": ..., "data": ...}` JSON objects over
//! `WS /ws`; see [`protocol::Message`].
//!
//! # Configuration
//!
//! The server reads its own configuration from
//! `~/.config/mijia-hub/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:9042"
//!
//! [storage]
//! settings_file = "wss_settings.json"
//! data_dir = "."
//!
//! [helpers]
//! discover = "./find_new_xdevices.py"
//! read = "./get_sensor_data.py"
//! ```
//!
//! The runtime settings clients can edit (scan interval, retry ceiling,
//! scan window) live separately in the JSON settings file and are managed
//! by [`mijia_store::SettingsStore`].

pub mod config;
pub mod protocol;
pub mod scheduler;
pub mod state;
pub mod ws;

pub use config::{Config, ConfigError, HelperConfig, ServerConfig, StorageConfig};
pub use protocol::{Message, SensorPatch, SensorUpdate};
pub use scheduler::{CycleError, PollingScheduler, advance_next_scan};
pub use state::{AppState, BroadcastHub};
