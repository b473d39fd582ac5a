//! Core library for Xiaomi Mijia temperature/humidity sensors.
//!
//! This crate provides the shared data model and the two external sensor
//! operations the hub is built around:
//!
//! - **Discovery**: scan for nearby sensors and label the new ones
//! - **Reading**: pull one temperature/humidity/battery sample from a sensor
//!
//! Both operations run as isolated helper processes behind the
//! [`SensorTransport`] trait, so a wedged BLE stack can never stall the
//! caller for longer than the hard timeout. [`mock::MockTransport`] provides
//! a scripted implementation for tests.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use mijia_core::{DeviceMap, DiscoveryAgent, HelperTransport};
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = Arc::new(HelperTransport::new(
//!         "/usr/local/bin/mijia-discover",
//!         "/usr/local/bin/mijia-read",
//!     ));
//!
//!     let agent = DiscoveryAgent::new(transport);
//!     let found = agent
//!         .discover(&DeviceMap::new(), Duration::from_secs(5))
//!         .await;
//!     println!("Found {} new sensor(s)", found.len());
//! }
//! ```

pub mod discovery;
pub mod error;
pub mod mock;
pub mod reading;
pub mod transport;
pub mod types;

pub use discovery::DiscoveryAgent;
pub use error::{Error, HelperStatus, Result};
pub use reading::{ReadOutcome, ReadingAgent};
pub use transport::{DiscoveredPeripherals, HARD_TIMEOUT, HelperTransport, SensorTransport};
pub use types::{
    DeviceMap, DeviceRecord, Interval, Reading, SENSOR_ADDR_PREFIX, SENSOR_MODEL_NAME, Settings,
    history_file_name,
};
