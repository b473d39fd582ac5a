//! Wire protocol shared with clients.
//!
//! Every message in either direction is one JSON object of the shape
//! `{"cmd": <name>, "data": <payload>}`. The server pushes `settings` and
//! `sensors` snapshots; clients send the same two commands as full
//! replacements, plus `single_sensor` for a partial update of one device.
//! Anything that does not decode into [`Message`] — unknown `cmd` included —
//! is logged and dropped by the session, never fatal.

use serde::{Deserialize, Serialize};

use mijia_core::{DeviceMap, Settings};

/// One protocol message, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "data", rename_all = "snake_case")]
pub enum Message {
    /// Full settings snapshot (server to client) or full replacement
    /// (client to server).
    Settings(Settings),
    /// Full device-map snapshot or full replacement.
    Sensors(DeviceMap),
    /// Partial update of one device's user-editable fields. Client to
    /// server only; deliberately not echoed back out (see the hub docs).
    SingleSensor(SensorPatch),
}

/// Payload of a `single_sensor` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorPatch {
    /// Address of the device being updated.
    pub index: String,
    pub sensor: SensorUpdate,
}

/// The two fields a client may change on a single device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorUpdate {
    pub sensor_name: String,
    pub active: bool,
}
