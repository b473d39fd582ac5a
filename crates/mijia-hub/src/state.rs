//! Shared application state and the client broadcast hub.
//!
//! Settings and the device map are the two values both the scheduler and
//! every client session mutate. Each lives behind its own `RwLock`; a
//! snapshot taken under the read guard is therefore always a fully written
//! value, never a partial update. No guard is held across a broadcast.
//!
//! Fan-out uses a `tokio::sync::broadcast` channel: each session owns a
//! receiver, so membership changes can never race an in-progress broadcast
//! and a slow or dead session only loses its own messages.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use mijia_core::{DeviceMap, Settings};
use mijia_store::{HistoryLog, SettingsStore};

use crate::config::Config;
use crate::protocol::Message;

/// Shared application state.
pub struct AppState {
    /// Server configuration (static for the process lifetime).
    pub config: Config,
    /// Runtime settings; mutated by the scheduler and by client commands.
    pub settings: RwLock<Settings>,
    /// Known devices; mutated by the scheduler and by client commands.
    pub devices: RwLock<DeviceMap>,
    /// Store backing the settings file.
    pub settings_store: SettingsStore,
    /// Per-device history archives.
    pub history: HistoryLog,
    /// Client session registry and broadcast channel.
    pub hub: BroadcastHub,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: Config, settings: Settings, devices: DeviceMap) -> Arc<Self> {
        let settings_store = SettingsStore::new(&config.storage.settings_file);
        let history = HistoryLog::new(&config.storage.data_dir);
        let hub = BroadcastHub::new(config.server.broadcast_buffer);
        Arc::new(Self {
            config,
            settings: RwLock::new(settings),
            devices: RwLock::new(devices),
            settings_store,
            history,
            hub,
        })
    }

    /// Directory holding the sensor registry and history files.
    pub fn data_dir(&self) -> &Path {
        &self.config.storage.data_dir
    }

    /// Snapshot the current settings as a protocol message.
    pub async fn settings_snapshot(&self) -> Message {
        Message::Settings(self.settings.read().await.clone())
    }

    /// Snapshot the current device map as a protocol message.
    pub async fn sensors_snapshot(&self) -> Message {
        Message::Sensors(self.devices.read().await.clone())
    }

    /// Push the current settings to every connected session.
    pub async fn broadcast_settings(&self) {
        let message = self.settings_snapshot().await;
        self.hub.broadcast(message);
    }

    /// Push the current device map to every connected session.
    pub async fn broadcast_sensors(&self) {
        let message = self.sensors_snapshot().await;
        self.hub.broadcast(message);
    }
}

/// Owns the session set and the outbound broadcast channel.
pub struct BroadcastHub {
    tx: broadcast::Sender<Message>,
    next_session_id: AtomicU64,
    sessions: std::sync::Mutex<BTreeSet<u64>>,
}

impl BroadcastHub {
    /// Create a hub whose channel buffers `buffer` messages per session.
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            tx,
            next_session_id: AtomicU64::new(0),
            sessions: std::sync::Mutex::new(BTreeSet::new()),
        }
    }

    /// Register a new session and return its id.
    ///
    /// Ids are assigned sequentially and never reused within a process
    /// lifetime.
    pub fn register(&self) -> u64 {
        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        self.sessions.lock().unwrap().insert(id);
        id
    }

    /// Remove a session after close or transport error.
    pub fn remove(&self, session_id: u64) {
        self.sessions.lock().unwrap().remove(&session_id);
    }

    /// Number of sessions currently registered.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Subscribe to the outbound message stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }

    /// Best-effort fan-out to every subscribed session.
    ///
    /// Returns how many sessions the message was queued for; zero when no
    /// one is listening, which is not an error.
    pub fn broadcast(&self, message: Message) -> usize {
        let delivered = self.tx.send(message).unwrap_or(0);
        debug!("broadcast queued for {delivered} session(s)");
        delivered
    }
}
