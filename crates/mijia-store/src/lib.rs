//! JSON-file persistence for Mijia sensor state.
//!
//! Three stores, each a small file-backed map with deterministic output
//! (sorted keys, indented) so diffs and tests stay reproducible:
//!
//! - [`SettingsStore`] — the run configuration; self-healing on corruption
//! - [`DeviceRegistry`] — the known-device map; corruption is an error,
//!   since discarding it would orphan the history files it points at
//! - [`HistoryLog`] — per-device append-only reading archive
//!
//! # Example
//!
//! ```no_run
//! use mijia_store::SettingsStore;
//!
//! let store = SettingsStore::new("wss_settings.json");
//! let mut settings = store.load()?;
//! settings.scan_seconds = 10;
//! store.save(&mut settings)?;
//! # Ok::<(), mijia_store::Error>(())
//! ```

mod error;
mod history;
mod registry;
mod settings;

pub use error::{Error, Result};
pub use history::HistoryLog;
pub use registry::{DeviceRegistry, merge};
pub use settings::SettingsStore;
