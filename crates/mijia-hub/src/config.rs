//! Server configuration.
//!
//! This is the hub's own TOML config (bind address, file locations, helper
//! executables) — distinct from the runtime [`mijia_core::Settings`] that
//! clients can edit over the wire and the scheduler persists as JSON.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// Storage locations.
    pub storage: StorageConfig,
    /// Helper executables for the external sensor operations.
    pub helpers: HelperConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:9042").
    pub bind: String,
    /// Broadcast channel buffer size. If a client falls this many messages
    /// behind, its oldest messages are dropped rather than blocking anyone.
    pub broadcast_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:9042".to_string(),
            broadcast_buffer: 100,
        }
    }
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Settings file path.
    pub settings_file: PathBuf,
    /// Directory holding the sensor registry and per-device history files.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            settings_file: PathBuf::from("wss_settings.json"),
            data_dir: PathBuf::from("."),
        }
    }
}

/// Helper executables for the external sensor operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HelperConfig {
    /// Discovery helper; takes `--duration <secs>`, emits JSON on stdout.
    pub discover: PathBuf,
    /// Read helper; takes a device address, emits JSON on stdout.
    pub read: PathBuf,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            discover: PathBuf::from("./find_new_xdevices.py"),
            read: PathBuf::from("./get_sensor_data.py"),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mijia-hub")
        .join("server.toml")
}
