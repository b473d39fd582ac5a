//! External sensor operations, executed as isolated helper processes.
//!
//! The BLE stack the sensors live behind is unreliable enough that a hung
//! operation has to be assumed. Every operation therefore runs as its own
//! process, awaited under a hard timeout; on expiry the child is killed and
//! the caller gets a typed [`Error::Timeout`], never a stall.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{Error, HelperStatus, Result};
use crate::types::Reading;

/// Hard ceiling on any single external operation, regardless of the
/// requested scan window.
pub const HARD_TIMEOUT: Duration = Duration::from_secs(180);

/// Raw discovery output: every peripheral seen, address to advertised name.
pub type DiscoveredPeripherals = BTreeMap<String, String>;

/// Abstraction over the two external sensor operations.
///
/// Implemented by [`HelperTransport`] for production and by
/// [`crate::mock::MockTransport`] in tests, so the agents and the scheduler
/// can be exercised without hardware.
#[async_trait]
pub trait SensorTransport: Send + Sync {
    /// Scan for peripherals for roughly `duration`.
    ///
    /// Returns every peripheral seen; filtering for supported sensors is
    /// the caller's job.
    async fn discover(&self, duration: Duration) -> Result<DiscoveredPeripherals>;

    /// Read one sample from the sensor at `address`.
    async fn read(&self, address: &str) -> Result<Reading>;
}

/// Transport that shells out to the discovery and read helper executables.
///
/// The helpers emit their result as a single JSON document on stdout and
/// report their outcome through the exit codes in
/// [`HelperStatus`](crate::error::HelperStatus).
#[derive(Debug, Clone)]
pub struct HelperTransport {
    discover_helper: PathBuf,
    read_helper: PathBuf,
}

impl HelperTransport {
    /// Create a transport backed by the given helper executables.
    pub fn new(discover_helper: impl Into<PathBuf>, read_helper: impl Into<PathBuf>) -> Self {
        Self {
            discover_helper: discover_helper.into(),
            read_helper: read_helper.into(),
        }
    }

    /// Run one helper to completion under [`HARD_TIMEOUT`].
    ///
    /// On expiry the future owning the child is dropped; `kill_on_drop`
    /// reaps the process so a wedged helper cannot linger.
    async fn run(
        &self,
        operation: &'static str,
        program: &Path,
        args: &[String],
    ) -> Result<(HelperStatus, Vec<u8>)> {
        debug!("spawning {operation} helper: {}", program.display());
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let output = match timeout(HARD_TIMEOUT, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(Error::Timeout {
                    operation,
                    duration: HARD_TIMEOUT,
                });
            }
        };

        let status = match output.status.code() {
            Some(code) => HelperStatus::from_code(code),
            // Killed by a signal; no code to classify.
            None => HelperStatus::UnknownError,
        };
        Ok((status, output.stdout))
    }
}

#[async_trait]
impl SensorTransport for HelperTransport {
    async fn discover(&self, duration: Duration) -> Result<DiscoveredPeripherals> {
        let args = vec!["--duration".to_string(), duration.as_secs().to_string()];
        let (status, stdout) = self.run("discover", &self.discover_helper, &args).await?;

        match status {
            HelperStatus::Ok => Ok(serde_json::from_slice(&stdout)?),
            HelperStatus::UserCancelled => Err(Error::Cancelled),
            HelperStatus::TimedOut => Err(Error::Timeout {
                operation: "discover",
                duration,
            }),
            other => Err(Error::Helper {
                operation: "discover",
                code: Some(helper_code(other)),
            }),
        }
    }

    async fn read(&self, address: &str) -> Result<Reading> {
        let args = vec![address.to_string()];
        let (status, stdout) = self.run("read", &self.read_helper, &args).await?;

        match status {
            HelperStatus::Ok => Ok(serde_json::from_slice(&stdout)?),
            HelperStatus::InvalidArgs => Err(Error::InvalidArgs(
                "the read helper requires a device address".to_string(),
            )),
            HelperStatus::UserCancelled => Err(Error::Cancelled),
            HelperStatus::TimedOut => Err(Error::Timeout {
                operation: "read",
                duration: HARD_TIMEOUT,
            }),
            HelperStatus::Disconnected => Err(Error::Disconnected {
                address: address.to_string(),
            }),
            HelperStatus::UnknownError => Err(Error::Helper {
                operation: "read",
                code: Some(5),
            }),
        }
    }
}

fn helper_code(status: HelperStatus) -> i32 {
    match status {
        HelperStatus::Ok => 0,
        HelperStatus::InvalidArgs => 1,
        HelperStatus::UserCancelled => 2,
        HelperStatus::TimedOut => 3,
        HelperStatus::Disconnected => 4,
        HelperStatus::UnknownError => 5,
    }
}
