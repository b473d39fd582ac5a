//! The scan/read polling loop.
//!
//! One long-lived task cycles through Idle, Scanning, Reading and
//! Persisting, then broadcasts the fresh snapshots and goes back to Idle.
//! Transient sensor failures never escape the cycle; corrupt on-disk state
//! and unclassified helper failures do, and end the loop.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::sleep;
use tracing::{debug, info};

use mijia_core::{DeviceRecord, DiscoveryAgent, ReadOutcome, ReadingAgent, SensorTransport};
use mijia_store::DeviceRegistry;

use crate::state::AppState;

/// Errors that end a scheduler cycle (and the scheduler itself).
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// On-disk state could not be read or written.
    #[error("store error: {0}")]
    Store(#[from] mijia_store::Error),
    /// An unclassified sensor failure; intentionally not masked.
    #[error("sensor error: {0}")]
    Sensor(#[from] mijia_core::Error),
}

/// Owns the scan/read cadence.
pub struct PollingScheduler {
    state: Arc<AppState>,
    discovery: DiscoveryAgent,
    reading: ReadingAgent,
}

impl PollingScheduler {
    pub fn new(state: Arc<AppState>, transport: Arc<dyn SensorTransport>) -> Self {
        Self {
            state,
            discovery: DiscoveryAgent::new(Arc::clone(&transport)),
            reading: ReadingAgent::new(transport),
        }
    }

    /// Run forever, one cycle per configured interval.
    ///
    /// Returns only on a [`CycleError`]; the caller decides whether that
    /// halts the process.
    pub async fn run(&self) -> Result<(), CycleError> {
        info!("polling scheduler started");
        loop {
            let next_scan = self.state.settings.read().await.next_scan;
            if OffsetDateTime::now_utc() < next_scan {
                sleep(Duration::from_secs(1)).await;
                continue;
            }
            self.run_cycle().await?;
        }
    }

    /// One full Scanning -> Reading -> Persisting pass, ending with a
    /// broadcast of the new snapshots.
    pub async fn run_cycle(&self) -> Result<(), CycleError> {
        // Snapshot the knobs once; a settings update that lands mid-cycle
        // applies from the next cycle.
        let (scan_window, max_attempts, interval, sensor_file) = {
            let settings = self.state.settings.read().await;
            (
                Duration::from_secs(settings.scan_seconds),
                settings.max_attempts,
                settings.interval.as_duration(),
                settings.sensor_file.clone(),
            )
        };
        let registry = DeviceRegistry::new(self.state.data_dir().join(&sensor_file));

        // Scanning.
        info!("scanning for new devices...");
        let existing = self.state.devices.read().await.clone();
        let found = self.discovery.discover(&existing, scan_window).await;
        if !found.is_empty() {
            let mut devices = self.state.devices.write().await;
            if mijia_store::merge(&mut devices, found) > 0 {
                registry.save(&devices)?;
            }
        }

        // Reading. Every registered device is polled; the `active` flag is
        // a surface concern, not a scheduler filter.
        info!("finished scanning, gathering readings...");
        let targets: Vec<DeviceRecord> =
            self.state.devices.read().await.values().cloned().collect();
        for device in targets {
            match self.reading.read(&device, max_attempts).await? {
                ReadOutcome::Reading(reading) => {
                    self.state.history.append(&device, &reading)?;
                    let mut devices = self.state.devices.write().await;
                    if let Some(record) = devices.get_mut(&device.addr) {
                        record.last_reading = Some(reading);
                    }
                }
                ReadOutcome::Exhausted
                | ReadOutcome::Unreachable
                | ReadOutcome::Cancelled => {}
            }
        }
        registry.save(&*self.state.devices.read().await)?;

        // Persisting: advance the schedule and save it (bumps save_id).
        {
            let mut settings = self.state.settings.write().await;
            settings.next_scan =
                advance_next_scan(settings.next_scan, interval, OffsetDateTime::now_utc());
            self.state.settings_store.save(&mut settings)?;
        }

        self.state.broadcast_sensors().await;
        self.state.broadcast_settings().await;
        debug!("done for now");
        Ok(())
    }
}

/// Advance the schedule by one interval.
///
/// Anchored to the previous `next_scan` rather than to completion time, so
/// a slow cycle does not permanently drift the cadence. If the advanced
/// time is already past, it snaps to `now`: the next cycle starts promptly
/// but missed intervals are not made up.
pub fn advance_next_scan(
    prev: OffsetDateTime,
    interval: Duration,
    now: OffsetDateTime,
) -> OffsetDateTime {
    let next = prev + interval;
    if next < now { now } else { next }
}
