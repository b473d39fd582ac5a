//! Per-device reading with a bounded retry discipline.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::transport::SensorTransport;
use crate::types::{DeviceRecord, Reading};

/// Outcome of one device's reading pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// A sample was captured.
    Reading(Reading),
    /// Every attempt was used without a sample. The device keeps its
    /// previous `last_reading`.
    Exhausted,
    /// The device reported itself unreachable; remaining attempts were
    /// forfeited.
    Unreachable,
    /// The user interrupted the helper. Reported, not an error.
    Cancelled,
}

/// Reads one sample per device under the configured retry ceiling.
pub struct ReadingAgent {
    transport: Arc<dyn SensorTransport>,
}

impl ReadingAgent {
    pub fn new(transport: Arc<dyn SensorTransport>) -> Self {
        Self { transport }
    }

    /// Try to read `device`, up to `max_attempts` times.
    ///
    /// A timeout consumes one attempt. A disconnect forfeits the remaining
    /// attempts: waiting on a busy radio link is expensive and unlikely to
    /// succeed sooner. Cancellation ends the loop cleanly. Anything
    /// unclassified propagates so the caller can abort its whole cycle.
    pub async fn read(&self, device: &DeviceRecord, max_attempts: u32) -> Result<ReadOutcome> {
        let mut attempts = 0;
        while attempts < max_attempts {
            attempts += 1;
            debug!(
                "attempting to read from sensor {} ({}/{max_attempts})",
                device.sensor_name, attempts
            );

            match self.transport.read(&device.addr).await {
                Ok(reading) => return Ok(ReadOutcome::Reading(reading)),
                Err(Error::Timeout { .. }) => {
                    warn!("data wasn't sent ({attempts}/{max_attempts})");
                }
                Err(Error::Disconnected { address }) => {
                    warn!("failed to connect to {address}; perhaps the device is busy elsewhere");
                    return Ok(ReadOutcome::Unreachable);
                }
                Err(Error::Cancelled) => {
                    info!("user cancelled the read of {}", device.addr);
                    return Ok(ReadOutcome::Cancelled);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(ReadOutcome::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockTransport, sample_reading};
    use std::time::Duration;

    fn device() -> DeviceRecord {
        DeviceRecord::discovered("A4:C1:38:AA:BB:CC", "LYWSD03MMC", "Sensor 01")
    }

    fn timeout_err() -> Error {
        Error::Timeout {
            operation: "read",
            duration: Duration::from_secs(180),
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let mock = Arc::new(MockTransport::new());
        mock.push_read("A4:C1:38:AA:BB:CC", Ok(sample_reading()));

        let agent = ReadingAgent::new(Arc::clone(&mock) as Arc<dyn SensorTransport>);
        let outcome = agent.read(&device(), 3).await.unwrap();

        assert!(matches!(outcome, ReadOutcome::Reading(_)));
        assert_eq!(mock.read_calls("A4:C1:38:AA:BB:CC"), 1);
    }

    #[tokio::test]
    async fn test_timeouts_consume_attempts_then_succeed() {
        let mock = Arc::new(MockTransport::new());
        mock.push_read("A4:C1:38:AA:BB:CC", Err(timeout_err()));
        mock.push_read("A4:C1:38:AA:BB:CC", Err(timeout_err()));
        let reading = sample_reading();
        mock.push_read("A4:C1:38:AA:BB:CC", Ok(reading.clone()));

        let agent = ReadingAgent::new(Arc::clone(&mock) as Arc<dyn SensorTransport>);
        let outcome = agent.read(&device(), 3).await.unwrap();

        assert_eq!(outcome, ReadOutcome::Reading(reading));
        assert_eq!(mock.read_calls("A4:C1:38:AA:BB:CC"), 3);
    }

    #[tokio::test]
    async fn test_all_attempts_exhausted() {
        let mock = Arc::new(MockTransport::new());
        for _ in 0..3 {
            mock.push_read("A4:C1:38:AA:BB:CC", Err(timeout_err()));
        }

        let agent = ReadingAgent::new(Arc::clone(&mock) as Arc<dyn SensorTransport>);
        let outcome = agent.read(&device(), 3).await.unwrap();

        assert_eq!(outcome, ReadOutcome::Exhausted);
        assert_eq!(mock.read_calls("A4:C1:38:AA:BB:CC"), 3);
    }

    #[tokio::test]
    async fn test_disconnect_forfeits_remaining_attempts() {
        let mock = Arc::new(MockTransport::new());
        mock.push_read(
            "A4:C1:38:AA:BB:CC",
            Err(Error::Disconnected {
                address: "A4:C1:38:AA:BB:CC".to_string(),
            }),
        );

        let agent = ReadingAgent::new(Arc::clone(&mock) as Arc<dyn SensorTransport>);
        let outcome = agent.read(&device(), 3).await.unwrap();

        assert_eq!(outcome, ReadOutcome::Unreachable);
        assert_eq!(mock.read_calls("A4:C1:38:AA:BB:CC"), 1);
    }

    #[tokio::test]
    async fn test_cancellation_is_not_an_error() {
        let mock = Arc::new(MockTransport::new());
        mock.push_read("A4:C1:38:AA:BB:CC", Err(Error::Cancelled));

        let agent = ReadingAgent::new(Arc::clone(&mock) as Arc<dyn SensorTransport>);
        let outcome = agent.read(&device(), 3).await.unwrap();

        assert_eq!(outcome, ReadOutcome::Cancelled);
        assert_eq!(mock.read_calls("A4:C1:38:AA:BB:CC"), 1);
    }

    #[tokio::test]
    async fn test_unknown_error_propagates() {
        let mock = Arc::new(MockTransport::new());
        mock.push_read(
            "A4:C1:38:AA:BB:CC",
            Err(Error::Helper {
                operation: "read",
                code: Some(5),
            }),
        );

        let agent = ReadingAgent::new(Arc::clone(&mock) as Arc<dyn SensorTransport>);
        let result = agent.read(&device(), 3).await;

        assert!(result.is_err());
        assert_eq!(mock.read_calls("A4:C1:38:AA:BB:CC"), 1);
    }
}
