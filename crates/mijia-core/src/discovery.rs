//! Discovery of new sensor peripherals.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::transport::SensorTransport;
use crate::types::{DeviceMap, DeviceRecord, SENSOR_ADDR_PREFIX, SENSOR_MODEL_NAME};

/// Finds sensors that are not yet in the registry.
///
/// A peripheral counts as a sensor when its address carries the vendor
/// prefix or it advertises the known model name. Already-known addresses
/// are dropped, so re-discovery never disturbs an existing record.
pub struct DiscoveryAgent {
    transport: Arc<dyn SensorTransport>,
}

impl DiscoveryAgent {
    pub fn new(transport: Arc<dyn SensorTransport>) -> Self {
        Self { transport }
    }

    /// Scan for roughly `duration` and return the newly found sensors,
    /// keyed by address.
    ///
    /// Labels continue sequentially from `existing.len() + 1`, in the order
    /// the scan reported the peripherals. A scan that times out or fails
    /// contributes nothing this cycle; that is logged, not an error.
    pub async fn discover(&self, existing: &DeviceMap, duration: Duration) -> DeviceMap {
        let peripherals = match self.transport.discover(duration).await {
            Ok(peripherals) => peripherals,
            Err(Error::Timeout { .. }) => {
                warn!("finding devices timed out");
                return DeviceMap::new();
            }
            Err(e) => {
                warn!("discovery scan failed: {e}");
                return DeviceMap::new();
            }
        };
        debug!("{} peripheral(s) seen during scan", peripherals.len());

        let mut found = DeviceMap::new();
        let mut next_index = existing.len() + 1;
        for (addr, name) in peripherals {
            if !addr.starts_with(SENSOR_ADDR_PREFIX) && name != SENSOR_MODEL_NAME {
                continue;
            }
            if existing.contains_key(&addr) {
                debug!("{addr} already known");
                continue;
            }
            let record =
                DeviceRecord::discovered(&addr, &name, format!("Sensor {next_index:02}"));
            next_index += 1;
            info!("new sensor found: {name}: {addr}");
            found.insert(addr, record);
        }

        if found.is_empty() {
            debug!("no new sensors found");
        } else {
            info!("{} new sensor(s) found during this scan", found.len());
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::transport::DiscoveredPeripherals;
    use std::time::Duration;

    fn agent_with(mock: MockTransport) -> DiscoveryAgent {
        DiscoveryAgent::new(Arc::new(mock))
    }

    #[tokio::test]
    async fn test_filters_by_prefix_or_name() {
        let mock = MockTransport::new();
        let mut seen = DiscoveredPeripherals::new();
        seen.insert("A4:C1:38:00:00:01".to_string(), "unnamed".to_string());
        seen.insert("11:22:33:44:55:66".to_string(), "LYWSD03MMC".to_string());
        seen.insert("DE:AD:BE:EF:00:00".to_string(), "headphones".to_string());
        mock.push_discover(Ok(seen));

        let found = agent_with(mock)
            .discover(&DeviceMap::new(), Duration::from_secs(5))
            .await;

        assert_eq!(found.len(), 2);
        assert!(found.contains_key("A4:C1:38:00:00:01"));
        assert!(found.contains_key("11:22:33:44:55:66"));
    }

    #[tokio::test]
    async fn test_known_addresses_excluded() {
        let known_addr = "A4:C1:38:00:00:01";
        let mut existing = DeviceMap::new();
        existing.insert(
            known_addr.to_string(),
            DeviceRecord::discovered(known_addr, "LYWSD03MMC", "Sensor 01"),
        );

        let mock = MockTransport::new();
        let mut seen = DiscoveredPeripherals::new();
        seen.insert(known_addr.to_string(), "LYWSD03MMC".to_string());
        seen.insert("A4:C1:38:00:00:02".to_string(), "LYWSD03MMC".to_string());
        mock.push_discover(Ok(seen));

        let found = agent_with(mock)
            .discover(&existing, Duration::from_secs(5))
            .await;

        assert_eq!(found.len(), 1);
        assert!(!found.contains_key(known_addr));
    }

    #[tokio::test]
    async fn test_sequential_naming_continues_from_existing() {
        let mut existing = DeviceMap::new();
        for i in 1..=3 {
            let addr = format!("A4:C1:38:00:00:0{i}");
            existing.insert(
                addr.clone(),
                DeviceRecord::discovered(addr, "LYWSD03MMC", format!("Sensor {i:02}")),
            );
        }

        let mock = MockTransport::new();
        let mut seen = DiscoveredPeripherals::new();
        seen.insert("A4:C1:38:00:00:10".to_string(), "LYWSD03MMC".to_string());
        seen.insert("A4:C1:38:00:00:11".to_string(), "LYWSD03MMC".to_string());
        mock.push_discover(Ok(seen));

        let found = agent_with(mock)
            .discover(&existing, Duration::from_secs(5))
            .await;

        let names: Vec<&str> = found.values().map(|d| d.sensor_name.as_str()).collect();
        assert_eq!(names, vec!["Sensor 04", "Sensor 05"]);
    }

    #[tokio::test]
    async fn test_timeout_yields_empty_map() {
        let mock = MockTransport::new();
        mock.push_discover(Err(Error::Timeout {
            operation: "discover",
            duration: Duration::from_secs(180),
        }));

        let found = agent_with(mock)
            .discover(&DeviceMap::new(), Duration::from_secs(5))
            .await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_helper_failure_yields_empty_map() {
        let mock = MockTransport::new();
        mock.push_discover(Err(Error::Helper {
            operation: "discover",
            code: Some(5),
        }));

        let found = agent_with(mock)
            .discover(&DeviceMap::new(), Duration::from_secs(5))
            .await;
        assert!(found.is_empty());
    }
}
