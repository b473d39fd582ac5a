//! Scripted transport for exercising the agents without hardware.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::transport::{DiscoveredPeripherals, SensorTransport};
use crate::types::Reading;

/// A [`SensorTransport`] that replays queued outcomes.
///
/// Queue results with [`push_discover`](Self::push_discover) and
/// [`push_read`](Self::push_read); each call to the transport pops the next
/// queued outcome. An exhausted queue yields [`Error::Helper`] so a test
/// that over-calls fails loudly rather than hanging.
#[derive(Default)]
pub struct MockTransport {
    discover_results: Mutex<VecDeque<Result<DiscoveredPeripherals>>>,
    read_results: Mutex<BTreeMap<String, VecDeque<Result<Reading>>>>,
    discover_calls: Mutex<u32>,
    read_calls: Mutex<BTreeMap<String, u32>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next discovery call.
    pub fn push_discover(&self, result: Result<DiscoveredPeripherals>) {
        self.discover_results.lock().unwrap().push_back(result);
    }

    /// Queue the outcome of the next read of `address`.
    pub fn push_read(&self, address: &str, result: Result<Reading>) {
        self.read_results
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_default()
            .push_back(result);
    }

    /// How many times discovery has been invoked.
    pub fn discover_calls(&self) -> u32 {
        *self.discover_calls.lock().unwrap()
    }

    /// How many times `address` has been read.
    pub fn read_calls(&self, address: &str) -> u32 {
        *self.read_calls.lock().unwrap().get(address).unwrap_or(&0)
    }
}

/// A plausible sample for tests.
pub fn sample_reading() -> Reading {
    Reading {
        timestamp: OffsetDateTime::now_utc(),
        temperature: 21.34,
        humidity: 51,
        battery: 88,
    }
}

#[async_trait]
impl SensorTransport for MockTransport {
    async fn discover(&self, _duration: Duration) -> Result<DiscoveredPeripherals> {
        *self.discover_calls.lock().unwrap() += 1;
        self.discover_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(Error::Helper {
                    operation: "discover",
                    code: None,
                })
            })
    }

    async fn read(&self, address: &str) -> Result<Reading> {
        *self
            .read_calls
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_insert(0) += 1;
        self.read_results
            .lock()
            .unwrap()
            .get_mut(address)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(Error::Helper {
                    operation: "read",
                    code: None,
                })
            })
    }
}
