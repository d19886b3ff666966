//! Mock implementations for testing
//!
//! Provides mock Transport, NetworkLink and sensor implementations so the
//! telemetry loop can be exercised without a broker, a radio or hardware.
//! State lives behind `Arc`s so a test keeps a handle after the mock has
//! been moved into the loop.

use crate::sensor::{AnalogInput, BatterySource, ClimateReading, ClimateSensor, SensorError};
use crate::transport::mqtt::{ConnectionState, MqttError};
use crate::transport::{DeliveryQos, NetworkError, NetworkLink, Transport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub type PublishedMessage = (String, Vec<u8>);

/// One recorded transport operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    Disconnect,
    Service,
    Publish { topic: String, qos: DeliveryQos },
}

/// Mock transport for testing
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    pub calls: Arc<Mutex<Vec<TransportCall>>>,
    pub published_messages: Arc<Mutex<Vec<PublishedMessage>>>,
    pub connected: Arc<AtomicBool>,
    /// Number of connect attempts that fail before one succeeds
    pub connect_failures: Arc<AtomicU32>,
    pub fail_publish: Arc<AtomicBool>,
    /// Number of `service` calls that find the session dead
    pub service_drops: Arc<AtomicU32>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with an established session
    pub fn connected() -> Self {
        let transport = Self::default();
        transport.connected.store(true, Ordering::SeqCst);
        transport
    }

    /// Refuses the first `failures` connect attempts
    pub fn failing_connects(failures: u32) -> Self {
        let transport = Self::default();
        transport.connect_failures.store(failures, Ordering::SeqCst);
        transport
    }

    pub fn with_publish_failure(self) -> Self {
        self.fail_publish.store(true, Ordering::SeqCst);
        self
    }

    /// The next `drops` housekeeping calls lose the session and report an error
    pub fn with_service_drops(self, drops: u32) -> Self {
        self.service_drops.store(drops, Ordering::SeqCst);
        self
    }

    /// Simulate the broker dropping the session
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub async fn get_calls(&self) -> Vec<TransportCall> {
        self.calls.lock().await.clone()
    }

    pub async fn get_published_messages(&self) -> Vec<PublishedMessage> {
        self.published_messages.lock().await.clone()
    }

    pub async fn count_calls(&self, call: &TransportCall) -> usize {
        self.calls.lock().await.iter().filter(|c| *c == call).count()
    }

    pub async fn clear_history(&self) {
        self.calls.lock().await.clear();
        self.published_messages.lock().await.clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MqttError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        self.calls.lock().await.push(TransportCall::Connect);

        let remaining = self.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.connect_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(MqttError::ConnectionFailedStr(
                "Mock connection refused".to_string(),
            ));
        }

        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.calls.lock().await.push(TransportCall::Disconnect);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn service(&mut self) -> Result<(), Self::Error> {
        self.calls.lock().await.push(TransportCall::Service);

        let remaining = self.service_drops.load(Ordering::SeqCst);
        if remaining > 0 {
            self.service_drops.store(remaining - 1, Ordering::SeqCst);
            self.connected.store(false, Ordering::SeqCst);
            return Err(MqttError::ConnectionFailedStr(
                "Mock session closed by broker".to_string(),
            ));
        }
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        qos: DeliveryQos,
    ) -> Result<(), Self::Error> {
        self.calls.lock().await.push(TransportCall::Publish {
            topic: topic.to_string(),
            qos,
        });

        if !self.connected.load(Ordering::SeqCst) {
            return Err(MqttError::NotConnected {
                state: self.connection_state(),
            });
        }
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(MqttError::PublishFailed("Mock publish failure".into()));
        }

        self.published_messages
            .lock()
            .await
            .push((topic.to_string(), payload));
        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        if self.connected.load(Ordering::SeqCst) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected("Mock disconnection".to_string())
        }
    }
}

/// Mock network link that comes up after a number of status checks
#[derive(Debug, Clone, Default)]
pub struct MockNetworkLink {
    /// `is_up` reports false this many times, then true
    pub down_checks: Arc<AtomicU32>,
    pub checks: Arc<AtomicU32>,
    pub associations: Arc<AtomicU32>,
    pub fail_association: bool,
}

impl MockNetworkLink {
    pub fn up() -> Self {
        Self::default()
    }

    pub fn up_after(down_checks: u32) -> Self {
        let link = Self::default();
        link.down_checks.store(down_checks, Ordering::SeqCst);
        link
    }

    pub fn always_down() -> Self {
        Self::up_after(u32::MAX)
    }

    pub fn with_association_failure(mut self) -> Self {
        self.fail_association = true;
        self
    }

    pub fn check_count(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn association_count(&self) -> u32 {
        self.associations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkLink for MockNetworkLink {
    async fn associate(&mut self) -> Result<(), NetworkError> {
        self.associations.fetch_add(1, Ordering::SeqCst);
        if self.fail_association {
            return Err(NetworkError::AssociationFailed {
                ssid: "mock".to_string(),
                reason: "Mock association failure".to_string(),
            });
        }
        Ok(())
    }

    async fn is_up(&mut self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        let remaining = self.down_checks.load(Ordering::SeqCst);
        if remaining == 0 {
            return true;
        }
        if remaining != u32::MAX {
            self.down_checks.store(remaining - 1, Ordering::SeqCst);
        }
        false
    }
}

/// Climate sensor that plays back a script, then repeats a fallback
#[derive(Debug, Clone)]
pub struct ScriptedClimateSensor {
    script: VecDeque<ClimateReading>,
    fallback: ClimateReading,
    pub reads: Arc<AtomicU32>,
}

impl ScriptedClimateSensor {
    pub fn new(script: impl IntoIterator<Item = ClimateReading>, fallback: ClimateReading) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback,
            reads: Arc::default(),
        }
    }

    /// Always returns the same reading
    pub fn steady(temperature: f32, humidity: f32) -> Self {
        Self::new(
            [],
            ClimateReading {
                temperature,
                humidity,
            },
        )
    }

    pub fn read_count(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClimateSensor for ScriptedClimateSensor {
    async fn read(&mut self) -> Result<ClimateReading, SensorError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.pop_front().unwrap_or(self.fallback))
    }
}

/// Analog input stuck at one raw value
#[derive(Debug, Clone, Copy)]
pub struct FixedAnalogInput(pub u16);

#[async_trait]
impl AnalogInput for FixedAnalogInput {
    async fn read_raw(&mut self) -> Result<u16, SensorError> {
        Ok(self.0)
    }
}

/// Battery stuck at one level
#[derive(Debug, Clone, Copy)]
pub struct FixedBattery(pub u8);

impl BatterySource for FixedBattery {
    fn level(&mut self) -> u8 {
        self.0
    }
}
