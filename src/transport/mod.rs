//! Transport layer for telemetry publishing
//!
//! This module provides the transport abstractions the telemetry loop depends
//! on, the MQTT implementation, and the network link the transport rides on.

pub mod mqtt;
pub mod network;

pub use network::{HostNetworkLink, NetworkError, NetworkLink};

use mqtt::ConnectionState;

/// Requested delivery guarantee for a publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryQos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl DeliveryQos {
    /// Map a numeric MQTT QoS level
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::AtMostOnce),
            1 => Some(Self::AtLeastOnce),
            2 => Some(Self::ExactlyOnce),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }
}

/// Transport trait for broker communication
///
/// The transport handle is owned by a single execution context, so every
/// operation takes `&mut self` and no internal locking is required.
#[async_trait::async_trait]
pub trait Transport: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Establish a broker session; returns once the broker acknowledged it
    async fn connect(&mut self) -> Result<(), Self::Error>;

    /// Close the broker session
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Run pending housekeeping: keep-alive, inbound dispatch, in-flight acknowledgements
    async fn service(&mut self) -> Result<(), Self::Error>;

    /// Publish a payload to a topic with the requested delivery guarantee
    async fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        qos: DeliveryQos,
    ) -> Result<(), Self::Error>;

    /// Check if transport is currently connected
    fn is_connected(&self) -> bool {
        matches!(self.connection_state(), ConnectionState::Connected)
    }

    /// Get current connection state
    fn connection_state(&self) -> ConnectionState;
}

/// Type alias for MQTT transport
pub type MqttTransport = mqtt::MqttClient;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_levels_map_both_ways() {
        for level in 0..=2u8 {
            let qos = DeliveryQos::from_level(level).unwrap();
            assert_eq!(qos.level(), level);
        }
        assert_eq!(DeliveryQos::from_level(3), None);
        assert_eq!(DeliveryQos::from_level(2), Some(DeliveryQos::ExactlyOnce));
    }
}
