//! sprint-edge - vehicle telemetry publisher
//!
//! Reads a temperature/humidity sensor and a potentiometer, derives a speed
//! and a simulated battery level, and publishes one JSON reading per cycle to
//! an MQTT broker at QoS 2.
//!
//! # Overview
//!
//! - [`connection`]: blocking "ensure connected" operations with explicit retry policies
//! - [`sensor`]: climate and analog inputs, speed mapping, simulated battery
//! - [`telemetry`]: payload encoding and the publishing loop
//! - [`transport`]: the MQTT client and the network link
//! - [`observability`]: structured logging and cycle statistics
//!
//! # Quick Start
//!
//! ```rust
//! use sprint_edge::telemetry::{TelemetryEncoder, TelemetryReading};
//! use sprint_edge::sensor::SpeedSimulator;
//!
//! let reading = TelemetryReading {
//!     temperature: 24.5,
//!     humidity: 60.2,
//!     speed: SpeedSimulator::default().speed_for(2048),
//!     battery_level: 55,
//! };
//!
//! let payload = TelemetryEncoder.encode(&reading).unwrap();
//! assert_eq!(
//!     payload,
//!     r#"{"temperature":24.5,"humidity":60.2,"speed":125,"batteryLevel":55}"#
//! );
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod observability;
pub mod sensor;
pub mod telemetry;
pub mod testing;
pub mod transport;

pub use config::*;
pub use connection::{ConnectionManager, RetryDecision, RetryPolicy};
pub use error::{TelemetryError, TelemetryResult};
pub use telemetry::{
    CycleOutcome, LoopSettings, SensorSuite, TelemetryEncoder, TelemetryLoop, TelemetryReading,
};
pub use transport::mqtt::MqttClient;
pub use transport::{DeliveryQos, HostNetworkLink, NetworkLink, Transport};
