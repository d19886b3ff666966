//! MQTT client implementation for telemetry publishing
//!
//! This module separates pure functions from I/O operations:
//!
//! - [`connection`] - Pure connection state, broker address parsing and session options
//! - [`message_handler`] - Pure routing of rumqttc events
//! - [`client`] - Impure I/O operations over an owned rumqttc session
//!
//! # Usage
//!
//! ```rust,no_run
//! use sprint_edge::config::MqttSection;
//! use sprint_edge::transport::mqtt::{Credentials, MqttClient};
//! use sprint_edge::transport::DeliveryQos;
//!
//! # tokio_test::block_on(async {
//! let mut client = MqttClient::new("clientId-yti4dEeWBf", MqttSection::default(), Credentials::default())?;
//! client.connect().await?;
//! client
//!     .publish("formulaE/telemetry", br#"{"speed":125}"#.to_vec(), DeliveryQos::ExactlyOnce)
//!     .await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::MqttClient;
pub use connection::{BrokerAddress, ConnectionState, Credentials, MqttError};
pub use message_handler::{EventRoute, MessageHandler};
