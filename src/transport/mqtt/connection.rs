//! Pure connection state management for MQTT client
//!
//! This module contains pure functions for connection state management,
//! broker address parsing and session option construction.

use crate::config::MqttSection;
use crate::transport::DeliveryQos;
use rumqttc::v5::{mqttbytes::QoS, MqttOptions};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Connection state for MQTT client
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Handshake in progress
    Connecting,
    /// Broker acknowledged the session
    Connected,
    /// No session, with reason
    Disconnected(String),
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed")]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Publishing failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },
    #[error("Timed out after {0:?} waiting for {1}")]
    Timeout(Duration, &'static str),
    #[error("Connection failed: {0}")]
    ConnectionFailedStr(String),
}

/// Broker endpoint parsed from the configured URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl BrokerAddress {
    /// Parse `mqtt://host[:port]`; the port defaults to 1883
    pub fn parse(broker_url: &str) -> Result<Self, MqttError> {
        let url =
            Url::parse(broker_url).map_err(|_| MqttError::InvalidBrokerUrl(broker_url.to_string()))?;

        if url.scheme() != "mqtt" && url.scheme() != "tcp" {
            return Err(MqttError::InvalidBrokerUrl(format!(
                "{broker_url} (only plain mqtt:// is supported)"
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| MqttError::InvalidBrokerUrl(broker_url.to_string()))?;

        Ok(Self {
            host: host.to_string(),
            port: url.port().unwrap_or(1883),
        })
    }
}

/// Session credentials resolved from the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Pure function to configure MQTT options from config
pub fn configure_mqtt_options(
    client_id: &str,
    config: &MqttSection,
    credentials: &Credentials,
) -> Result<MqttOptions, MqttError> {
    let address = BrokerAddress::parse(&config.broker_url)?;
    let mut mqtt_options = MqttOptions::new(client_id, address.host, address.port);

    // Credentials are only sent when a username is present
    if let Some(username) = &credentials.username {
        let password = credentials.password.clone().unwrap_or_default();
        mqtt_options.set_credentials(username, password);
    }

    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    mqtt_options.set_clean_start(true);

    Ok(mqtt_options)
}

/// Map the transport-level QoS onto rumqttc's
pub fn to_mqtt_qos(qos: DeliveryQos) -> QoS {
    match qos {
        DeliveryQos::AtMostOnce => QoS::AtMostOnce,
        DeliveryQos::AtLeastOnce => QoS::AtLeastOnce,
        DeliveryQos::ExactlyOnce => QoS::ExactlyOnce,
    }
}
