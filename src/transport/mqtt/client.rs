//! Impure I/O operations for MQTT client
//!
//! The client owns both halves of a rumqttc session (request handle and event
//! loop) and drives the event loop only from `connect`, `service`, `publish`
//! and `disconnect`. Nothing runs in the background: housekeeping happens
//! when the caller asks for it.

use super::connection::{configure_mqtt_options, to_mqtt_qos, ConnectionState, Credentials, MqttError};
use super::message_handler::{EventRoute, MessageHandler};
use crate::config::MqttSection;
use crate::transport::{DeliveryQos, Transport};
use async_trait::async_trait;
use rumqttc::v5::{AsyncClient, EventLoop};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Request channel capacity between the handle and the event loop
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// How long `service` waits for further events before returning
const SERVICE_POLL_WINDOW: Duration = Duration::from_millis(10);

/// Upper bound on events handled by one `service` call
const MAX_SERVICE_EVENTS: usize = 32;

const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);

struct Session {
    client: AsyncClient,
    event_loop: EventLoop,
}

/// MQTT transport client for telemetry publishing
pub struct MqttClient {
    client_id: String,
    config: MqttSection,
    credentials: Credentials,
    session: Option<Session>,
    state: ConnectionState,
    in_flight: HashSet<u16>,
    connect_time: Option<Instant>,
    session_count: u32,
}

impl MqttClient {
    /// Create a disconnected client; fails early on an unusable broker URL
    pub fn new(
        client_id: &str,
        config: MqttSection,
        credentials: Credentials,
    ) -> Result<Self, MqttError> {
        configure_mqtt_options(client_id, &config, &credentials)?;

        Ok(MqttClient {
            client_id: client_id.to_string(),
            config,
            credentials,
            session: None,
            state: ConnectionState::Disconnected("Not connected yet".to_string()),
            in_flight: HashSet::new(),
            connect_time: None,
            session_count: 0,
        })
    }

    /// Build a fresh session; any previous one is dropped
    fn create_session(&self) -> Result<Session, MqttError> {
        let mqtt_options = configure_mqtt_options(&self.client_id, &self.config, &self.credentials)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);
        Ok(Session { client, event_loop })
    }

    fn mark_disconnected(&mut self, reason: String) {
        if self.state == ConnectionState::Connected {
            warn!(client_id = %self.client_id, "MQTT connection lost: {}", reason);
        }
        self.state = ConnectionState::Disconnected(reason);
        self.session = None;
        self.connect_time = None;
        if !self.in_flight.is_empty() {
            warn!(
                dropped = self.in_flight.len(),
                "Unacknowledged deliveries dropped with the session"
            );
            self.in_flight.clear();
        }
    }

    /// Poll the event loop once, waiting at most `window`.
    /// Returns Ok(None) when nothing happened within the window.
    async fn poll_once(&mut self, window: Duration) -> Result<Option<EventRoute>, MqttError> {
        let session = self.session.as_mut().ok_or_else(|| MqttError::NotConnected {
            state: self.state.clone(),
        })?;

        let polled = tokio::time::timeout(window, session.event_loop.poll()).await;

        match polled {
            Err(_) => Ok(None),
            Ok(Ok(event)) => {
                let route = MessageHandler::route_mqtt_event(&event);
                self.apply_route(&route);
                Ok(Some(route))
            }
            Ok(Err(e)) => {
                self.mark_disconnected(e.to_string());
                Err(MqttError::ConnectionFailed(Box::new(e)))
            }
        }
    }

    /// Update client bookkeeping for a routed event
    fn apply_route(&mut self, route: &EventRoute) {
        match route {
            EventRoute::ConnectionAcknowledged => {
                self.state = ConnectionState::Connected;
                self.connect_time = Some(Instant::now());
                self.session_count += 1;
            }
            EventRoute::Disconnected => {
                self.mark_disconnected("Broker disconnected".to_string());
            }
            EventRoute::DeliveryReceived { packet_id } => {
                debug!(target: "mqtt_transport", packet_id, "PubRec received, releasing");
            }
            EventRoute::DeliveryConfirmed { packet_id } => {
                if self.in_flight.remove(packet_id) {
                    debug!(target: "mqtt_transport", packet_id, "Delivery confirmed by broker");
                }
            }
            EventRoute::MessageReceived { topic } => {
                debug!(target: "mqtt_transport", "Ignoring inbound message on {}", topic);
            }
            EventRoute::InfrastructureEvent(event) => {
                debug!(target: "mqtt_transport", "MQTT event: {}", event);
            }
            EventRoute::PublishSent { .. } | EventRoute::OutgoingEvent => {}
        }
    }

    /// Connect to the broker and wait for ConnAck
    pub async fn connect(&mut self) -> Result<(), MqttError> {
        let session = self.create_session()?;
        self.session = Some(session);
        self.state = ConnectionState::Connecting;
        self.in_flight.clear();

        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.mark_disconnected("ConnAck timeout".to_string());
                return Err(MqttError::Timeout(timeout, "ConnAck"));
            }

            match self.poll_once(remaining).await? {
                Some(EventRoute::ConnectionAcknowledged) => break,
                Some(EventRoute::Disconnected) => {
                    return Err(MqttError::ConnectionFailedStr(
                        "Broker closed the session during handshake".to_string(),
                    ));
                }
                Some(_) => continue,
                None => {
                    self.mark_disconnected("ConnAck timeout".to_string());
                    return Err(MqttError::Timeout(timeout, "ConnAck"));
                }
            }
        }

        info!(
            client_id = %self.client_id,
            broker = %self.config.broker_url,
            "MQTT session established"
        );
        Ok(())
    }

    /// Drain whatever the event loop has ready: pings, acknowledgements, inbound packets
    pub async fn service(&mut self) -> Result<(), MqttError> {
        self.check_connection_state()?;

        for _ in 0..MAX_SERVICE_EVENTS {
            if self.poll_once(SERVICE_POLL_WINDOW).await?.is_none() {
                break;
            }
            self.check_connection_state()?;
        }
        Ok(())
    }

    /// Queue a publish and drive the event loop until it is written out
    pub async fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        qos: DeliveryQos,
    ) -> Result<(), MqttError> {
        self.check_connection_state()?;

        if let Some(session) = &self.session {
            session
                .client
                .publish(topic, to_mqtt_qos(qos), false, payload)
                .await
                .map_err(|e| MqttError::PublishFailed(Box::new(e)))?;
        }

        let timeout = Duration::from_millis(self.config.publish_timeout_ms);
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(MqttError::Timeout(timeout, "publish to be sent"));
            }

            match self.poll_once(remaining).await {
                Ok(Some(EventRoute::PublishSent { packet_id })) => {
                    if qos != DeliveryQos::AtMostOnce {
                        self.in_flight.insert(packet_id);
                    }
                    debug!(target: "mqtt_transport", topic, packet_id, qos = qos.level(), "Publish sent");
                    return Ok(());
                }
                Ok(Some(_)) => self.check_connection_state()?,
                Ok(None) => return Err(MqttError::Timeout(timeout, "publish to be sent")),
                Err(e) => return Err(MqttError::PublishFailed(Box::new(e))),
            }
        }
    }

    /// Close the session gracefully
    pub async fn disconnect(&mut self) -> Result<(), MqttError> {
        let Some(session) = &self.session else {
            return Ok(());
        };

        session
            .client
            .disconnect()
            .await
            .map_err(|e| MqttError::ConnectionFailed(Box::new(e)))?;

        // Drive the loop so the Disconnect packet is actually written
        let deadline = Instant::now() + DISCONNECT_TIMEOUT;
        while self.session.is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.poll_once(remaining).await {
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => break,
            }
        }

        self.mark_disconnected("Client disconnected".to_string());
        info!(client_id = %self.client_id, "MQTT client disconnected");
        Ok(())
    }

    /// Get current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.state.clone()
    }

    /// Deliveries written out but not yet confirmed by the broker
    pub fn pending_deliveries(&self) -> usize {
        self.in_flight.len()
    }

    /// Time since the current session was acknowledged
    pub fn session_uptime(&self) -> Option<Duration> {
        self.connect_time.map(|t| t.elapsed())
    }

    /// Number of sessions established since creation
    pub fn session_count(&self) -> u32 {
        self.session_count
    }

    /// Check connection state before operations
    fn check_connection_state(&self) -> Result<(), MqttError> {
        if self.session.is_none() || self.state != ConnectionState::Connected {
            return Err(MqttError::NotConnected {
                state: self.state.clone(),
            });
        }
        Ok(())
    }
}

/// Implementation of Transport trait for MqttClient
#[async_trait]
impl Transport for MqttClient {
    type Error = MqttError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        MqttClient::connect(self).await
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        MqttClient::disconnect(self).await
    }

    async fn service(&mut self) -> Result<(), Self::Error> {
        MqttClient::service(self).await
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
        qos: DeliveryQos,
    ) -> Result<(), Self::Error> {
        MqttClient::publish(self, topic, payload, qos).await
    }

    fn connection_state(&self) -> ConnectionState {
        MqttClient::connection_state(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> MqttSection {
        MqttSection {
            // Port 1 on loopback is never an MQTT broker
            broker_url: "mqtt://127.0.0.1:1".to_string(),
            connect_timeout_ms: 500,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_client_starts_disconnected() {
        let client =
            MqttClient::new("car-7", unreachable_config(), Credentials::default()).unwrap();
        assert!(matches!(
            client.connection_state(),
            ConnectionState::Disconnected(_)
        ));
        assert!(!Transport::is_connected(&client));
        assert_eq!(client.pending_deliveries(), 0);
        assert_eq!(client.session_count(), 0);
        assert!(client.session_uptime().is_none());
    }

    #[test]
    fn test_new_client_rejects_bad_url() {
        let config = MqttSection {
            broker_url: "not a url".to_string(),
            ..Default::default()
        };
        let result = MqttClient::new("car-7", config, Credentials::default());
        assert!(matches!(result, Err(MqttError::InvalidBrokerUrl(_))));
    }

    #[tokio::test]
    async fn test_publish_when_not_connected_fails() {
        let mut client =
            MqttClient::new("car-7", unreachable_config(), Credentials::default()).unwrap();
        let result = client
            .publish("formulaE/telemetry", b"{}".to_vec(), DeliveryQos::ExactlyOnce)
            .await;
        assert!(matches!(result, Err(MqttError::NotConnected { .. })));
    }

    #[tokio::test]
    async fn test_service_when_not_connected_fails() {
        let mut client =
            MqttClient::new("car-7", unreachable_config(), Credentials::default()).unwrap();
        assert!(matches!(
            client.service().await,
            Err(MqttError::NotConnected { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails_and_stays_disconnected() {
        let mut client =
            MqttClient::new("car-7", unreachable_config(), Credentials::default()).unwrap();
        let result = client.connect().await;
        assert!(result.is_err());
        assert!(matches!(
            client.connection_state(),
            ConnectionState::Disconnected(_)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_without_session_is_noop() {
        let mut client =
            MqttClient::new("car-7", unreachable_config(), Credentials::default()).unwrap();
        assert!(client.disconnect().await.is_ok());
    }
}
