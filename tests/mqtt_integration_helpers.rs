//! MQTT Integration Test Helpers
//!
//! Two kinds of endpoint:
//! - [`ScriptedBroker`], an in-process endpoint on an ephemeral loopback port
//!   that answers the handful of packets the publisher sends. Tests using it
//!   run by default.
//! - A real broker at localhost:1883, for the `#[ignore]`d tests. Run them
//!   with `cargo test -- --ignored` when one is available.
#![allow(dead_code)]

use sprint_edge::config::MqttSection;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Notify};

/// MQTT broker URL for integration runs
pub const MQTT_BROKER_URL: &str = "mqtt://localhost:1883";

/// Create MQTT config pointing to the local broker
pub fn mqtt_config() -> MqttSection {
    MqttSection {
        broker_url: MQTT_BROKER_URL.to_string(),
        connect_timeout_ms: 3_000,
        publish_timeout_ms: 3_000,
        ..Default::default()
    }
}

/// Topic unique to one test run, so parallel runs do not see each other
pub fn unique_topic(name: &str) -> String {
    format!("sprint-edge-test/{}/{}", std::process::id(), name)
}

const CONNECT: u8 = 1;
const PUBLISH: u8 = 3;
const PUBREL: u8 = 6;
const PINGREQ: u8 = 12;
const DISCONNECT: u8 = 14;

/// In-process MQTT v5 endpoint.
///
/// Accepts one session at a time, acknowledges CONNECT, QoS 1/2 publishes,
/// PUBREL and PINGREQ, and records every received publish. `close_session`
/// makes it drop the current socket the way a broker restart would.
pub struct ScriptedBroker {
    pub addr: SocketAddr,
    pub published: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    pub sessions_closed: Arc<AtomicUsize>,
    close: Arc<Notify>,
}

impl ScriptedBroker {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Loopback listener should bind");
        let addr = listener.local_addr().expect("Listener should have an address");

        let published = Arc::new(Mutex::new(Vec::new()));
        let sessions_closed = Arc::new(AtomicUsize::new(0));
        let close = Arc::new(Notify::new());

        let (task_published, task_closed, task_close) =
            (published.clone(), sessions_closed.clone(), close.clone());
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                serve_session(stream, &task_published, &task_close).await;
                task_closed.fetch_add(1, Ordering::SeqCst);
            }
        });

        Self {
            addr,
            published,
            sessions_closed,
            close,
        }
    }

    /// Client config pointing at this endpoint
    pub fn mqtt_config(&self) -> MqttSection {
        MqttSection {
            broker_url: format!("mqtt://{}", self.addr),
            connect_timeout_ms: 2_000,
            publish_timeout_ms: 2_000,
            ..Default::default()
        }
    }

    /// Drop the current session's socket and wait until it is gone
    pub async fn close_session(&self) {
        let before = self.sessions_closed.load(Ordering::SeqCst);
        self.close.notify_one();
        for _ in 0..200 {
            if self.sessions_closed.load(Ordering::SeqCst) > before {
                // Give the FIN time to reach the client socket
                tokio::time::sleep(Duration::from_millis(20)).await;
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("Scripted broker did not close the session");
    }

    pub async fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().await.clone()
    }
}

async fn serve_session(
    mut stream: TcpStream,
    published: &Mutex<Vec<(String, Vec<u8>)>>,
    close: &Notify,
) {
    loop {
        let packet = tokio::select! {
            _ = close.notified() => return,
            packet = read_packet(&mut stream) => packet,
        };
        let Ok((header, body)) = packet else {
            return;
        };

        let reply = match header >> 4 {
            // CONNACK: no session present, success, no properties
            CONNECT => vec![0x20, 0x03, 0x00, 0x00, 0x00],
            PUBLISH => {
                let qos = (header >> 1) & 0x03;
                let (topic, packet_id, payload) = parse_publish(&body, qos);
                published.lock().await.push((topic, payload));
                match (qos, packet_id) {
                    (1, Some([hi, lo])) => vec![0x40, 0x04, hi, lo, 0x00, 0x00],
                    (2, Some([hi, lo])) => vec![0x50, 0x04, hi, lo, 0x00, 0x00],
                    _ => continue,
                }
            }
            PUBREL => vec![0x70, 0x04, body[0], body[1], 0x00, 0x00],
            PINGREQ => vec![0xD0, 0x00],
            DISCONNECT => return,
            _ => continue,
        };

        if stream.write_all(&reply).await.is_err() {
            return;
        }
    }
}

async fn read_packet(stream: &mut TcpStream) -> std::io::Result<(u8, Vec<u8>)> {
    let header = stream.read_u8().await?;

    let mut remaining = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await?;
        remaining |= ((byte & 0x7F) as usize) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    let mut body = vec![0; remaining];
    stream.read_exact(&mut body).await?;
    Ok((header, body))
}

/// Split a v5 PUBLISH body into topic, packet id and payload
fn parse_publish(body: &[u8], qos: u8) -> (String, Option<[u8; 2]>, Vec<u8>) {
    let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
    let topic = String::from_utf8_lossy(&body[2..2 + topic_len]).to_string();
    let mut offset = 2 + topic_len;

    let packet_id = if qos > 0 {
        let id = [body[offset], body[offset + 1]];
        offset += 2;
        Some(id)
    } else {
        None
    };

    // Properties: variable-length size, then the properties themselves
    let mut properties_len = 0usize;
    let mut shift = 0;
    loop {
        let byte = body[offset];
        offset += 1;
        properties_len |= ((byte & 0x7F) as usize) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    offset += properties_len;

    (topic, packet_id, body[offset..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mqtt_config_uses_localhost() {
        let config = mqtt_config();
        assert_eq!(config.broker_url, "mqtt://localhost:1883");
        assert_eq!(config.qos, 2);
    }

    #[test]
    fn test_unique_topic_has_no_wildcards() {
        let topic = unique_topic("qos2");
        assert!(!topic.contains('+') && !topic.contains('#'));
        assert!(topic.ends_with("/qos2"));
    }

    #[test]
    fn test_parse_publish_qos2_body() {
        // topic "a/b", packet id 7, no properties, payload "{}"
        let body = [0x00, 0x03, b'a', b'/', b'b', 0x00, 0x07, 0x00, b'{', b'}'];
        let (topic, packet_id, payload) = parse_publish(&body, 2);
        assert_eq!(topic, "a/b");
        assert_eq!(packet_id, Some([0x00, 0x07]));
        assert_eq!(payload, b"{}");
    }
}
