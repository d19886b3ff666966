//! Pure routing of MQTT events
//!
//! The client drives rumqttc's event loop itself; this module turns each
//! event into a decision the client acts on.

use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::Event;
use rumqttc::Outgoing;

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                Packet::Disconnect(_) => EventRoute::Disconnected,
                Packet::PubAck(ack) => EventRoute::DeliveryConfirmed { packet_id: ack.pkid },
                Packet::PubComp(comp) => EventRoute::DeliveryConfirmed {
                    packet_id: comp.pkid,
                },
                Packet::PubRec(rec) => EventRoute::DeliveryReceived { packet_id: rec.pkid },
                Packet::Publish(publish) => EventRoute::MessageReceived {
                    topic: String::from_utf8_lossy(&publish.topic).to_string(),
                },
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(Outgoing::Publish(packet_id)) => EventRoute::PublishSent {
                packet_id: *packet_id,
            },
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Connection acknowledged - session is up
    ConnectionAcknowledged,
    /// Broker closed the session
    Disconnected,
    /// A publish left the client and was written to the socket
    PublishSent { packet_id: u16 },
    /// Broker received a QoS 2 publish (PubRec); release is in flight
    DeliveryReceived { packet_id: u16 },
    /// Broker completed delivery (PubAck for QoS 1, PubComp for QoS 2)
    DeliveryConfirmed { packet_id: u16 },
    /// Inbound message; the publisher subscribes to nothing, so this is only logged
    MessageReceived { topic: String },
    /// Keep-alive and other protocol traffic
    InfrastructureEvent(String),
    /// Any other outgoing packet
    OutgoingEvent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::v5::mqttbytes::v5::PingResp;

    #[test]
    fn test_outgoing_publish_is_publish_sent() {
        let route = MessageHandler::route_mqtt_event(&Event::Outgoing(Outgoing::Publish(7)));
        assert_eq!(route, EventRoute::PublishSent { packet_id: 7 });
    }

    #[test]
    fn test_outgoing_ping_is_plain_outgoing() {
        let route = MessageHandler::route_mqtt_event(&Event::Outgoing(Outgoing::PingReq));
        assert_eq!(route, EventRoute::OutgoingEvent);
    }

    #[test]
    fn test_ping_response_is_infrastructure() {
        let route =
            MessageHandler::route_mqtt_event(&Event::Incoming(Packet::PingResp(PingResp)));
        assert!(matches!(route, EventRoute::InfrastructureEvent(_)));
    }
}
