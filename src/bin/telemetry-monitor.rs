//! Telemetry Monitor
//!
//! Subscribes to the telemetry topic and prints every decoded reading.
//! Payloads that do not decode are shown raw and counted as malformed.

use clap::Parser;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use sprint_edge::connection::{RetryDecision, RetryPolicy};
use sprint_edge::telemetry::{TelemetryEncoder, TelemetryReading};
use sprint_edge::transport::mqtt::BrokerAddress;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

/// Live view of published vehicle telemetry
#[derive(Parser)]
#[command(name = "telemetry-monitor")]
#[command(about = "Print telemetry readings published to an MQTT broker")]
#[command(version)]
struct Args {
    /// Broker URL
    #[arg(long, default_value = "mqtt://mqtt-dashboard.com:1883")]
    broker_url: String,

    /// Telemetry topic (wildcards allowed)
    #[arg(short, long, default_value = "formulaE/telemetry")]
    topic: String,

    /// Output format (pretty, compact, or json)
    #[arg(short, long, default_value = "pretty")]
    format: OutputFormat,

    /// Battery level at or below which readings are flagged
    #[arg(long, default_value_t = 30)]
    low_battery: u8,

    /// MQTT username (optional)
    #[arg(long, env = "MQTT_USERNAME")]
    username: Option<String>,

    /// MQTT password (optional)
    #[arg(long, env = "MQTT_PASSWORD")]
    password: Option<String>,
}

/// Output formatting options
#[derive(Clone, Debug, clap::ValueEnum)]
enum OutputFormat {
    /// Color-coded, one block per reading
    Pretty,
    /// Single line per reading
    Compact,
    /// JSON lines for programmatic processing
    Json,
}

const RESET: &str = "\x1b[0m";
const LABEL_COLOR: &str = "\x1b[1;36m";
const VALUE_COLOR: &str = "\x1b[93m";
const WARN_COLOR: &str = "\x1b[1;31m";

fn format_reading(
    topic: &str,
    reading: &TelemetryReading,
    format: &OutputFormat,
    low_battery: u8,
) -> String {
    let timestamp = chrono::Utc::now().format("%H:%M:%S");
    let battery_low = reading.battery_level <= low_battery;

    match format {
        OutputFormat::Json => serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "topic": topic,
            "reading": reading,
            "battery_low": battery_low,
        })
        .to_string(),
        OutputFormat::Compact => format!(
            "{} {} temp={:.1}C hum={:.1}% speed={} battery={}%{}",
            timestamp,
            topic,
            reading.temperature,
            reading.humidity,
            reading.speed,
            reading.battery_level,
            if battery_low { " LOW" } else { "" }
        ),
        OutputFormat::Pretty => {
            let battery_color = if battery_low { WARN_COLOR } else { VALUE_COLOR };
            format!(
                "{LABEL_COLOR}[TELEMETRY]{RESET} {timestamp} {topic}\n  \
                 temperature  {VALUE_COLOR}{:>6.1} C{RESET}\n  \
                 humidity     {VALUE_COLOR}{:>6.1} %{RESET}\n  \
                 speed        {VALUE_COLOR}{:>6} km/h{RESET}\n  \
                 battery      {battery_color}{:>6} %{RESET}",
                reading.temperature, reading.humidity, reading.speed, reading.battery_level
            )
        }
    }
}

fn format_malformed(topic: &str, payload: &str, format: &OutputFormat) -> String {
    let timestamp = chrono::Utc::now().format("%H:%M:%S");
    match format {
        OutputFormat::Json => serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "topic": topic,
            "malformed": payload,
        })
        .to_string(),
        OutputFormat::Compact => format!("{timestamp} {topic} MALFORMED {}", payload.trim()),
        OutputFormat::Pretty => {
            format!("{WARN_COLOR}[MALFORMED]{RESET} {timestamp} {topic}\n  {payload}")
        }
    }
}

fn setup_mqtt_client(args: &Args) -> Result<(AsyncClient, EventLoop), Box<dyn std::error::Error>> {
    let address = BrokerAddress::parse(&args.broker_url)?;
    let client_id = format!("telemetry-monitor-{}", std::process::id());
    let mut mqtt_options = MqttOptions::new(client_id, address.host, address.port);

    if let Some(username) = args.username.as_deref().filter(|u| !u.is_empty()) {
        mqtt_options.set_credentials(username, args.password.clone().unwrap_or_default());
    }
    mqtt_options.set_keep_alive(Duration::from_secs(15));
    mqtt_options.set_clean_session(true);

    Ok(AsyncClient::new(mqtt_options, 16))
}

/// Process events until the session drops. Returns the error that ended
/// it and whether the broker had acknowledged the session.
async fn monitor_session(
    args: &Args,
    client: &AsyncClient,
    event_loop: &mut EventLoop,
) -> (rumqttc::ConnectionError, bool) {
    let mut connected = false;

    loop {
        let event = match event_loop.poll().await {
            Ok(event) => event,
            Err(e) => return (e, connected),
        };

        match event {
            Event::Incoming(Packet::ConnAck(_)) => {
                info!("Connected to MQTT broker");
                connected = true;
                if let Err(e) = client.subscribe(args.topic.as_str(), QoS::ExactlyOnce).await {
                    error!("Failed to subscribe to {}: {}", args.topic, e);
                }
            }
            Event::Incoming(Packet::SubAck(_)) => info!(topic = %args.topic, "Subscribed"),
            Event::Incoming(Packet::Publish(publish)) => {
                let line = match TelemetryEncoder.decode(&publish.payload) {
                    Ok(reading) => {
                        format_reading(&publish.topic, &reading, &args.format, args.low_battery)
                    }
                    Err(e) => {
                        warn!(topic = %publish.topic, "Undecodable payload: {}", e);
                        format_malformed(
                            &publish.topic,
                            &String::from_utf8_lossy(&publish.payload),
                            &args.format,
                        )
                    }
                };
                println!("{line}");
            }
            _ => {}
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("telemetry_monitor=info,rumqttc=warn")
        .init();

    let args = Args::parse();

    println!("sprint-edge telemetry monitor");
    println!("Broker: {}", args.broker_url);
    println!("Topic:  {}", args.topic);
    println!("Press Ctrl+C to stop");
    println!();

    let reconnect = RetryPolicy::fixed(Duration::from_secs(1))
        .with_backoff(2.0, Duration::from_secs(30));
    let mut failed_sessions = 0u32;

    loop {
        let (client, mut event_loop) = setup_mqtt_client(&args)?;

        let outcome = tokio::select! {
            ended = monitor_session(&args, &client, &mut event_loop) => Some(ended),
            _ = signal::ctrl_c() => None,
        };

        let Some((error, was_connected)) = outcome else {
            info!("Shutdown signal received, disconnecting...");
            if tokio::time::timeout(Duration::from_millis(500), client.disconnect())
                .await
                .is_err()
            {
                warn!("Disconnect timed out");
            }
            return Ok(());
        };

        if was_connected {
            warn!("MQTT connection lost: {}", error);
            failed_sessions = 0;
        } else {
            error!("MQTT connection error: {}", error);
        }

        failed_sessions += 1;
        match reconnect.decide(failed_sessions) {
            RetryDecision::Proceed { delay, .. } => {
                warn!("Reconnecting in {:?}...", delay);
                tokio::time::sleep(delay).await;
            }
            RetryDecision::GiveUp { attempts } => {
                return Err(format!("Gave up after {attempts} reconnects").into());
            }
        }
    }
}
