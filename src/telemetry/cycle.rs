//! The telemetry cycle driver
//!
//! One cycle: ensure the broker session, service transport housekeeping,
//! read sensors, derive speed and the simulated battery level, encode,
//! publish, wait. Everything runs on the caller's task; the only suspension
//! points are the connection retries, the transport calls and the wait.

use super::encoder::{TelemetryEncoder, TelemetryReading};
use crate::config::{SensorFailurePolicy, TelemetryConfig};
use crate::connection::ConnectionManager;
use crate::error::{TelemetryError, TelemetryResult};
use crate::observability::CycleStats;
use crate::sensor::{AnalogInput, BatterySource, ClimateSensor, SensorReader, SpeedSimulator};
use crate::transport::{DeliveryQos, NetworkLink, Transport};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument};

/// What happened in one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Payload handed to the broker
    Published,
    /// Publish rejected or not deliverable; the reading is dropped
    PublishFailed,
    /// Sensor read failed; nothing was published
    SensorFailed,
}

/// Per-loop settings derived from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub topic: String,
    pub qos: DeliveryQos,
    pub interval: Duration,
    pub on_sensor_failure: SensorFailurePolicy,
}

impl LoopSettings {
    pub fn from_config(config: &TelemetryConfig) -> TelemetryResult<Self> {
        let qos = DeliveryQos::from_level(config.mqtt.qos).ok_or_else(|| {
            TelemetryError::Config(crate::config::ConfigError::InvalidConfig(format!(
                "QoS must be 0, 1 or 2, got {}",
                config.mqtt.qos
            )))
        })?;

        Ok(Self {
            topic: config.mqtt.topic.clone(),
            qos,
            interval: Duration::from_millis(config.telemetry.interval_ms),
            on_sensor_failure: config.telemetry.on_sensor_failure,
        })
    }
}

/// Everything the loop reads from
pub struct SensorSuite<C, A, B> {
    pub climate: C,
    pub potentiometer: A,
    pub battery: B,
    pub speed: SpeedSimulator,
}

/// Top-level telemetry driver
pub struct TelemetryLoop<N, T, C, A, B> {
    settings: LoopSettings,
    connection: ConnectionManager<N, T>,
    climate: SensorReader<C>,
    potentiometer: A,
    battery: B,
    speed: SpeedSimulator,
    encoder: TelemetryEncoder,
    stats: CycleStats,
}

impl<N, T, C, A, B> TelemetryLoop<N, T, C, A, B>
where
    N: NetworkLink,
    T: Transport,
    C: ClimateSensor,
    A: AnalogInput,
    B: BatterySource,
{
    pub fn new(
        settings: LoopSettings,
        connection: ConnectionManager<N, T>,
        sensors: SensorSuite<C, A, B>,
    ) -> Self {
        Self {
            settings,
            connection,
            climate: SensorReader::new(sensors.climate),
            potentiometer: sensors.potentiometer,
            battery: sensors.battery,
            speed: sensors.speed,
            encoder: TelemetryEncoder,
            stats: CycleStats::new(),
        }
    }

    /// Read every input and assemble this cycle's reading
    pub async fn read_telemetry(&mut self) -> TelemetryResult<TelemetryReading> {
        let climate = self.climate.read().await?;
        let raw = self.potentiometer.read_raw().await?;
        let speed = self.speed.speed_for(raw);
        let battery_level = self.battery.level();

        Ok(TelemetryReading {
            temperature: climate.temperature,
            humidity: climate.humidity,
            speed,
            battery_level,
        })
    }

    /// Read and encode without touching the broker
    pub async fn sample(&mut self) -> TelemetryResult<(TelemetryReading, String)> {
        let reading = self.read_telemetry().await?;
        let payload = self.encoder.encode(&reading)?;
        Ok((reading, payload))
    }

    /// Run a single cycle, without the trailing wait.
    ///
    /// Only connectivity errors that exhausted a capped retry policy are
    /// returned as `Err`; sensor and publish failures are outcomes.
    pub async fn run_cycle(&mut self) -> TelemetryResult<CycleOutcome> {
        if !self.connection.is_broker_connected() {
            self.connection.ensure_broker_connected().await?;
        }

        if let Err(e) = self.connection.transport_mut().service().await {
            warn!("MQTT housekeeping failed: {}", e);
        }

        // Housekeeping may have found the session dead; publish needs it up
        if !self.connection.is_broker_connected() {
            warn!("MQTT session lost during housekeeping, reconnecting");
            self.connection.ensure_broker_connected().await?;
        }

        let reading = match self.read_telemetry().await {
            Ok(reading) => reading,
            Err(e) => {
                error!("Failed to read sensors: {}", e);
                return Ok(CycleOutcome::SensorFailed);
            }
        };

        info!(
            temperature = reading.temperature,
            humidity = reading.humidity,
            speed = reading.speed,
            battery_level = reading.battery_level,
            "Telemetry sampled"
        );

        let payload = match self.encoder.encode(&reading) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode telemetry: {}", e);
                return Ok(CycleOutcome::SensorFailed);
            }
        };

        debug!(topic = %self.settings.topic, %payload, "Sending telemetry");

        let result = self
            .connection
            .transport_mut()
            .publish(
                &self.settings.topic,
                payload.into_bytes(),
                self.settings.qos,
            )
            .instrument(crate::mqtt_span!(operation = "publish", topic = %self.settings.topic))
            .await;

        match result {
            Ok(()) => {
                info!(topic = %self.settings.topic, "Telemetry sent");
                Ok(CycleOutcome::Published)
            }
            Err(e) => {
                error!(topic = %self.settings.topic, "Failed to send telemetry: {}", e);
                Ok(CycleOutcome::PublishFailed)
            }
        }
    }

    /// How long to wait after a cycle with this outcome
    pub fn delay_after(&self, outcome: CycleOutcome) -> Option<Duration> {
        match (outcome, self.settings.on_sensor_failure) {
            (CycleOutcome::SensorFailed, SensorFailurePolicy::RetryImmediately) => None,
            _ => Some(self.settings.interval),
        }
    }

    async fn step(&mut self) -> TelemetryResult<Option<Duration>> {
        let span = crate::cycle_span!(number = self.stats.cycles() + 1);
        let outcome = self.run_cycle().instrument(span).await?;
        self.stats.record(outcome);
        Ok(self.delay_after(outcome))
    }

    /// Run a fixed number of cycles; there is no wait after the last one
    pub async fn run_cycles(&mut self, cycles: u64) -> TelemetryResult<()> {
        for remaining in (0..cycles).rev() {
            let delay = self.step().await?;
            if remaining > 0 {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
            }
        }
        Ok(())
    }

    /// Run forever
    pub async fn run(&mut self) -> TelemetryResult<()> {
        loop {
            if let Some(delay) = self.step().await? {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Run until `shutdown` turns true. The flag is checked between cycles
    /// and interrupts the inter-cycle wait; a cycle in progress completes.
    pub async fn run_until(&mut self, mut shutdown: watch::Receiver<bool>) -> TelemetryResult<()> {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = self.step().await?;

            if let Some(delay) = delay {
                let stop = tokio::select! {
                    _ = tokio::time::sleep(delay) => false,
                    _ = wait_for_shutdown(&mut shutdown) => true,
                };
                if stop {
                    break;
                }
            }
        }

        self.shutdown().await
    }

    /// Log the run summary and close the broker session
    pub async fn shutdown(&mut self) -> TelemetryResult<()> {
        info!("Telemetry loop stopping");
        self.stats.log_summary();
        self.connection.shutdown().await
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn connection(&self) -> &ConnectionManager<N, T> {
        &self.connection
    }
}

/// Resolve once the flag is true; never resolves if the sender is gone
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
