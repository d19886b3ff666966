//! Sensor inputs
//!
//! Driver-level traits for the climate sensor and the analog potentiometer,
//! the validating [`SensorReader`], and the derived/simulated values built on
//! top of them.

pub mod battery;
pub mod iio;
pub mod simulated;
pub mod speed;

pub use battery::{BatterySource, SimulatedBattery};
pub use iio::{IioAnalogInput, IioClimateSensor};
pub use simulated::{SimulatedClimateSensor, SimulatedPotentiometer};
pub use speed::SpeedSimulator;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// One temperature/humidity sample as reported by the driver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    /// Degrees Celsius
    pub temperature: f32,
    /// Relative humidity, percent
    pub humidity: f32,
}

impl ClimateReading {
    pub fn is_valid(&self) -> bool {
        !self.temperature.is_nan() && !self.humidity.is_nan()
    }
}

/// Sensor read errors
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Invalid reading: temperature={temperature}, humidity={humidity}")]
    InvalidReading { temperature: f32, humidity: f32 },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Unparseable value '{value}' in {path}")]
    Parse { path: String, value: String },
}

/// Temperature/humidity peripheral
#[async_trait]
pub trait ClimateSensor: Send {
    /// Blocking hardware read; may return NaN fields on a bad transfer
    async fn read(&mut self) -> Result<ClimateReading, SensorError>;
}

#[async_trait]
impl<S: ClimateSensor + ?Sized> ClimateSensor for Box<S> {
    async fn read(&mut self) -> Result<ClimateReading, SensorError> {
        (**self).read().await
    }
}

/// Raw analog input channel
#[async_trait]
pub trait AnalogInput: Send {
    async fn read_raw(&mut self) -> Result<u16, SensorError>;
}

#[async_trait]
impl<A: AnalogInput + ?Sized> AnalogInput for Box<A> {
    async fn read_raw(&mut self) -> Result<u16, SensorError> {
        (**self).read_raw().await
    }
}

/// Validating wrapper around the climate sensor
pub struct SensorReader<S> {
    sensor: S,
}

impl<S: ClimateSensor> SensorReader<S> {
    pub fn new(sensor: S) -> Self {
        Self { sensor }
    }

    /// Read the sensor; a NaN in either field counts as a failed read
    pub async fn read(&mut self) -> Result<ClimateReading, SensorError> {
        let reading = self.sensor.read().await?;
        if !reading.is_valid() {
            return Err(SensorError::InvalidReading {
                temperature: reading.temperature,
                humidity: reading.humidity,
            });
        }
        debug!(
            temperature = reading.temperature,
            humidity = reading.humidity,
            "Climate sensor read"
        );
        Ok(reading)
    }

    pub fn into_inner(self) -> S {
        self.sensor
    }
}
