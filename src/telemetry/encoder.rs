//! Telemetry payload and its JSON encoding
//!
//! The payload is a plain struct serialized by serde_json; field order in the
//! struct is the key order on the wire.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One cycle's telemetry, built fresh and dropped after publishing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    pub temperature: f32,
    pub humidity: f32,
    pub speed: i32,
    /// Simulated, not measured
    #[serde(rename = "batteryLevel")]
    pub battery_level: u8,
}

/// Payload encoding errors
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Field '{field}' is not a finite number")]
    NonFinite { field: &'static str },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Deterministic JSON encoder for telemetry payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryEncoder;

impl TelemetryEncoder {
    /// Encode as `{"temperature":..,"humidity":..,"speed":..,"batteryLevel":..}`
    pub fn encode(&self, reading: &TelemetryReading) -> Result<String, EncodeError> {
        // serde_json writes non-finite floats as null, which would break the schema
        if !reading.temperature.is_finite() {
            return Err(EncodeError::NonFinite {
                field: "temperature",
            });
        }
        if !reading.humidity.is_finite() {
            return Err(EncodeError::NonFinite { field: "humidity" });
        }

        Ok(serde_json::to_string(reading)?)
    }

    /// Parse a payload produced by `encode`
    pub fn decode(&self, payload: &[u8]) -> Result<TelemetryReading, EncodeError> {
        Ok(serde_json::from_slice(payload)?)
    }
}
