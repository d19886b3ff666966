//! Crate-level error type
//!
//! Each layer has its own error enum; `TelemetryError` is what crosses the
//! boundary into the telemetry loop and the binary.

use crate::sensor::SensorError;
use crate::telemetry::EncodeError;
use crate::transport::NetworkError;
use thiserror::Error;

/// Main error type for telemetry operations
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodeError),

    #[error("Gave up connecting to {target} after {attempts} attempts")]
    RetriesExhausted { target: &'static str, attempts: u32 },
}

impl TelemetryError {
    /// Wrap any transport error
    pub fn transport<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Box::new(error))
    }

    /// Whether the loop should keep running after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            TelemetryError::Config(_) | TelemetryError::RetriesExhausted { .. }
        )
    }
}

/// Result type for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mqtt::MqttError;

    #[test]
    fn test_transport_error_wraps_source() {
        let error = TelemetryError::transport(MqttError::ConnectionFailedStr("refused".to_string()));
        assert!(error.to_string().contains("refused"));
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_retries_exhausted_is_terminal() {
        let error = TelemetryError::RetriesExhausted {
            target: "broker",
            attempts: 5,
        };
        assert_eq!(error.to_string(), "Gave up connecting to broker after 5 attempts");
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_sensor_error_converts() {
        let error: TelemetryError = SensorError::InvalidReading {
            temperature: f32::NAN,
            humidity: 50.0,
        }
        .into();
        assert!(matches!(error, TelemetryError::Sensor(_)));
    }
}
