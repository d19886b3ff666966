//! Telemetry payloads and the publishing loop

pub mod cycle;
pub mod encoder;

pub use cycle::{CycleOutcome, LoopSettings, SensorSuite, TelemetryLoop};
pub use encoder::{EncodeError, TelemetryEncoder, TelemetryReading};
