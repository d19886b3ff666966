//! Testing utilities and mock implementations
//!
//! Mocks for the transport, the network link and the sensors, so the
//! telemetry loop can be driven without a broker or attached hardware.

pub mod mocks;

pub use mocks::*;
