//! Observability: structured logging and cycle statistics

pub mod logging;
pub mod stats;

pub use logging::{init_default_logging, init_logging, parse_level, LogFormat};
pub use stats::{CycleStats, StatsSnapshot};

pub use logging::{cycle_span, mqtt_span};
