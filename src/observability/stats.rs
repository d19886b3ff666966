//! Per-run cycle statistics
//!
//! Owned by the telemetry loop and only touched from its execution context,
//! so plain counters suffice.

use crate::telemetry::CycleOutcome;
use serde::Serialize;
use std::time::Instant;
use tracing::info;

/// Counters for telemetry cycles
#[derive(Debug, Clone)]
pub struct CycleStats {
    started: Instant,
    cycles: u64,
    published: u64,
    publish_failures: u64,
    sensor_failures: u64,
    last_publish: Option<Instant>,
}

/// Serializable point-in-time copy of [`CycleStats`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub cycles: u64,
    pub published: u64,
    pub publish_failures: u64,
    pub sensor_failures: u64,
    pub secs_since_last_publish: Option<u64>,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            cycles: 0,
            published: 0,
            publish_failures: 0,
            sensor_failures: 0,
            last_publish: None,
        }
    }

    pub fn record(&mut self, outcome: CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Published => {
                self.published += 1;
                self.last_publish = Some(Instant::now());
            }
            CycleOutcome::PublishFailed => self.publish_failures += 1,
            CycleOutcome::SensorFailed => self.sensor_failures += 1,
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn publish_failures(&self) -> u64 {
        self.publish_failures
    }

    pub fn sensor_failures(&self) -> u64 {
        self.sensor_failures
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            cycles: self.cycles,
            published: self.published,
            publish_failures: self.publish_failures,
            sensor_failures: self.sensor_failures,
            secs_since_last_publish: self.last_publish.map(|t| t.elapsed().as_secs()),
        }
    }

    pub fn log_summary(&self) {
        let snapshot = self.snapshot();
        info!(
            cycles = snapshot.cycles,
            published = snapshot.published,
            publish_failures = snapshot.publish_failures,
            sensor_failures = snapshot.sensor_failures,
            uptime_secs = snapshot.uptime_secs,
            "Telemetry summary"
        );
    }
}
