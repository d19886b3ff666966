//! Linux Industrial I/O (IIO) sysfs sensors
//!
//! The kernel `dht11` driver (which also handles the DHT22) exposes
//! `in_temp_input` in milli-degrees Celsius and `in_humidityrelative_input`
//! in milli-percent. ADC drivers expose `in_voltageN_raw` as a bare integer.
//! A failed DHT transfer surfaces as an I/O error (`EIO`/`ETIMEDOUT`) on read.

use super::{AnalogInput, ClimateReading, ClimateSensor, SensorError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const TEMPERATURE_FILE: &str = "in_temp_input";
const HUMIDITY_FILE: &str = "in_humidityrelative_input";

async fn read_integer(path: &Path) -> Result<i64, SensorError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SensorError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let trimmed = content.trim();
    trimmed.parse::<i64>().map_err(|_| SensorError::Parse {
        path: path.display().to_string(),
        value: trimmed.to_string(),
    })
}

/// DHT-class sensor bound to an IIO device directory
pub struct IioClimateSensor {
    device_dir: PathBuf,
}

impl IioClimateSensor {
    pub fn new(device_dir: impl Into<PathBuf>) -> Self {
        Self {
            device_dir: device_dir.into(),
        }
    }
}

#[async_trait]
impl ClimateSensor for IioClimateSensor {
    async fn read(&mut self) -> Result<ClimateReading, SensorError> {
        let milli_celsius = read_integer(&self.device_dir.join(TEMPERATURE_FILE)).await?;
        let milli_percent = read_integer(&self.device_dir.join(HUMIDITY_FILE)).await?;

        Ok(ClimateReading {
            temperature: milli_celsius as f32 / 1000.0,
            humidity: milli_percent as f32 / 1000.0,
        })
    }
}

/// Raw ADC channel file, e.g. `in_voltage6_raw`
pub struct IioAnalogInput {
    channel_path: PathBuf,
}

impl IioAnalogInput {
    pub fn new(channel_path: impl Into<PathBuf>) -> Self {
        Self {
            channel_path: channel_path.into(),
        }
    }
}

#[async_trait]
impl AnalogInput for IioAnalogInput {
    async fn read_raw(&mut self) -> Result<u16, SensorError> {
        let raw = read_integer(&self.channel_path).await?;
        u16::try_from(raw).map_err(|_| SensorError::Parse {
            path: self.channel_path.display().to_string(),
            value: raw.to_string(),
        })
    }
}
