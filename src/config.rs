//! Configuration system for the sprint-edge telemetry publisher
//!
//! Configuration is loaded once at startup from a TOML file and never changes
//! afterwards. Every section has defaults matching the reference deployment,
//! so an empty file (or no file at all) yields a working configuration.
//! Secrets are never stored in the file: `*_env` fields name the environment
//! variable holding the value.

use crate::connection::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    pub device: DeviceSection,
    pub network: NetworkSection,
    pub mqtt: MqttSection,
    pub sensors: SensorsSection,
    pub telemetry: TelemetrySection,
}

/// Device identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceSection {
    /// MQTT client identifier presented in the session handshake
    pub client_id: String,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            client_id: "clientId-yti4dEeWBf".to_string(),
        }
    }
}

/// Wireless network section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkSection {
    /// Access point name
    pub ssid: String,
    /// Environment variable containing the access point password (open network if unset)
    pub password_env: Option<String>,
    /// Retry policy for link association
    pub retry: RetryPolicy,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            ssid: "Wokwi-GUEST".to_string(),
            password_env: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// MQTT broker section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MqttSection {
    /// Broker URL with protocol and port, e.g. `mqtt://host:1883`
    pub broker_url: String,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// Telemetry topic
    pub topic: String,
    /// Requested delivery guarantee (0, 1 or 2)
    pub qos: u8,
    /// Keep-alive interval in seconds. Pings only go out while a cycle runs,
    /// so the telemetry interval must stay within 1.5 keep-alive periods.
    pub keep_alive_secs: u64,
    /// How long to wait for ConnAck before an attempt counts as failed
    pub connect_timeout_ms: u64,
    /// How long to wait for a publish to leave the client
    pub publish_timeout_ms: u64,
    /// Retry policy for session establishment
    pub retry: RetryPolicy,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            broker_url: "mqtt://mqtt-dashboard.com:1883".to_string(),
            username_env: None,
            password_env: None,
            topic: "formulaE/telemetry".to_string(),
            qos: 2,
            keep_alive_secs: 15,
            connect_timeout_ms: 10_000,
            publish_timeout_ms: 5_000,
            retry: RetryPolicy::default(),
        }
    }
}

/// Where sensor values come from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SensorSource {
    /// Software sensors for hosts without attached hardware
    Simulated,
    /// Linux Industrial I/O sysfs channels
    Iio,
}

/// Sensor wiring section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SensorsSection {
    pub source: SensorSource,
    /// Data pin of the DHT22 temperature/humidity sensor
    pub dht_pin: u8,
    /// Analog pin of the potentiometer
    pub pot_pin: u8,
    /// IIO device directory exposing `in_temp_input` and `in_humidityrelative_input`
    pub iio_climate_dir: PathBuf,
    /// IIO raw ADC channel file for the potentiometer
    pub iio_adc_path: PathBuf,
    /// Probability in [0, 1] that a simulated climate read yields NaN
    pub simulated_dropout: f64,
    /// Seed for the simulated sources (random when unset)
    pub seed: Option<u64>,
}

impl Default for SensorsSection {
    fn default() -> Self {
        Self {
            source: SensorSource::Simulated,
            dht_pin: 12,
            pot_pin: 34,
            iio_climate_dir: PathBuf::from("/sys/bus/iio/devices/iio:device0"),
            iio_adc_path: PathBuf::from("/sys/bus/iio/devices/iio:device1/in_voltage6_raw"),
            simulated_dropout: 0.0,
            seed: None,
        }
    }
}

/// What the loop does after a failed sensor read
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SensorFailurePolicy {
    /// Start the next cycle straight away
    RetryImmediately,
    /// Wait the normal cycle interval before the next attempt
    WaitInterval,
}

/// Telemetry cycle section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetrySection {
    /// Delay between publishes in milliseconds
    pub interval_ms: u64,
    pub on_sensor_failure: SensorFailurePolicy,
    /// Lowest raw potentiometer value
    pub adc_min: i32,
    /// Highest raw potentiometer value
    pub adc_max: i32,
    /// Speed reported at `adc_min`
    pub speed_min: i32,
    /// Speed reported at `adc_max`
    pub speed_max: i32,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            on_sensor_failure: SensorFailurePolicy::RetryImmediately,
            adc_min: 0,
            adc_max: 4095,
            speed_min: 0,
            speed_max: 250,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Default locations searched when no path is given
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["sprint-edge.toml", "config/sprint-edge.toml"];

impl TelemetryConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: TelemetryConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Find the first existing default config file
    pub fn find_default_path() -> Option<PathBuf> {
        DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_client_id(&self.device.client_id)?;

        if self.mqtt.topic.is_empty() || self.mqtt.topic.contains(&['+', '#'][..]) {
            return Err(ConfigError::InvalidConfig(format!(
                "Publish topic '{}' must be non-empty and free of wildcards",
                self.mqtt.topic
            )));
        }
        if self.mqtt.qos > 2 {
            return Err(ConfigError::InvalidConfig(format!(
                "QoS must be 0, 1 or 2, got {}",
                self.mqtt.qos
            )));
        }
        if self.mqtt.keep_alive_secs < 5 {
            return Err(ConfigError::InvalidConfig(
                "keep_alive_secs must be at least 5".to_string(),
            ));
        }
        if self.mqtt.connect_timeout_ms == 0 || self.mqtt.publish_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "MQTT timeouts must be greater than 0".to_string(),
            ));
        }
        if self.telemetry.interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "interval_ms must be greater than 0".to_string(),
            ));
        }
        let keep_alive_limit_ms = self.mqtt.keep_alive_secs.saturating_mul(1_500);
        if self.telemetry.interval_ms > keep_alive_limit_ms {
            return Err(ConfigError::InvalidConfig(format!(
                "interval_ms ({}) exceeds 1.5 x keep_alive_secs ({} ms); the broker would drop the idle session",
                self.telemetry.interval_ms, keep_alive_limit_ms
            )));
        }
        if self.telemetry.adc_min >= self.telemetry.adc_max {
            return Err(ConfigError::InvalidConfig(format!(
                "adc_min ({}) must be below adc_max ({})",
                self.telemetry.adc_min, self.telemetry.adc_max
            )));
        }
        if !(0.0..=1.0).contains(&self.sensors.simulated_dropout) {
            return Err(ConfigError::InvalidConfig(
                "simulated_dropout must lie in [0, 1]".to_string(),
            ));
        }

        self.network
            .retry
            .validate()
            .map_err(|e| ConfigError::InvalidConfig(format!("network.retry: {e}")))?;
        self.mqtt
            .retry
            .validate()
            .map_err(|e| ConfigError::InvalidConfig(format!("mqtt.retry: {e}")))?;

        Ok(())
    }

    /// Helper method to get environment variable with consistent handling.
    /// Unset and empty variables both mean "no value".
    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name
            .and_then(|name| std::env::var(name).ok())
            .filter(|value| !value.is_empty())
    }

    /// Get MQTT username from environment variable
    pub fn get_mqtt_username(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.username_env.as_ref())
    }

    /// Get MQTT password from environment variable
    pub fn get_mqtt_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.password_env.as_ref())
    }

    /// Get access point password from environment variable
    pub fn get_network_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.network.password_env.as_ref())
    }
}

/// MQTT 3.1.1 restricts client identifiers to 23 alphanumeric characters;
/// most brokers accept more, but the character set is kept portable.
fn validate_client_id(client_id: &str) -> Result<(), ConfigError> {
    let valid_chars = client_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if client_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidConfig(format!(
            "Client ID '{client_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
