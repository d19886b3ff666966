//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.

use sprint_edge::config::{ConfigError, SensorFailurePolicy, SensorSource, TelemetryConfig};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[device]
client_id = "car-07"

[network]
ssid = "pit-lane"
password_env = "PIT_WIFI_PASS"

[mqtt]
broker_url = "mqtt://broker.local:1884"
topic = "formulaE/car07/telemetry"
qos = 1

[sensors]
source = "iio"
iio_climate_dir = "/sys/bus/iio/devices/iio:device3"

[telemetry]
interval_ms = 1000
on_sensor_failure = "wait_interval"
"#,
    );

    let config = TelemetryConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.device.client_id, "car-07");
    assert_eq!(config.network.ssid, "pit-lane");
    assert_eq!(config.network.password_env.as_deref(), Some("PIT_WIFI_PASS"));
    assert_eq!(config.mqtt.broker_url, "mqtt://broker.local:1884");
    assert_eq!(config.mqtt.topic, "formulaE/car07/telemetry");
    assert_eq!(config.mqtt.qos, 1);
    assert_eq!(config.sensors.source, SensorSource::Iio);
    assert_eq!(
        config.sensors.iio_climate_dir.to_str(),
        Some("/sys/bus/iio/devices/iio:device3")
    );
    assert_eq!(config.telemetry.interval_ms, 1000);
    assert_eq!(
        config.telemetry.on_sensor_failure,
        SensorFailurePolicy::WaitInterval
    );
}

#[test]
fn test_empty_file_yields_reference_defaults() {
    let temp_file = write_config("");
    let config = TelemetryConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config, TelemetryConfig::default());
    assert_eq!(config.device.client_id, "clientId-yti4dEeWBf");
    assert_eq!(config.network.ssid, "Wokwi-GUEST");
    assert_eq!(config.mqtt.broker_url, "mqtt://mqtt-dashboard.com:1883");
    assert_eq!(config.mqtt.topic, "formulaE/telemetry");
    assert_eq!(config.mqtt.qos, 2);
    assert_eq!(config.mqtt.keep_alive_secs, 15);
    assert_eq!(config.sensors.dht_pin, 12);
    assert_eq!(config.sensors.pot_pin, 34);
    assert_eq!(config.telemetry.interval_ms, 5000);
    assert_eq!(
        config.telemetry.on_sensor_failure,
        SensorFailurePolicy::RetryImmediately
    );
}

#[test]
fn test_retry_policies_load_from_nested_tables() {
    let temp_file = write_config(
        r#"
[network.retry]
interval_ms = 500

[mqtt.retry]
interval_ms = 2000
max_attempts = 10
backoff_factor = 2.0
max_interval_ms = 16000
"#,
    );

    let config = TelemetryConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.network.retry.delay_after(1), Duration::from_millis(500));
    assert_eq!(config.network.retry.max_attempts, None);
    assert_eq!(config.mqtt.retry.max_attempts, Some(10));
    assert_eq!(config.mqtt.retry.delay_after(1), Duration::from_secs(2));
    assert_eq!(config.mqtt.retry.delay_after(3), Duration::from_secs(8));
    assert_eq!(config.mqtt.retry.delay_after(9), Duration::from_secs(16));
}

#[test]
fn test_missing_file_is_read_error() {
    let result = TelemetryConfig::load_from_file(std::path::Path::new(
        "/nonexistent/sprint-edge.toml",
    ));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let temp_file = write_config("[mqtt\nbroker_url = ");
    let result = TelemetryConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_unknown_enum_value_is_parse_error() {
    let temp_file = write_config("[telemetry]\non_sensor_failure = \"panic\"");
    let result = TelemetryConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_invalid_values_are_rejected() {
    let cases = [
        ("[mqtt]\ntopic = \"\"", "empty topic"),
        ("[mqtt]\ntopic = \"formulaE/#\"", "wildcard topic"),
        ("[mqtt]\nqos = 3", "qos above 2"),
        ("[telemetry]\ninterval_ms = 0", "zero interval"),
        ("[telemetry]\ninterval_ms = 30000", "interval beyond keep-alive grace"),
        ("[telemetry]\nadc_min = 100\nadc_max = 100", "degenerate adc range"),
        ("[sensors]\nsimulated_dropout = 1.5", "dropout above 1"),
        ("[mqtt.retry]\ninterval_ms = 0", "zero retry interval"),
    ];

    for (content, label) in cases {
        let temp_file = write_config(content);
        let result = TelemetryConfig::load_from_file(temp_file.path());
        assert!(
            matches!(result, Err(ConfigError::InvalidConfig(_))),
            "{label} should be rejected, got {result:?}"
        );
    }
}

#[test]
fn test_credentials_resolve_from_environment() {
    let mut config = TelemetryConfig::default();
    config.mqtt.username_env = Some("SPRINT_EDGE_TEST_MQTT_USER".to_string());
    config.mqtt.password_env = Some("SPRINT_EDGE_TEST_MQTT_PASS".to_string());

    std::env::set_var("SPRINT_EDGE_TEST_MQTT_USER", "pit-crew");
    std::env::set_var("SPRINT_EDGE_TEST_MQTT_PASS", "");

    assert_eq!(config.get_mqtt_username().as_deref(), Some("pit-crew"));
    // Empty values count as unset
    assert_eq!(config.get_mqtt_password(), None);

    std::env::remove_var("SPRINT_EDGE_TEST_MQTT_USER");
    std::env::remove_var("SPRINT_EDGE_TEST_MQTT_PASS");
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = TelemetryConfig::default();
    let rendered = toml::to_string_pretty(&config).unwrap();
    let reparsed = TelemetryConfig::from_toml_str(&rendered).unwrap();
    assert_eq!(reparsed, config);
}
