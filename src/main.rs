//! sprint-edge telemetry publisher - main entry point

use clap::{Parser, Subcommand};
use sprint_edge::config::{SensorSource, SensorsSection, TelemetryConfig};
use sprint_edge::connection::ConnectionManager;
use sprint_edge::observability::init_default_logging;
use sprint_edge::sensor::{
    AnalogInput, ClimateSensor, IioAnalogInput, IioClimateSensor, SimulatedBattery,
    SimulatedClimateSensor, SimulatedPotentiometer, SpeedSimulator,
};
use sprint_edge::telemetry::{LoopSettings, SensorSuite, TelemetryLoop};
use sprint_edge::transport::mqtt::{BrokerAddress, Credentials, MqttClient};
use sprint_edge::transport::HostNetworkLink;
use std::path::{Path, PathBuf};
use std::process;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

type EdgeLoop = TelemetryLoop<
    HostNetworkLink,
    MqttClient,
    Box<dyn ClimateSensor>,
    Box<dyn AnalogInput>,
    SimulatedBattery,
>;

/// Vehicle telemetry publisher
#[derive(Parser)]
#[command(name = "sprint-edge")]
#[command(about = "Publishes vehicle telemetry to an MQTT broker")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the telemetry loop
    Run {
        /// Stop after this many cycles instead of running until signalled
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Read the sensors once and print the payload without publishing
    Sample,
    /// Validate configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    info!("Starting sprint-edge v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run { cycles } => run_telemetry(config, cycles).await,
        Commands::Sample => sample_once(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: Option<&Path>,
) -> Result<TelemetryConfig, Box<dyn std::error::Error>> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => match TelemetryConfig::find_default_path() {
            Some(path) => path,
            None => {
                warn!("No configuration file found, using built-in defaults");
                return Ok(TelemetryConfig::default());
            }
        },
    };

    info!("Loading configuration from: {}", path.display());
    Ok(TelemetryConfig::load_from_file(&path)?)
}

/// Sensor factory for the configured source
struct SensorFactory;

impl SensorFactory {
    fn climate(sensors: &SensorsSection) -> Box<dyn ClimateSensor> {
        match sensors.source {
            SensorSource::Simulated => Box::new(SimulatedClimateSensor::new(
                sensors.dht_pin,
                sensors.simulated_dropout,
                sensors.seed,
            )),
            SensorSource::Iio => Box::new(IioClimateSensor::new(&sensors.iio_climate_dir)),
        }
    }

    fn potentiometer(sensors: &SensorsSection) -> Box<dyn AnalogInput> {
        match sensors.source {
            SensorSource::Simulated => {
                Box::new(SimulatedPotentiometer::new(sensors.pot_pin, sensors.seed))
            }
            SensorSource::Iio => Box::new(IioAnalogInput::new(&sensors.iio_adc_path)),
        }
    }

    fn battery(sensors: &SensorsSection) -> SimulatedBattery {
        match sensors.seed {
            Some(seed) => SimulatedBattery::seeded(seed.wrapping_add(2)),
            None => SimulatedBattery::new(),
        }
    }
}

/// Bootstrap: wire the network link, broker client and sensors into the loop
fn build_loop(config: &TelemetryConfig) -> Result<EdgeLoop, Box<dyn std::error::Error>> {
    let settings = LoopSettings::from_config(config)?;

    let address = BrokerAddress::parse(&config.mqtt.broker_url)?;
    let network_password = config.get_network_password();
    let link = HostNetworkLink::new(
        &config.network.ssid,
        network_password.as_deref(),
        &address.host,
        address.port,
    );

    let credentials = Credentials {
        username: config.get_mqtt_username(),
        password: config.get_mqtt_password(),
    };
    let client = MqttClient::new(&config.device.client_id, config.mqtt.clone(), credentials)?;

    let connection = ConnectionManager::new(
        link,
        client,
        config.network.retry.clone(),
        config.mqtt.retry.clone(),
    );

    let telemetry = &config.telemetry;
    let sensors = SensorSuite {
        climate: SensorFactory::climate(&config.sensors),
        potentiometer: SensorFactory::potentiometer(&config.sensors),
        battery: SensorFactory::battery(&config.sensors),
        speed: SpeedSimulator::new(
            telemetry.adc_min,
            telemetry.adc_max,
            telemetry.speed_min,
            telemetry.speed_max,
        ),
    };

    Ok(TelemetryLoop::new(settings, connection, sensors))
}

async fn run_telemetry(
    config: TelemetryConfig,
    cycles: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut telemetry = build_loop(&config)?;

    info!(
        client_id = %config.device.client_id,
        broker = %config.mqtt.broker_url,
        topic = %config.mqtt.topic,
        interval_ms = config.telemetry.interval_ms,
        "Telemetry publisher starting"
    );

    match cycles {
        Some(cycles) => {
            telemetry.run_cycles(cycles).await?;
            telemetry.shutdown().await?;
        }
        None => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            spawn_signal_handler(shutdown_tx)?;
            telemetry.run_until(shutdown_rx).await?;
        }
    }

    Ok(())
}

/// First SIGINT/SIGTERM stops the loop after the current cycle; a second
/// one exits immediately (the loop may be blocked reconnecting).
fn spawn_signal_handler(shutdown: watch::Sender<bool>) -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully..."),
        }
        if shutdown.send(true).is_err() {
            debug!("Telemetry loop already stopped");
        }

        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
        warn!("Second signal received, exiting immediately");
        process::exit(130);
    });

    Ok(())
}

async fn sample_once(config: TelemetryConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut telemetry = build_loop(&config)?;
    let (reading, payload) = telemetry.sample().await?;

    debug!(?reading, "Sampled telemetry");
    println!("{payload}");
    Ok(())
}

fn handle_config_command(
    config: &TelemetryConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    if show {
        println!("Effective configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
