//! # HoTT Link
//!
//! Graupner HoTT half-duplex telemetry link driver for flight controllers.
//!
//! This binary drives the protocol state machine against a real serial
//! port, standing in for the flight controller's telemetry task.

use anyhow::Result;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use hott_link::config::Config;
use hott_link::exchange_log::ExchangeLog;
use hott_link::hott::driver::{HottDriver, PollEvent};
use hott_link::sensors::{GpsFixType, GpsSolution, SensorSource};
use hott_link::serial::HottSerial;

/// Number of completed exchanges between status log messages
const LOG_INTERVAL_EXCHANGES: u64 = 100;

/// Bench sensor values fed to the encoder
///
/// The driver is normally wired to the flight controller's battery and
/// navigation subsystems; on the bench this fixed data set keeps a real
/// transmitter's telemetry pages and alarms exercisable end to end.
#[derive(Debug, Default)]
struct BenchSensors;

impl SensorSource for BenchSensors {
    fn battery_voltage(&self) -> u16 {
        1150 // 11.50V
    }

    fn amperage(&self) -> i32 {
        250 // 2.5A
    }

    fn mah_drawn(&self) -> i32 {
        420
    }

    fn estimated_altitude(&self) -> i32 {
        2500 // 25m
    }

    fn estimated_vario(&self) -> i32 {
        120 // 1.2 m/s climb
    }

    fn has_gps(&self) -> bool {
        true
    }

    fn gps_solution(&self) -> GpsSolution {
        GpsSolution {
            fix_type: GpsFixType::Fix3D,
            num_sat: 9,
            lat: 482_345_678,  // 48.2345678°N
            lon: 115_432_109,  // 11.5432109°E
            ground_speed: 850, // cm/s
            heading: 270,
            altitude: 13_500,  // cm
            distance_to_home: 320,
            direction_to_home: 12,
        }
    }
}

/// Main entry point for the HoTT Link bench driver
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load and validate the TOML configuration
///    - Set up logging (console plus a daily-rolling file)
///    - Open the half-duplex serial port at 19,200 baud
///
/// 2. **Main Loop**
///    - Poll the protocol driver on a fixed interval with monotonic
///      microsecond timestamps; the driver itself never blocks
///    - Record completed exchanges and resyncs to the exchange log
///    - Log a status line every 100 completed exchanges
///
/// 3. **Graceful Shutdown**
///    - Ctrl+C resets the driver (no partially-sent message survives),
///      logs the totals and releases the port
///
/// # Errors
///
/// Returns error if the configuration is invalid or the serial port
/// cannot be opened.
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());
    let config = load_config(&config_path)?;

    std::fs::create_dir_all(&config.exchange_log.log_dir)?;
    let file_appender =
        tracing_appender::rolling::daily(&config.exchange_log.log_dir, "hott-link.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    info!("HoTT Link v{} starting...", env!("CARGO_PKG_VERSION"));

    let serial = HottSerial::open(&config.serial.port, config.serial.half_duplex)?;
    info!("Telemetry port opened at: {}", serial.device_path());

    let mut driver = HottDriver::with_limits(serial, BenchSensors, config.battery.limits());

    let mut log = if config.exchange_log.enabled {
        Some(ExchangeLog::new(&config.exchange_log)?)
    } else {
        None
    };

    let mut poll_interval = interval(Duration::from_micros(config.serial.poll_interval_us));
    let started = std::time::Instant::now();

    info!(
        "Polling HoTT driver every {}µs",
        config.serial.poll_interval_us
    );
    info!("Press Ctrl+C to exit");

    let mut exchanges: u64 = 0;
    let mut resyncs: u64 = 0;
    let mut last_log_count: u64 = 0;

    // Main poll loop
    loop {
        tokio::select! {
            _ = poll_interval.tick() => {
                let now_us = started.elapsed().as_micros() as u64;
                let event = driver.poll(now_us);

                match event {
                    PollEvent::None | PollEvent::ResponseArmed(_) => {}
                    PollEvent::ExchangeComplete(kind) => {
                        exchanges += 1;
                        debug!(?kind, "exchange complete");
                    }
                    PollEvent::RequestTimeout
                    | PollEvent::UnrecognizedRequest
                    | PollEvent::RequestRejected => {
                        resyncs += 1;
                    }
                }

                if let Some(log) = log.as_mut() {
                    if let Err(error) = log.record(event) {
                        warn!(%error, "exchange log write failed");
                    }
                }

                if exchanges - last_log_count >= LOG_INTERVAL_EXCHANGES {
                    info!("Completed {} exchanges ({} resyncs)", exchanges, resyncs);
                    last_log_count = exchanges;
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                driver.reset(started.elapsed().as_micros() as u64);
                info!("Total exchanges: {} ({} resyncs)", exchanges, resyncs);
                break;
            }
        }
    }

    Ok(())
}

/// Load the configuration file, falling back to built-in defaults when the
/// default path does not exist
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Ok(Config::load(path)?)
    } else {
        eprintln!("Config {} not found, using built-in defaults", path);
        Ok(Config::load_defaults()?)
    }
}
