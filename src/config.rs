//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::hott::driver::BatteryLimits;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub serial: SerialConfig,
    pub battery: BatteryConfig,
    pub exchange_log: ExchangeLogConfig,
}

/// Serial port configuration
///
/// The baud rate is not configurable: HoTT receivers only speak 19,200.
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_half_duplex")]
    pub half_duplex: bool,

    /// How often the scheduler polls the driver, in µs; must stay well
    /// under the 2000µs inter-byte delay or transmissions stall
    #[serde(default = "default_poll_interval_us")]
    pub poll_interval_us: u64,
}

/// Battery alarm configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BatteryConfig {
    /// Warning threshold in 10mV units (1050 = 10.50V)
    #[serde(default = "default_warning_voltage")]
    pub warning_voltage: u16,

    /// Critical threshold in 10mV units
    #[serde(default = "default_critical_voltage")]
    pub critical_voltage: u16,

    /// Minimum seconds between alarm tones
    #[serde(default = "default_alarm_interval_s")]
    pub alarm_interval_s: u32,
}

/// Exchange log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeLogConfig {
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_half_duplex() -> bool { true }
fn default_poll_interval_us() -> u64 { 1000 }

fn default_warning_voltage() -> u16 { 1050 }
fn default_critical_voltage() -> u16 { 990 }
fn default_alarm_interval_s() -> u32 { 5 }

fn default_log_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }

impl BatteryConfig {
    /// Thresholds in the form the driver consumes
    pub fn limits(&self) -> BatteryLimits {
        BatteryLimits {
            warning_voltage: self.warning_voltage,
            critical_voltage: self.critical_voltage,
            alarm_interval_s: self.alarm_interval_s,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults, equivalent to loading a file with empty sections
    pub fn load_defaults() -> Result<Self> {
        let config: Config = toml::from_str("[serial]\n[battery]\n[exchange_log]\n")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Returns
    ///
    /// * `Result<()>` - Ok if valid, Err if invalid
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(crate::error::HottLinkError::Config(
                toml::de::Error::custom("serial port cannot be empty")
            ));
        }

        // The driver must be polled at least a few times per inter-byte
        // delay (2000µs in the binary profile, 1000µs in textmode)
        if self.serial.poll_interval_us == 0 || self.serial.poll_interval_us > 1000 {
            return Err(crate::error::HottLinkError::Config(
                toml::de::Error::custom("poll_interval_us must be between 1 and 1000")
            ));
        }

        if self.battery.critical_voltage == 0 {
            return Err(crate::error::HottLinkError::Config(
                toml::de::Error::custom("critical_voltage must be greater than 0")
            ));
        }

        if self.battery.warning_voltage <= self.battery.critical_voltage {
            return Err(crate::error::HottLinkError::Config(
                toml::de::Error::custom("warning_voltage must be greater than critical_voltage")
            ));
        }

        if self.battery.alarm_interval_s == 0 || self.battery.alarm_interval_s > 3600 {
            return Err(crate::error::HottLinkError::Config(
                toml::de::Error::custom("alarm_interval_s must be between 1 and 3600")
            ));
        }

        if self.exchange_log.enabled && self.exchange_log.log_dir.is_empty() {
            return Err(crate::error::HottLinkError::Config(
                toml::de::Error::custom("exchange_log log_dir cannot be empty when enabled")
            ));
        }

        if self.exchange_log.max_records_per_file == 0 {
            return Err(crate::error::HottLinkError::Config(
                toml::de::Error::custom("max_records_per_file must be greater than 0")
            ));
        }

        if self.exchange_log.max_files_to_keep == 0 {
            return Err(crate::error::HottLinkError::Config(
                toml::de::Error::custom("max_files_to_keep must be greater than 0")
            ));
        }

        Ok(())
    }
}
