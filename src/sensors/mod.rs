//! # Sensor Interface
//!
//! Read-only accessors for the flight data the telemetry records carry.
//!
//! The protocol driver never computes sensor values itself: battery, position
//! and GPS figures arrive through [`SensorSource`], already in the source
//! units the flight controller uses internally. Accessors are synchronous
//! and side-effect-free; records are repopulated from them on every
//! successful request, never cached.

#[cfg(test)]
use mockall::automock;

/// GPS fix quality as reported by the navigation subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpsFixType {
    /// No usable fix; coordinates are not valid
    NoFix,
    /// 2D fix
    Fix2D,
    /// 3D fix
    Fix3D,
}

/// Current GPS solution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsSolution {
    /// Fix quality
    pub fix_type: GpsFixType,

    /// Number of satellites used in the solution
    pub num_sat: u8,

    /// Latitude in 1e-7 degree units, signed (north positive)
    pub lat: i32,

    /// Longitude in 1e-7 degree units, signed (east positive)
    pub lon: i32,

    /// Ground speed in cm/s
    pub ground_speed: u16,

    /// Ground course in degrees (0-359)
    pub heading: u16,

    /// Altitude above the launch point in cm
    pub altitude: i32,

    /// Distance to the home point in meters
    pub distance_to_home: u16,

    /// Direction to the home point in 2 degree steps
    pub direction_to_home: u16,
}

impl GpsSolution {
    /// Whether the solution carries valid coordinates
    pub fn has_fix(&self) -> bool {
        self.fix_type != GpsFixType::NoFix
    }
}

/// Battery charge severity relative to the configured thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryState {
    Ok,
    Warning,
    Critical,
}

/// Classify a battery voltage against warning/critical thresholds
///
/// # Arguments
///
/// * `voltage` - Battery voltage in 10mV units
/// * `warning` - Warning threshold in 10mV units
/// * `critical` - Critical threshold in 10mV units (at or below ⇒ critical)
///
/// # Returns
///
/// * `BatteryState` - Severity bucket the voltage falls into
pub fn classify_battery(voltage: u16, warning: u16, critical: u16) -> BatteryState {
    if voltage <= critical {
        BatteryState::Critical
    } else if voltage <= warning {
        BatteryState::Warning
    } else {
        BatteryState::Ok
    }
}

/// Flight data consumed by the record encoders
///
/// Implementations wrap whatever estimation/battery/GPS subsystems the host
/// flight controller provides. All units follow the host's native
/// conventions; the encoders apply the protocol's re-scaling.
#[cfg_attr(test, automock)]
pub trait SensorSource {
    /// Battery voltage in 10mV units (1150 = 11.50V)
    fn battery_voltage(&self) -> u16;

    /// Current draw in 10mA units (250 = 2.5A)
    fn amperage(&self) -> i32;

    /// Capacity drawn from the battery in mAh
    fn mah_drawn(&self) -> i32;

    /// Estimated altitude above the launch point in cm
    fn estimated_altitude(&self) -> i32;

    /// Estimated vertical velocity in cm/s, signed (climb positive)
    fn estimated_vario(&self) -> i32;

    /// Whether a GPS sensor is fitted and delivering solutions
    fn has_gps(&self) -> bool;

    /// Latest GPS solution; contents are only positional when
    /// [`GpsSolution::has_fix`] holds
    fn gps_solution(&self) -> GpsSolution;
}
