//! # HoTT Record Encoder
//!
//! Builds the fixed-layout response records from current sensor values.
//!
//! Records are owned byte buffers addressed through the offset tables in
//! [`protocol`](super::protocol) — no reliance on in-memory struct layout.
//! Buffers are initialised once with their markers and sensor ids and then
//! mutated in place on every request; every dynamic field is overwritten
//! each time, values are never cached.

use super::protocol::{self, eam, gps, textmode};
use crate::sensors::{BatteryState, GpsFixType, SensorSource};

/// Split a value into a little-endian byte pair at `offset_l`, `offset_l + 1`
fn put_u16(buf: &mut [u8], offset_l: usize, value: u16) {
    buf[offset_l] = (value & 0xFF) as u8;
    buf[offset_l + 1] = (value >> 8) as u8;
}

/// Read back a little-endian byte pair (round-trip tests and captures)
pub fn read_u16(buf: &[u8], offset_l: usize) -> u16 {
    buf[offset_l] as u16 | (buf[offset_l + 1] as u16) << 8
}

/// A coordinate packed into the GPS record's wire fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedCoordinate {
    /// Hemisphere flag: 1 for south/west (negative input)
    pub hemisphere: u8,

    /// Whole degrees and minutes packed as `degrees * 100 + minutes`
    pub deg_min: u16,

    /// Remaining seconds in hundredths of an arc-second
    pub sec: u16,
}

/// Pack a coordinate in 1e-7 degree units into degree-minute/second fields
///
/// Integer truncation throughout. The sign is carried by the hemisphere
/// flag; the degree-minute word of a negative coordinate wraps rather than
/// taking an absolute value, which is what fielded receivers expect.
pub fn pack_coordinate(coordinate: i32) -> PackedCoordinate {
    let deg = coordinate / protocol::GPS_DEGREES_DIVIDER;
    let mut sec = (coordinate - deg * protocol::GPS_DEGREES_DIVIDER) * 6;
    let min = sec / 1_000_000;
    sec = (sec % 1_000_000) / 100;
    let deg_min = deg * 100 + min;

    PackedCoordinate {
        hemisphere: (coordinate < 0) as u8,
        deg_min: deg_min as u16,
        sec: sec as u16,
    }
}

/// The 45-byte GPS response record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpsRecord {
    buf: [u8; gps::MSG_LEN],
}

impl Default for GpsRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl GpsRecord {
    /// Create a record with markers and sensor ids in place, all data zeroed
    pub fn new() -> Self {
        let mut buf = [0u8; gps::MSG_LEN];
        buf[gps::START] = protocol::HOTT_START_BYTE;
        buf[gps::SENSOR_ID] = protocol::HOTT_TELEMETRY_GPS_SENSOR_ID;
        buf[gps::SENSOR_TEXT_ID] = protocol::HOTT_GPS_SENSOR_TEXT_ID;
        buf[gps::STOP] = protocol::HOTT_STOP_BYTE;
        Self { buf }
    }

    /// Wire image of the record
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Write latitude and longitude into the NS/EW field groups
    pub fn set_coordinates(&mut self, latitude: i32, longitude: i32) {
        let lat = pack_coordinate(latitude);
        self.buf[gps::POS_NS] = lat.hemisphere;
        put_u16(&mut self.buf, gps::POS_NS_DM_L, lat.deg_min);
        put_u16(&mut self.buf, gps::POS_NS_SEC_L, lat.sec);

        let lon = pack_coordinate(longitude);
        self.buf[gps::POS_EW] = lon.hemisphere;
        put_u16(&mut self.buf, gps::POS_EW_DM_L, lon.deg_min);
        put_u16(&mut self.buf, gps::POS_EW_SEC_L, lon.sec);
    }

    /// Populate the record from the current sensor values
    ///
    /// Satellite count and climb rates are reported regardless of fix
    /// state; positional fields are only written when a fix is held, with
    /// the fix character signalling validity to the receiver.
    pub fn prepare<S: SensorSource>(&mut self, sensors: &S) {
        let sol = sensors.gps_solution();
        self.buf[gps::SATELLITES] = sol.num_sat;

        let climbrate = (sensors.estimated_vario() + protocol::HOTT_CLIMBRATE_OFFSET).max(0);
        put_u16(&mut self.buf, gps::CLIMBRATE_L, climbrate as u16);

        let climbrate3s = (3.0f32 * sensors.estimated_vario() as f32 / 100.0
            + protocol::HOTT_CLIMBRATE3S_OFFSET as f32) as i32;
        self.buf[gps::CLIMBRATE3S] = climbrate3s.max(0) as u8;

        if !sol.has_fix() {
            self.buf[gps::FIX_CHAR] = protocol::GPS_FIX_CHAR_NONE;
            return;
        }

        self.buf[gps::FIX_CHAR] = if sol.fix_type == GpsFixType::Fix3D {
            protocol::GPS_FIX_CHAR_3D
        } else {
            protocol::GPS_FIX_CHAR_2D
        };

        self.set_coordinates(sol.lat, sol.lon);

        // Ground speed arrives in cm/s and goes out in km/h
        let speed = (sol.ground_speed as u32 * 36 / 1000) as u16;
        put_u16(&mut self.buf, gps::SPEED_L, speed);

        self.buf[gps::FLIGHT_DIRECTION] = (sol.heading / 2) as u8;

        put_u16(&mut self.buf, gps::HOME_DISTANCE_L, sol.distance_to_home);

        let altitude = (sol.altitude / 100 + protocol::HOTT_GPS_ALTITUDE_OFFSET) as u16;
        put_u16(&mut self.buf, gps::ALTITUDE_L, altitude);

        self.buf[gps::HOME_DIRECTION] = sol.direction_to_home as u8;
    }
}

/// The 44-byte EAM (Electric Air Module) response record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EamRecord {
    buf: [u8; eam::MSG_LEN],
}

impl Default for EamRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl EamRecord {
    /// Create a record with markers and sensor ids in place, all data zeroed
    pub fn new() -> Self {
        let mut buf = [0u8; eam::MSG_LEN];
        buf[eam::START] = protocol::HOTT_START_BYTE;
        buf[eam::SENSOR_ID] = protocol::HOTT_TELEMETRY_EAM_SENSOR_ID;
        buf[eam::SENSOR_TEXT_ID] = protocol::HOTT_EAM_SENSOR_TEXT_ID;
        buf[eam::STOP] = protocol::HOTT_STOP_BYTE;
        Self { buf }
    }

    /// Wire image of the record
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Populate the record from the current sensor values
    ///
    /// Alarm fields are cleared first and only re-raised when the alarm
    /// monitor's wall-clock interval has elapsed, so a warning tone sounds
    /// periodically instead of on every 200ms poll cycle.
    pub fn prepare<S: SensorSource>(
        &mut self,
        sensors: &S,
        alarm: &mut AlarmMonitor,
        battery_state: BatteryState,
        now_ms: u64,
    ) {
        self.buf[eam::WARNING_BEEPS] = 0;
        self.buf[eam::ALARM_INVERS1] = 0;

        // vbat resolution is 10mV, the record wants deciVolt
        let vbat_dcv = sensors.battery_voltage() / 10;
        put_u16(&mut self.buf, eam::MAIN_VOLTAGE_L, vbat_dcv);
        put_u16(&mut self.buf, eam::BATT1_VOLTAGE_L, vbat_dcv);

        if let Some((beeps, invers1)) = alarm.refresh(now_ms, battery_state) {
            self.buf[eam::WARNING_BEEPS] = beeps;
            self.buf[eam::ALARM_INVERS1] = invers1;
        }

        let amp = sensors.amperage() / 10;
        put_u16(&mut self.buf, eam::CURRENT_L, amp as u16);

        let mah = sensors.mah_drawn() / 10;
        put_u16(&mut self.buf, eam::BATT_CAP_L, mah as u16);

        let altitude = (sensors.estimated_altitude() as f32 / 100.0
            + protocol::HOTT_GPS_ALTITUDE_OFFSET as f32) as i32;
        put_u16(&mut self.buf, eam::ALTITUDE_L, altitude.max(0) as u16);

        let climbrate = (sensors.estimated_vario() + protocol::HOTT_CLIMBRATE_OFFSET).max(0);
        put_u16(&mut self.buf, eam::CLIMBRATE_L, climbrate as u16);

        let climbrate3s = (3.0f32 * sensors.estimated_vario() as f32 / 100.0
            + protocol::HOTT_CLIMBRATE3S_OFFSET as f32) as i32;
        self.buf[eam::CLIMBRATE3S] = climbrate3s.max(0) as u8;
    }
}

/// The 172-byte textmode (CMS overlay) response record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord {
    buf: [u8; textmode::MSG_LEN],
}

impl Default for TextRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRecord {
    /// Create a record with markers in place and a blank character grid
    pub fn new() -> Self {
        let mut buf = [0u8; textmode::MSG_LEN];
        buf[textmode::START] = protocol::HOTT_TEXTMODE_START;
        buf[textmode::ESC] = protocol::HOTT_EAM_SENSOR_TEXT_ID;
        buf[textmode::STOP] = protocol::HOTT_STOP_BYTE;
        Self { buf }
    }

    /// Wire image of the record
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Write one character into the display grid; out-of-range cells are
    /// ignored
    pub fn write_char(&mut self, column: u8, row: u8, c: u8) {
        let (column, row) = (column as usize, row as usize);
        if column < protocol::HOTT_TEXTMODE_DISPLAY_COLUMNS
            && row < protocol::HOTT_TEXTMODE_DISPLAY_ROWS
        {
            self.buf[textmode::GRID + row * protocol::HOTT_TEXTMODE_DISPLAY_COLUMNS + column] = c;
        }
    }

    /// Current escape byte
    pub fn esc(&self) -> u8 {
        self.buf[textmode::ESC]
    }

    /// Set the escape byte (sensor text id, or 0x01 when leaving the menu)
    pub fn set_esc(&mut self, esc: u8) {
        self.buf[textmode::ESC] = esc;
    }
}

/// Periodic battery alarm check, gated by wall-clock time
///
/// Runs independently of the request/response cycle: whichever EAM
/// preparation first observes the interval elapsed re-evaluates the battery
/// state and raises or clears the alarm fields.
#[derive(Debug, Clone)]
pub struct AlarmMonitor {
    interval_ms: u64,
    last_sound_at_ms: u64,
}

impl AlarmMonitor {
    /// Create a monitor sounding at most once per `interval_s` seconds
    pub fn new(interval_s: u32) -> Self {
        Self {
            interval_ms: interval_s as u64 * 1000,
            last_sound_at_ms: 0,
        }
    }

    /// Re-evaluate the alarm if the interval has elapsed
    ///
    /// Returns the `(warning_beeps, alarm_invers1)` pair to write when the
    /// gate fires, `None` while the interval is still running.
    fn refresh(&mut self, now_ms: u64, battery_state: BatteryState) -> Option<(u8, u8)> {
        if now_ms.saturating_sub(self.last_sound_at_ms) < self.interval_ms {
            return None;
        }
        self.last_sound_at_ms = now_ms;

        match battery_state {
            BatteryState::Warning | BatteryState::Critical => Some((
                protocol::HOTT_EAM_WARNING_BEEP_BATTERY,
                protocol::HOTT_EAM_ALARM1_FLAG_BATTERY_1,
            )),
            BatteryState::Ok => Some((
                protocol::HOTT_EAM_ALARM1_FLAG_NONE,
                protocol::HOTT_EAM_ALARM1_FLAG_NONE,
            )),
        }
    }
}
