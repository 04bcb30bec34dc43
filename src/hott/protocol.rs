//! # HoTT Protocol Constants and Types
//!
//! Core protocol definitions for Graupner HoTT telemetry communication.
//!
//! HoTT is a request/response protocol over a single half-duplex wire: the
//! receiver polls with a 2-byte request (mode marker + sensor address) and
//! expects a fixed-layout record plus a one-byte additive checksum in reply.

/// HoTT serial baud rate (fixed by the receiver hardware)
pub const HOTT_BAUD_RATE: u32 = 19_200;

/// Binary mode request marker (first byte of a request)
pub const HOTT_BINARY_MODE_REQUEST_ID: u8 = 0x80;

/// Binary mode request marker as misread by the receiver hardware.
///
/// The receiver sends 0x80 but the upper bit is frequently lost on the
/// shared wire, so the marker arrives as 0x00. Both values must decode as
/// binary mode; 0x7F (text mode) is the only other valid first byte, so the
/// coalescing is unambiguous. Decoding 0x80 strictly breaks real hardware.
pub const HOTT_BINARY_MODE_REQUEST_ID_ALT: u8 = 0x00;

/// Text mode request marker (first byte of a request)
pub const HOTT_TEXT_MODE_REQUEST_ID: u8 = 0x7F;

/// Request frame size: mode marker + address/command byte
pub const HOTT_REQUEST_SIZE: usize = 2;

/// GPS sensor module address (second byte of a binary request)
pub const HOTT_TELEMETRY_GPS_SENSOR_ID: u8 = 0x8A;

/// Electric Air Module (EAM) sensor address (second byte of a binary request)
pub const HOTT_TELEMETRY_EAM_SENSOR_ID: u8 = 0x8E;

/// GPS sensor class id used in text mode and record byte #04
pub const HOTT_GPS_SENSOR_TEXT_ID: u8 = 0xA0;

/// EAM sensor class id used in text mode and record byte #04
pub const HOTT_EAM_SENSOR_TEXT_ID: u8 = 0xE0;

/// Record start marker (binary records)
pub const HOTT_START_BYTE: u8 = 0x7C;

/// Record stop marker (all records)
pub const HOTT_STOP_BYTE: u8 = 0x7D;

/// Textmode record start marker
pub const HOTT_TEXTMODE_START: u8 = 0x7B;

/// Textmode escape byte: signals the sensor is leaving textmode
pub const HOTT_TEXTMODE_ESC: u8 = 0x01;

/// Textmode display grid dimensions
pub const HOTT_TEXTMODE_DISPLAY_ROWS: usize = 8;
pub const HOTT_TEXTMODE_DISPLAY_COLUMNS: usize = 21;

/// Divider between whole degrees and the fractional part of a coordinate
/// expressed in 1e-7 degree units
pub const GPS_DEGREES_DIVIDER: i32 = 10_000_000;

/// Additive offset applied to altitude fields (encoded 500 = 0 m)
pub const HOTT_GPS_ALTITUDE_OFFSET: i32 = 500;

/// Additive offset applied to climb rate fields (encoded 30000 = 0.00 m/s)
pub const HOTT_CLIMBRATE_OFFSET: i32 = 30_000;

/// Additive offset applied to the 3-second climb rate byte (120 = 0 m/3s)
pub const HOTT_CLIMBRATE3S_OFFSET: i32 = 120;

/// GPS fix characters reported in the GPS record
pub const GPS_FIX_CHAR_NONE: u8 = b'-';
pub const GPS_FIX_CHAR_2D: u8 = b'2';
pub const GPS_FIX_CHAR_3D: u8 = b'3';
pub const GPS_FIX_CHAR_DGPS: u8 = b'D';

/// Warning beep code raised with the battery alarm
pub const HOTT_EAM_WARNING_BEEP_BATTERY: u8 = 0x10;

/// EAM alarm_invers1 bit flags (inverted display segments)
pub const HOTT_EAM_ALARM1_FLAG_NONE: u8 = 0;
pub const HOTT_EAM_ALARM1_FLAG_MAH: u8 = 1 << 0;
pub const HOTT_EAM_ALARM1_FLAG_BATTERY_1: u8 = 1 << 1;
pub const HOTT_EAM_ALARM1_FLAG_BATTERY_2: u8 = 1 << 2;
pub const HOTT_EAM_ALARM1_FLAG_TEMPERATURE_1: u8 = 1 << 3;
pub const HOTT_EAM_ALARM1_FLAG_TEMPERATURE_2: u8 = 1 << 4;
pub const HOTT_EAM_ALARM1_FLAG_ALTITUDE: u8 = 1 << 5;
pub const HOTT_EAM_ALARM1_FLAG_CURRENT: u8 = 1 << 6;
pub const HOTT_EAM_ALARM1_FLAG_MAIN_VOLTAGE: u8 = 1 << 7;

/// Delay between the end of a request and the start of the reply.
///
/// The line still belongs to the receiver when the second request byte
/// lands; replying earlier than this collides with the request's tail.
/// Profile-independent, unlike the other timing constants.
pub const HOTT_TX_WINDOW_DELAY_US: u64 = 5_000;

/// Timing constants that differ between the binary and textmode flavors
/// of the protocol.
///
/// The overlay (textmode) flavor polls more slowly but expects tighter
/// byte pacing, so the CMS subsystem swaps the profile when a textmode
/// session starts and the driver swaps it back on the next binary request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingProfile {
    /// Maximum time to wait for the 2-byte request to complete, in µs
    pub request_timeout_us: u64,

    /// Minimum delay between consecutive transmitted bytes, in µs
    pub byte_delay_us: u64,

    /// Guard delay after the checksum byte before the line is released
    /// back to listening, in µs (covers the device's own echo)
    pub post_tx_guard_us: u64,
}

impl TimingProfile {
    /// Default profile used for binary sensor exchanges
    pub const fn binary() -> Self {
        Self {
            request_timeout_us: 4_000,
            byte_delay_us: 2_000,
            post_tx_guard_us: 2_000,
        }
    }

    /// Overlay profile used while a textmode (CMS) session is active
    pub const fn textmode() -> Self {
        Self {
            request_timeout_us: 5_000,
            byte_delay_us: 1_000,
            post_tx_guard_us: 1_000,
        }
    }
}

impl Default for TimingProfile {
    fn default() -> Self {
        Self::binary()
    }
}

/// Byte offsets within the 45-byte GPS record.
///
/// Multi-byte fields are little-endian: the `_L` offset holds `value & 0xFF`
/// and the following `_H` offset holds `value >> 8`.
pub mod gps {
    /// Total record size including start/stop markers
    pub const MSG_LEN: usize = 45;

    pub const START: usize = 0; // always 0x7C
    pub const SENSOR_ID: usize = 1; // always 0x8A
    pub const WARNING_BEEPS: usize = 2;
    pub const SENSOR_TEXT_ID: usize = 3; // always 0xA0
    pub const ALARM_INVERS1: usize = 4;
    pub const ALARM_INVERS2: usize = 5;
    pub const FLIGHT_DIRECTION: usize = 6; // 2 degree steps
    pub const SPEED_L: usize = 7; // km/h
    pub const SPEED_H: usize = 8;
    pub const POS_NS: usize = 9; // north = 0, south = 1
    pub const POS_NS_DM_L: usize = 10; // degrees * 100 + minutes
    pub const POS_NS_DM_H: usize = 11;
    pub const POS_NS_SEC_L: usize = 12; // hundredths of a second
    pub const POS_NS_SEC_H: usize = 13;
    pub const POS_EW: usize = 14; // east = 0, west = 1
    pub const POS_EW_DM_L: usize = 15;
    pub const POS_EW_DM_H: usize = 16;
    pub const POS_EW_SEC_L: usize = 17;
    pub const POS_EW_SEC_H: usize = 18;
    pub const HOME_DISTANCE_L: usize = 19; // meters
    pub const HOME_DISTANCE_H: usize = 20;
    pub const ALTITUDE_L: usize = 21; // meters, 500 = 0m
    pub const ALTITUDE_H: usize = 22;
    pub const CLIMBRATE_L: usize = 23; // 0.01 m/s, 30000 = 0.00 m/s
    pub const CLIMBRATE_H: usize = 24;
    pub const CLIMBRATE3S: usize = 25; // m/3s, 120 = 0
    pub const SATELLITES: usize = 26;
    pub const FIX_CHAR: usize = 27; // '-', '2', '3' or 'D'
    pub const HOME_DIRECTION: usize = 28; // 2 degree steps
    pub const ANGLE_ROLL: usize = 29;
    pub const ANGLE_NICK: usize = 30;
    pub const ANGLE_COMPASS: usize = 31;
    pub const FLIPFLOP: usize = 32;
    pub const TIME_H: usize = 33;
    pub const TIME_M: usize = 34;
    pub const TIME_S: usize = 35;
    pub const TIME_SSS: usize = 36;
    pub const MSL_ALTITUDE_L: usize = 37;
    pub const MSL_ALTITUDE_H: usize = 38;
    pub const VIBRATION: usize = 39;
    pub const FREE_CHAR1: usize = 40;
    pub const FREE_CHAR2: usize = 41;
    pub const FREE_CHAR3: usize = 42;
    pub const VERSION: usize = 43;
    pub const STOP: usize = 44; // always 0x7D
}

/// Byte offsets within the 44-byte EAM (Electric Air Module) record.
pub mod eam {
    /// Total record size including start/stop markers
    pub const MSG_LEN: usize = 44;

    pub const START: usize = 0; // always 0x7C
    pub const SENSOR_ID: usize = 1; // always 0x8E
    pub const WARNING_BEEPS: usize = 2;
    pub const SENSOR_TEXT_ID: usize = 3; // always 0xE0
    pub const ALARM_INVERS1: usize = 4;
    pub const ALARM_INVERS2: usize = 5;
    pub const CELL1_L: usize = 6; // per-cell voltage, 0.02V steps
    pub const CELL7_L: usize = 12;
    pub const CELL1_H: usize = 13;
    pub const CELL7_H: usize = 19;
    pub const BATT1_VOLTAGE_L: usize = 20; // 0.1V steps
    pub const BATT1_VOLTAGE_H: usize = 21;
    pub const BATT2_VOLTAGE_L: usize = 22;
    pub const BATT2_VOLTAGE_H: usize = 23;
    pub const TEMP1: usize = 24; // 20 = 0 degrees C
    pub const TEMP2: usize = 25;
    pub const ALTITUDE_L: usize = 26; // meters, 500 = 0m
    pub const ALTITUDE_H: usize = 27;
    pub const CURRENT_L: usize = 28; // 0.1A steps
    pub const CURRENT_H: usize = 29;
    pub const MAIN_VOLTAGE_L: usize = 30; // 0.1V steps
    pub const MAIN_VOLTAGE_H: usize = 31;
    pub const BATT_CAP_L: usize = 32; // 10mAh steps
    pub const BATT_CAP_H: usize = 33;
    pub const CLIMBRATE_L: usize = 34; // 0.01 m/s, 30000 = 0.00 m/s
    pub const CLIMBRATE_H: usize = 35;
    pub const CLIMBRATE3S: usize = 36; // m/3s, 120 = 0
    pub const RPM_L: usize = 37; // 10 rpm steps
    pub const RPM_H: usize = 38;
    pub const ELECTRIC_MIN: usize = 39;
    pub const ELECTRIC_SEC: usize = 40;
    pub const SPEED_L: usize = 41; // km/h
    pub const SPEED_H: usize = 42;
    pub const STOP: usize = 43; // always 0x7D
}

/// Byte offsets within the 172-byte textmode record.
pub mod textmode {
    use super::{HOTT_TEXTMODE_DISPLAY_COLUMNS, HOTT_TEXTMODE_DISPLAY_ROWS};

    /// Total record size: start + esc + warning + 8x21 grid + stop
    pub const MSG_LEN: usize = 3 + HOTT_TEXTMODE_DISPLAY_ROWS * HOTT_TEXTMODE_DISPLAY_COLUMNS + 1;

    pub const START: usize = 0; // always 0x7B
    pub const ESC: usize = 1; // sensor text id, or 0x01 when leaving
    pub const WARNING: usize = 2;
    pub const GRID: usize = 3; // row-major 8x21 character cells
    pub const STOP: usize = MSG_LEN - 1; // always 0x7D
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_markers() {
        assert_eq!(HOTT_BINARY_MODE_REQUEST_ID, 0x80);
        assert_eq!(HOTT_BINARY_MODE_REQUEST_ID_ALT, 0x00);
        assert_eq!(HOTT_TEXT_MODE_REQUEST_ID, 0x7F);
        assert_eq!(HOTT_REQUEST_SIZE, 2);
    }

    #[test]
    fn test_sensor_addresses() {
        assert_eq!(HOTT_TELEMETRY_GPS_SENSOR_ID, 0x8A);
        assert_eq!(HOTT_TELEMETRY_EAM_SENSOR_ID, 0x8E);
        assert_eq!(HOTT_GPS_SENSOR_TEXT_ID, 0xA0);
        assert_eq!(HOTT_EAM_SENSOR_TEXT_ID, 0xE0);
    }

    #[test]
    fn test_record_markers() {
        assert_eq!(HOTT_START_BYTE, 0x7C);
        assert_eq!(HOTT_STOP_BYTE, 0x7D);
        assert_eq!(HOTT_TEXTMODE_START, 0x7B);
    }

    #[test]
    fn test_record_sizes() {
        assert_eq!(gps::MSG_LEN, 45);
        assert_eq!(eam::MSG_LEN, 44);
        assert_eq!(textmode::MSG_LEN, 172);
    }

    #[test]
    fn test_record_offsets_terminate_at_stop() {
        assert_eq!(gps::STOP, gps::MSG_LEN - 1);
        assert_eq!(eam::STOP, eam::MSG_LEN - 1);
        assert_eq!(textmode::STOP, textmode::MSG_LEN - 1);
    }

    #[test]
    fn test_binary_timing_profile() {
        let profile = TimingProfile::binary();
        assert_eq!(profile.request_timeout_us, 4_000);
        assert_eq!(profile.byte_delay_us, 2_000);
        assert_eq!(profile.post_tx_guard_us, 2_000);
        assert_eq!(TimingProfile::default(), profile);
    }

    #[test]
    fn test_textmode_timing_profile() {
        let profile = TimingProfile::textmode();
        assert_eq!(profile.request_timeout_us, 5_000);
        assert_eq!(profile.byte_delay_us, 1_000);
        assert_eq!(profile.post_tx_guard_us, 1_000);
    }

    #[test]
    fn test_textmode_grid_dimensions() {
        assert_eq!(HOTT_TEXTMODE_DISPLAY_ROWS, 8);
        assert_eq!(HOTT_TEXTMODE_DISPLAY_COLUMNS, 21);
        assert_eq!(textmode::GRID + 8 * 21, textmode::STOP);
    }
}
