//! # HoTT Request Decoder
//!
//! Classifies the 2-byte poll a receiver sends before a telemetry exchange:
//! a mode marker followed by a sensor address (binary mode) or a menu key
//! command (text mode).

use super::protocol::*;

/// A classified request header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Binary sensor poll; the payload is the requested module address
    Binary { address: u8 },

    /// Textmode (CMS overlay) poll; the payload is the raw command byte
    /// (sensor class in the top nibble, key code in the bottom nibble)
    Text { command: u8 },

    /// Neither marker matched; the line carried garbage or a mid-frame byte
    Unrecognized,
}

/// Classify a complete 2-byte request header
///
/// The first byte of a HoTT request is only ever 0x80 (binary mode) or
/// 0x7F (text mode) on the wire, but the receiver hardware loses the upper
/// bit of the binary marker often enough that it arrives as 0x00. Both
/// values are accepted as binary mode; with 0x7F as the only other valid
/// marker the coalescing is unambiguous, and decoding strictly would drop
/// most real-world binary polls.
pub fn classify_request(header: &[u8; HOTT_REQUEST_SIZE]) -> Request {
    match header[0] {
        HOTT_BINARY_MODE_REQUEST_ID_ALT | HOTT_BINARY_MODE_REQUEST_ID => {
            Request::Binary { address: header[1] }
        }
        HOTT_TEXT_MODE_REQUEST_ID => Request::Text { command: header[1] },
        _ => Request::Unrecognized,
    }
}

/// Extract the key code from a textmode command byte, if the command
/// addresses this sensor class
///
/// # Arguments
///
/// * `command` - Raw second byte of a text request
///
/// # Returns
///
/// * `Option<u8>` - Bottom-nibble key code when the top nibble matches the
///   EAM sensor class, `None` otherwise
pub fn textmode_key(command: u8) -> Option<u8> {
    if command & 0xF0 != HOTT_EAM_SENSOR_TEXT_ID {
        return None;
    }
    Some(command & 0x0F)
}
