//! # HoTT Additive Checksum
//!
//! HoTT frames a record with a single checksum byte: the 8-bit truncated sum
//! of every record byte, start and stop markers included. The transmitter
//! accumulates the sum byte-by-byte as it sends; this module provides the
//! whole-buffer form used to seed expectations in tests and to validate
//! captured frames.

/// Calculate the additive checksum over a complete record
///
/// # Arguments
///
/// * `data` - Record bytes (start marker through stop marker)
///
/// # Returns
///
/// * `u8` - Wrap-on-overflow sum of all bytes
///
/// # Examples
///
/// ```
/// use hott_link::hott::checksum::additive_checksum;
///
/// assert_eq!(additive_checksum(&[0x7C, 0x01, 0x7D]), 0xFA);
/// ```
pub fn additive_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte))
}
