//! Trait abstraction for serial port operations to enable testing
//!
//! The protocol core is synchronous and poll-driven (byte pacing happens at
//! the microsecond level inside the driver), so the seam is a plain
//! non-blocking byte interface rather than an async stream.

use std::io;

/// Non-blocking byte I/O on the half-duplex telemetry line
pub trait TelemetryPort: Send {
    /// Number of received bytes waiting to be read
    fn bytes_waiting(&mut self) -> usize;

    /// Read one byte; `None` when nothing is available or the read failed
    fn read_byte(&mut self) -> Option<u8>;

    /// Write one byte
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;
}
