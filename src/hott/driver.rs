//! # HoTT Protocol Driver
//!
//! The state machine that arbitrates the shared half-duplex wire.
//!
//! One wire carries both the receiver's polls and this driver's replies, so
//! correctness is all timing discipline: never start transmitting while the
//! line still belongs to the request, pace reply bytes so the receiver's
//! UART keeps up, and guard the end of a reply so the driver's own echo is
//! not mistaken for the next request. There are no framing delimiters
//! beyond fixed lengths and timeouts — any missed deadline or stray byte is
//! handled by flushing input and listening again, silently, because the
//! receiver's own retry is the protocol's only feedback channel.
//!
//! The driver is purely poll-driven: an external scheduler calls
//! [`HottDriver::poll`] with the current monotonic time in microseconds at
//! whatever cadence it likes, and no call ever blocks.

use tracing::{debug, trace};

use super::decoder::{classify_request, Request};
use super::encoder::{AlarmMonitor, EamRecord, GpsRecord, TextRecord};
use super::protocol::{
    self, TimingProfile, HOTT_REQUEST_SIZE, HOTT_TELEMETRY_EAM_SENSOR_ID,
    HOTT_TELEMETRY_GPS_SENSOR_ID, HOTT_TX_WINDOW_DELAY_US,
};
use super::textmode::{NullOverlay, OverlayHandler, TextmodeSession};
use crate::sensors::{classify_battery, SensorSource};
use crate::serial::port_trait::TelemetryPort;

/// Protocol state; exactly one is active at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    /// Listening for the first byte of a request
    WaitingForRequest,
    /// Collecting the 2-byte request header
    ReceivingRequest,
    /// Request accepted; waiting out the line turnaround before replying
    WaitingForTxWindow,
    /// Draining the response queue one paced byte at a time
    Transmitting,
    /// Guard period after the checksum byte; the driver's own echo is
    /// flushed before listening resumes
    EndingTransmission,
}

/// Which record a response was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Gps,
    Eam,
    Text,
}

/// What a single `poll` invocation did
///
/// Resynchronization is expected and frequent, so it is reported as a
/// value, never as an error: `None` dominates, and the variants exist for
/// observability (logging, exchange accounting), not for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvent {
    /// Nothing notable happened
    None,
    /// The request header did not complete in time; input was flushed
    RequestTimeout,
    /// The first request byte matched no known mode marker; input was
    /// flushed
    UnrecognizedRequest,
    /// Valid framing but no response is available (unknown address, or a
    /// required data source is absent)
    RequestRejected,
    /// A response record was populated and queued
    ResponseArmed(ResponseKind),
    /// A queued response was fully sent and the line released
    ExchangeComplete(ResponseKind),
}

/// Battery thresholds driving the periodic alarm check
#[derive(Debug, Clone, Copy)]
pub struct BatteryLimits {
    /// Warning threshold in 10mV units
    pub warning_voltage: u16,

    /// Critical threshold in 10mV units
    pub critical_voltage: u16,

    /// Minimum seconds between alarm tones
    pub alarm_interval_s: u32,
}

impl Default for BatteryLimits {
    fn default() -> Self {
        // 3S pack defaults: warn at 10.50V, critical at 9.90V
        Self {
            warning_voltage: 1050,
            critical_voltage: 990,
            alarm_interval_s: 5,
        }
    }
}

/// Single-slot holder for the response being drained
///
/// The slot does not own the bytes; it indexes into whichever record buffer
/// `source` names, so records can be rebuilt in place between exchanges
/// without copying.
#[derive(Debug, Default)]
struct ResponseQueue {
    source: Option<ResponseKind>,
    offset: usize,
    len: usize,
    checksum: u8,
}

/// The HoTT telemetry driver
///
/// Owns the transport, the sensor seam, all protocol state and the record
/// buffers. All mutation happens inside [`poll`](Self::poll); the external
/// scheduler must not call it reentrantly or concurrently, and nothing else
/// is required for thread safety.
pub struct HottDriver<P: TelemetryPort, S: SensorSource> {
    port: P,
    sensors: S,
    overlay: Box<dyn OverlayHandler + Send>,
    limits: BatteryLimits,

    timing: TimingProfile,
    state: ProtocolState,
    state_changed_at: u64,

    request: [u8; HOTT_REQUEST_SIZE],
    request_len: usize,

    queue: ResponseQueue,
    last_response: Option<ResponseKind>,
    last_byte_sent_at: u64,

    gps_record: GpsRecord,
    eam_record: EamRecord,
    text_record: TextRecord,
    textmode: TextmodeSession,
    alarm: AlarmMonitor,
}

impl<P: TelemetryPort, S: SensorSource> HottDriver<P, S> {
    /// Create a driver with default battery limits and no overlay attached
    pub fn new(port: P, sensors: S) -> Self {
        Self::with_limits(port, sensors, BatteryLimits::default())
    }

    /// Create a driver with explicit battery alarm thresholds
    pub fn with_limits(port: P, sensors: S, limits: BatteryLimits) -> Self {
        Self {
            port,
            sensors,
            overlay: Box::new(NullOverlay),
            alarm: AlarmMonitor::new(limits.alarm_interval_s),
            limits,
            timing: TimingProfile::binary(),
            state: ProtocolState::WaitingForRequest,
            state_changed_at: 0,
            request: [0; HOTT_REQUEST_SIZE],
            request_len: 0,
            queue: ResponseQueue::default(),
            last_response: None,
            last_byte_sent_at: 0,
            gps_record: GpsRecord::new(),
            eam_record: EamRecord::new(),
            text_record: TextRecord::new(),
            textmode: TextmodeSession::new(),
        }
    }

    /// Attach the external overlay (CMS menu) subsystem
    pub fn set_overlay(&mut self, overlay: Box<dyn OverlayHandler + Send>) {
        self.overlay = overlay;
    }

    /// Current protocol state
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Time of the last actual state change, in µs
    pub fn state_changed_at(&self) -> u64 {
        self.state_changed_at
    }

    /// Timing constants currently in force (binary or textmode profile)
    pub fn timing_profile(&self) -> TimingProfile {
        self.timing
    }

    /// Whether a textmode session is active
    pub fn textmode_is_alive(&self) -> bool {
        self.textmode.is_alive()
    }

    /// Write one character into the textmode display grid
    pub fn textmode_write_char(&mut self, column: u8, row: u8, c: u8) {
        self.text_record.write_char(column, row, c);
    }

    /// Overlay hook: a menu session is (re)claiming the display
    pub fn textmode_grab(&mut self) {
        self.text_record
            .set_esc(protocol::HOTT_EAM_SENSOR_TEXT_ID);
    }

    /// Overlay hook: the menu wants to close; the next textmode response
    /// carries the escape byte so the transmitter drops back to sensor
    /// pages
    pub fn textmode_exit(&mut self) {
        self.text_record.set_esc(protocol::HOTT_TEXTMODE_ESC);
    }

    /// Forget queued and pending state and return to listening
    ///
    /// Used when telemetry is disabled externally: afterwards no partially
    /// sent message is observable and the next poll starts from a clean
    /// listening state.
    pub fn reset(&mut self, now_us: u64) {
        self.queue = ResponseQueue::default();
        self.last_response = None;
        self.request_len = 0;
        self.flush_rx();
        self.switch_state(ProtocolState::WaitingForRequest, now_us);
    }

    /// Release the transport and sensor seam, dropping all protocol state
    pub fn into_parts(self) -> (P, S) {
        (self.port, self.sensors)
    }

    /// Advance the protocol; never blocks
    ///
    /// A single invocation cascades through every transition that does not
    /// depend on elapsed time (a completed request is decoded and armed in
    /// the same call), while time-gated transitions wait for a later
    /// invocation with a later timestamp. `now_us` must come from a
    /// monotonic clock.
    pub fn poll(&mut self, now_us: u64) -> PollEvent {
        let mut event = PollEvent::None;
        let mut reprocess = true;

        while reprocess {
            reprocess = false;

            match self.state {
                ProtocolState::WaitingForRequest => {
                    if self.port.bytes_waiting() > 0 {
                        self.request_len = 0;
                        self.switch_state(ProtocolState::ReceivingRequest, now_us);
                        reprocess = true;
                    }
                }

                ProtocolState::ReceivingRequest => {
                    if self.elapsed(now_us) >= self.timing.request_timeout_us {
                        // Waited too long for the header - resync
                        debug!(
                            received = self.request_len,
                            "request timed out, resynchronizing"
                        );
                        self.flush_rx();
                        self.switch_state(ProtocolState::WaitingForRequest, now_us);
                        event = PollEvent::RequestTimeout;
                    } else {
                        while self.port.bytes_waiting() > 0 && self.request_len < HOTT_REQUEST_SIZE
                        {
                            match self.port.read_byte() {
                                Some(byte) => {
                                    self.request[self.request_len] = byte;
                                    self.request_len += 1;
                                }
                                None => break,
                            }
                        }

                        if self.request_len >= HOTT_REQUEST_SIZE {
                            event = self.process_request(now_us);
                            reprocess = true;
                        }
                    }
                }

                ProtocolState::WaitingForTxWindow => {
                    if self.elapsed(now_us) >= HOTT_TX_WINDOW_DELAY_US {
                        self.queue.checksum = 0;
                        self.switch_state(ProtocolState::Transmitting, now_us);
                    }
                }

                ProtocolState::Transmitting => {
                    if self.send_response_byte(now_us) {
                        self.switch_state(ProtocolState::EndingTransmission, now_us);
                    }
                }

                ProtocolState::EndingTransmission => {
                    if self.elapsed(now_us) >= self.timing.post_tx_guard_us {
                        // Whatever arrived while transmitting is our own echo
                        self.flush_rx();
                        self.switch_state(ProtocolState::WaitingForRequest, now_us);
                        if let Some(kind) = self.last_response.take() {
                            event = PollEvent::ExchangeComplete(kind);
                        }
                        reprocess = true;
                    }
                }
            }
        }

        event
    }

    fn elapsed(&self, now_us: u64) -> u64 {
        now_us.saturating_sub(self.state_changed_at)
    }

    fn switch_state(&mut self, new_state: ProtocolState, now_us: u64) {
        if self.state != new_state {
            trace!(from = ?self.state, to = ?new_state, at_us = now_us, "state change");
            self.state = new_state;
            self.state_changed_at = now_us;
        }
    }

    fn flush_rx(&mut self) {
        while self.port.bytes_waiting() > 0 {
            if self.port.read_byte().is_none() {
                break;
            }
        }
    }

    /// Decode the completed 2-byte header and arm a response if possible
    fn process_request(&mut self, now_us: u64) -> PollEvent {
        match classify_request(&self.request) {
            Request::Binary { address } => {
                if self.textmode.alive {
                    // Binary polls mean the transmitter left the menu
                    self.timing = TimingProfile::binary();
                    self.textmode.alive = false;
                    debug!("textmode session ended");
                }

                match self.arm_binary_response(address, now_us) {
                    Some(kind) => {
                        self.switch_state(ProtocolState::WaitingForTxWindow, now_us);
                        PollEvent::ResponseArmed(kind)
                    }
                    None => {
                        debug!(address, "no response for address");
                        self.switch_state(ProtocolState::WaitingForRequest, now_us);
                        PollEvent::RequestRejected
                    }
                }
            }

            Request::Text { command } => {
                if !self.textmode.alive {
                    self.timing = TimingProfile::textmode();
                    self.textmode.alive = true;
                    debug!("textmode session started");
                }

                if self
                    .textmode
                    .process_request(command, &mut self.text_record, self.overlay.as_mut())
                {
                    self.arm(ResponseKind::Text);
                    self.switch_state(ProtocolState::WaitingForTxWindow, now_us);
                    PollEvent::ResponseArmed(ResponseKind::Text)
                } else {
                    self.switch_state(ProtocolState::WaitingForRequest, now_us);
                    PollEvent::RequestRejected
                }
            }

            Request::Unrecognized => {
                // Received garbage - resync
                debug!(
                    header = ?self.request,
                    "unrecognized request marker, resynchronizing"
                );
                self.flush_rx();
                self.switch_state(ProtocolState::WaitingForRequest, now_us);
                PollEvent::UnrecognizedRequest
            }
        }
    }

    /// Populate and queue the record for a binary sensor address
    fn arm_binary_response(&mut self, address: u8, now_us: u64) -> Option<ResponseKind> {
        match address {
            HOTT_TELEMETRY_GPS_SENSOR_ID => {
                if !self.sensors.has_gps() {
                    return None;
                }
                self.gps_record.prepare(&self.sensors);
                self.arm(ResponseKind::Gps);
                Some(ResponseKind::Gps)
            }

            HOTT_TELEMETRY_EAM_SENSOR_ID => {
                let battery_state = classify_battery(
                    self.sensors.battery_voltage(),
                    self.limits.warning_voltage,
                    self.limits.critical_voltage,
                );
                self.eam_record
                    .prepare(&self.sensors, &mut self.alarm, battery_state, now_us / 1000);
                self.arm(ResponseKind::Eam);
                Some(ResponseKind::Eam)
            }

            _ => None,
        }
    }

    fn arm(&mut self, kind: ResponseKind) {
        debug_assert!(
            self.queue.source.is_none(),
            "armed a response while one is still draining"
        );
        self.queue = ResponseQueue {
            source: Some(kind),
            offset: 0,
            len: response_len(kind),
            checksum: 0,
        };
        self.last_response = Some(kind);
    }

    /// Send at most one response byte, honoring the inter-byte delay
    ///
    /// Returns `true` once the checksum byte has gone out and the queue is
    /// drained.
    fn send_response_byte(&mut self, now_us: u64) -> bool {
        // Guard intra-byte interval
        if now_us.saturating_sub(self.last_byte_sent_at) < self.timing.byte_delay_us {
            return false;
        }

        let Some(kind) = self.queue.source else {
            return true;
        };

        if self.queue.offset >= self.queue.len {
            // Payload exhausted: the checksum byte ends the transmission
            let checksum = self.queue.checksum;
            self.write_byte(checksum, now_us);
            self.queue = ResponseQueue::default();
            return true;
        }

        let byte = match kind {
            ResponseKind::Gps => self.gps_record.as_bytes()[self.queue.offset],
            ResponseKind::Eam => self.eam_record.as_bytes()[self.queue.offset],
            ResponseKind::Text => self.text_record.as_bytes()[self.queue.offset],
        };
        self.queue.checksum = self.queue.checksum.wrapping_add(byte);
        self.queue.offset += 1;
        self.write_byte(byte, now_us);
        false
    }

    fn write_byte(&mut self, byte: u8, now_us: u64) {
        // Transport-level failures are the transport's to report; the
        // exchange advances regardless and the receiver's checksum guards
        // integrity.
        if let Err(error) = self.port.write_byte(byte) {
            debug!(%error, "serial write failed");
        }
        self.last_byte_sent_at = now_us;
    }
}

fn response_len(kind: ResponseKind) -> usize {
    match kind {
        ResponseKind::Gps => protocol::gps::MSG_LEN,
        ResponseKind::Eam => protocol::eam::MSG_LEN,
        ResponseKind::Text => protocol::textmode::MSG_LEN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hott::checksum::additive_checksum;
    use crate::hott::encoder::read_u16;
    use crate::hott::protocol::{eam, gps};
    use crate::sensors::{GpsFixType, GpsSolution, MockSensorSource};
    use crate::serial::port_trait::mocks::MockPort;

    fn fix_3d_solution() -> GpsSolution {
        GpsSolution {
            fix_type: GpsFixType::Fix3D,
            num_sat: 10,
            lat: 481_234_560,
            lon: 116_543_210,
            ground_speed: 1000,
            heading: 90,
            altitude: 12_000,
            distance_to_home: 120,
            direction_to_home: 45,
        }
    }

    fn no_fix_solution() -> GpsSolution {
        GpsSolution {
            fix_type: GpsFixType::NoFix,
            num_sat: 0,
            lat: 0,
            lon: 0,
            ground_speed: 0,
            heading: 0,
            altitude: 0,
            distance_to_home: 0,
            direction_to_home: 0,
        }
    }

    fn stub_sensors(has_gps: bool) -> MockSensorSource {
        let mut sensors = MockSensorSource::new();
        sensors.expect_battery_voltage().return_const(1150u16);
        sensors.expect_amperage().return_const(250i32);
        sensors.expect_mah_drawn().return_const(400i32);
        sensors.expect_estimated_altitude().return_const(2500i32);
        sensors.expect_estimated_vario().return_const(0i32);
        sensors.expect_has_gps().return_const(has_gps);
        sensors
            .expect_gps_solution()
            .return_const(if has_gps { fix_3d_solution() } else { no_fix_solution() });
        sensors
    }

    fn test_driver(has_gps: bool) -> (HottDriver<MockPort, MockSensorSource>, MockPort) {
        let port = MockPort::new();
        let driver = HottDriver::new(port.clone(), stub_sensors(has_gps));
        (driver, port)
    }

    /// Poll at 500µs steps until the exchange completes, returning the
    /// completion event and the time it happened at
    fn run_until_complete(
        driver: &mut HottDriver<MockPort, MockSensorSource>,
        mut now_us: u64,
    ) -> (PollEvent, u64) {
        let deadline = now_us + 2_000_000;
        while now_us < deadline {
            let event = driver.poll(now_us);
            if matches!(event, PollEvent::ExchangeComplete(_)) {
                return (event, now_us);
            }
            now_us += 500;
        }
        panic!("exchange never completed");
    }

    #[test]
    fn test_eam_exchange_end_to_end() {
        let (mut driver, port) = test_driver(false);

        port.push_rx(&[0x80, 0x8E]);
        let event = driver.poll(0);

        // The full request cascades to the transmit window in one poll
        assert_eq!(event, PollEvent::ResponseArmed(ResponseKind::Eam));
        assert_eq!(driver.state(), ProtocolState::WaitingForTxWindow);

        let (event, _) = run_until_complete(&mut driver, 500);
        assert_eq!(event, PollEvent::ExchangeComplete(ResponseKind::Eam));
        assert_eq!(driver.state(), ProtocolState::WaitingForRequest);

        let written = port.written_data();
        assert_eq!(written.len(), eam::MSG_LEN + 1);

        let (payload, checksum) = written.split_at(eam::MSG_LEN);
        assert_eq!(payload[eam::START], 0x7C);
        assert_eq!(payload[eam::SENSOR_ID], 0x8E);
        assert_eq!(payload[eam::STOP], 0x7D);
        // 1150 (10mV units) → 115 deciVolt on the wire
        assert_eq!(read_u16(payload, eam::MAIN_VOLTAGE_L), 115);
        // The trailing byte is the additive checksum of the payload,
        // markers included
        assert_eq!(checksum[0], additive_checksum(payload));
    }

    #[test]
    fn test_gps_exchange_with_fix() {
        let (mut driver, port) = test_driver(true);

        port.push_rx(&[0x80, 0x8A]);
        assert_eq!(driver.poll(0), PollEvent::ResponseArmed(ResponseKind::Gps));

        let (event, _) = run_until_complete(&mut driver, 500);
        assert_eq!(event, PollEvent::ExchangeComplete(ResponseKind::Gps));

        let written = port.written_data();
        assert_eq!(written.len(), gps::MSG_LEN + 1);

        let (payload, checksum) = written.split_at(gps::MSG_LEN);
        assert_eq!(payload[gps::FIX_CHAR], b'3');
        assert_eq!(payload[gps::POS_NS], 0);
        assert_eq!(payload[gps::POS_EW], 0);
        assert_eq!(read_u16(payload, gps::POS_NS_DM_L), 48 * 100 + 7);
        assert_eq!(read_u16(payload, gps::POS_EW_DM_L), 11 * 100 + 39);
        assert_eq!(checksum[0], additive_checksum(payload));
    }

    #[test]
    fn test_gps_request_without_sensor_is_rejected() {
        let (mut driver, port) = test_driver(false);

        port.push_rx(&[0x80, 0x8A]);
        let event = driver.poll(0);

        assert_eq!(event, PollEvent::RequestRejected);
        assert_eq!(driver.state(), ProtocolState::WaitingForRequest);

        // Nothing goes out even after the transmit window would have opened
        for step in 1..40u64 {
            driver.poll(step * 500);
        }
        assert!(port.written_data().is_empty());
    }

    #[test]
    fn test_unknown_address_is_rejected() {
        let (mut driver, port) = test_driver(false);

        port.push_rx(&[0x80, 0x77]);
        assert_eq!(driver.poll(0), PollEvent::RequestRejected);
        assert_eq!(driver.state(), ProtocolState::WaitingForRequest);
        assert!(port.written_data().is_empty());
    }

    #[test]
    fn test_binary_marker_with_dropped_upper_bit() {
        let (mut driver, port) = test_driver(false);

        port.push_rx(&[0x00, 0x8E]);
        assert_eq!(driver.poll(0), PollEvent::ResponseArmed(ResponseKind::Eam));
    }

    #[test]
    fn test_garbage_marker_flushes_and_resyncs() {
        let (mut driver, port) = test_driver(false);

        port.push_rx(&[0x55, 0x8E, 0x12, 0x34]);
        let event = driver.poll(0);

        assert_eq!(event, PollEvent::UnrecognizedRequest);
        assert_eq!(driver.state(), ProtocolState::WaitingForRequest);
        // The trailing junk was flushed along with the header
        assert_eq!(port.rx_len(), 0);
        assert!(port.written_data().is_empty());
    }

    #[test]
    fn test_partial_request_times_out() {
        let (mut driver, port) = test_driver(false);

        port.push_rx(&[0x80]);
        driver.poll(0);
        assert_eq!(driver.state(), ProtocolState::ReceivingRequest);

        // 4100µs later the 4000µs request timeout has expired
        let event = driver.poll(4_100);
        assert_eq!(event, PollEvent::RequestTimeout);
        assert_eq!(driver.state(), ProtocolState::WaitingForRequest);

        // The stale byte is gone: a fresh full request still decodes
        port.push_rx(&[0x80, 0x8E]);
        assert_eq!(
            driver.poll(5_000),
            PollEvent::ResponseArmed(ResponseKind::Eam)
        );
    }

    #[test]
    fn test_request_split_across_polls() {
        let (mut driver, port) = test_driver(false);

        port.push_rx(&[0x80]);
        driver.poll(0);
        assert_eq!(driver.state(), ProtocolState::ReceivingRequest);

        // Second byte arrives inside the timeout window
        port.push_rx(&[0x8E]);
        let event = driver.poll(2_000);
        assert_eq!(event, PollEvent::ResponseArmed(ResponseKind::Eam));
    }

    #[test]
    fn test_transmit_window_is_honored() {
        let (mut driver, port) = test_driver(false);

        port.push_rx(&[0x80, 0x8E]);
        driver.poll(0);
        assert_eq!(driver.state(), ProtocolState::WaitingForTxWindow);

        // 4999µs after the request: still silent
        driver.poll(4_999);
        assert_eq!(driver.state(), ProtocolState::WaitingForTxWindow);
        assert!(port.written_data().is_empty());

        // At 5000µs the window opens
        driver.poll(5_000);
        assert_eq!(driver.state(), ProtocolState::Transmitting);
    }

    #[test]
    fn test_byte_pacing_enforces_minimum_delay() {
        let (mut driver, port) = test_driver(false);

        port.push_rx(&[0x80, 0x8E]);
        driver.poll(0);
        driver.poll(5_000); // window opens
        driver.poll(5_000); // first byte
        assert_eq!(port.written_data().len(), 1);

        // 1999µs after the first byte: nothing may go out
        driver.poll(6_999);
        assert_eq!(port.written_data().len(), 1);

        // At exactly the inter-byte delay the next byte is sent
        driver.poll(7_000);
        assert_eq!(port.written_data().len(), 2);

        // One invocation per byte: payload plus checksum
        let mut now = 7_000;
        let mut sends = 2;
        while driver.state() == ProtocolState::Transmitting {
            now += 2_000;
            driver.poll(now);
            sends += 1;
        }
        assert_eq!(sends, eam::MSG_LEN + 1);
        assert_eq!(port.written_data().len(), eam::MSG_LEN + 1);
    }

    #[test]
    fn test_echo_is_flushed_after_transmission() {
        let (mut driver, port) = test_driver(false);

        port.push_rx(&[0x80, 0x8E]);
        let mut now = 0;
        while driver.state() != ProtocolState::EndingTransmission {
            driver.poll(now);
            now += 500;
            assert!(now < 2_000_000, "transmission never finished");
        }

        // Everything we transmitted loops back on the single wire
        port.push_rx(&port.written_data());
        assert!(port.rx_len() > 0);

        let (event, _) = run_until_complete(&mut driver, now);
        assert!(matches!(event, PollEvent::ExchangeComplete(_)));
        assert_eq!(driver.state(), ProtocolState::WaitingForRequest);
        assert_eq!(port.rx_len(), 0, "echo must not survive the guard period");
    }

    #[test]
    fn test_state_timestamp_only_updates_on_change() {
        let (mut driver, port) = test_driver(false);

        assert_eq!(driver.state_changed_at(), 0);
        driver.poll(1_000);
        driver.poll(2_000);
        // No input: re-observing the same state never touches the timestamp
        assert_eq!(driver.state_changed_at(), 0);

        port.push_rx(&[0x80]);
        driver.poll(3_000);
        assert_eq!(driver.state(), ProtocolState::ReceivingRequest);
        assert_eq!(driver.state_changed_at(), 3_000);
    }

    #[test]
    fn test_textmode_request_starts_session_and_swaps_profile() {
        let (mut driver, port) = test_driver(false);
        assert_eq!(driver.timing_profile(), TimingProfile::binary());

        port.push_rx(&[0x7F, 0xE0]);
        let event = driver.poll(0);

        assert_eq!(event, PollEvent::ResponseArmed(ResponseKind::Text));
        assert!(driver.textmode_is_alive());
        assert_eq!(driver.timing_profile(), TimingProfile::textmode());

        let (event, _) = run_until_complete(&mut driver, 500);
        assert_eq!(event, PollEvent::ExchangeComplete(ResponseKind::Text));

        let written = port.written_data();
        assert_eq!(written.len(), protocol::textmode::MSG_LEN + 1);
        assert_eq!(written[0], protocol::HOTT_TEXTMODE_START);
        assert_eq!(
            written[protocol::textmode::MSG_LEN - 1],
            protocol::HOTT_STOP_BYTE
        );
        assert_eq!(
            written[protocol::textmode::MSG_LEN],
            additive_checksum(&written[..protocol::textmode::MSG_LEN])
        );
    }

    #[test]
    fn test_textmode_wrong_class_answers_nothing_but_starts_session() {
        let (mut driver, port) = test_driver(false);

        // Text marker with a GPS-class command: no response from this
        // module, but the transmitter is in the menu now
        port.push_rx(&[0x7F, 0xA1]);
        let event = driver.poll(0);

        assert_eq!(event, PollEvent::RequestRejected);
        assert!(driver.textmode_is_alive());
        assert_eq!(driver.timing_profile(), TimingProfile::textmode());
        assert_eq!(driver.state(), ProtocolState::WaitingForRequest);
    }

    #[test]
    fn test_binary_request_ends_textmode_session() {
        let (mut driver, port) = test_driver(false);

        port.push_rx(&[0x7F, 0xE0]);
        driver.poll(0);
        run_until_complete(&mut driver, 500);
        assert!(driver.textmode_is_alive());

        port.push_rx(&[0x80, 0x8E]);
        let event = driver.poll(1_000_000);

        assert_eq!(event, PollEvent::ResponseArmed(ResponseKind::Eam));
        assert!(!driver.textmode_is_alive());
        assert_eq!(driver.timing_profile(), TimingProfile::binary());
    }

    #[test]
    fn test_textmode_chars_appear_in_response() {
        let (mut driver, port) = test_driver(false);

        driver.textmode_write_char(0, 0, b'M');
        driver.textmode_write_char(1, 0, b'E');

        port.push_rx(&[0x7F, 0xE0]);
        driver.poll(0);
        run_until_complete(&mut driver, 500);

        let written = port.written_data();
        assert_eq!(written[protocol::textmode::GRID], b'M');
        assert_eq!(written[protocol::textmode::GRID + 1], b'E');
    }

    #[test]
    fn test_reset_forgets_pending_exchange() {
        let (mut driver, port) = test_driver(false);

        port.push_rx(&[0x80, 0x8E]);
        driver.poll(0);
        driver.poll(5_000);
        driver.poll(5_000);
        assert_eq!(port.written_data().len(), 1);

        driver.reset(6_000);
        assert_eq!(driver.state(), ProtocolState::WaitingForRequest);

        // The half-sent response is gone for good
        for step in 0..50u64 {
            driver.poll(6_000 + step * 2_000);
        }
        assert_eq!(port.written_data().len(), 1);
    }

    #[test]
    fn test_consecutive_exchanges_reuse_record_buffer() {
        let (mut driver, port) = test_driver(false);

        port.push_rx(&[0x80, 0x8E]);
        driver.poll(0);
        let (_, end) = run_until_complete(&mut driver, 500);
        let first = port.written_data();

        port.clear_written();
        port.push_rx(&[0x80, 0x8E]);
        driver.poll(end + 1_000);
        run_until_complete(&mut driver, end + 1_500);
        let second = port.written_data();

        // Unchanged sensor inputs produce a byte-identical response
        assert_eq!(first, second);
    }
}
