//! # Textmode Overlay Hooks
//!
//! HoTT transmitters can flip a sensor into textmode: a slower flavor of
//! the protocol that carries an 8x21 character menu grid instead of binary
//! sensor records. The menu itself (a CMS-style settings UI) lives outside
//! this crate; the driver only owns the session handshake, the timing
//! profile swap, and the character grid record. Everything else crosses
//! the [`OverlayHandler`] seam.

use super::decoder;
use super::encoder::TextRecord;
use super::protocol::{HOTT_EAM_SENSOR_TEXT_ID, HOTT_TEXTMODE_ESC};

/// Callbacks into the external menu/overlay subsystem
pub trait OverlayHandler {
    /// A textmode exchange is about to be answered and the menu is not in
    /// the middle of closing; the overlay should ensure its screen is open
    fn on_session_open(&mut self);

    /// A key code arrived with the request; `leaving` is set while the
    /// escape handshake is in flight
    fn on_key(&mut self, key: u8, leaving: bool);
}

/// Handler used when no overlay subsystem is attached
#[derive(Debug, Default)]
pub struct NullOverlay;

impl OverlayHandler for NullOverlay {
    fn on_session_open(&mut self) {}

    fn on_key(&mut self, _key: u8, _leaving: bool) {}
}

/// Driver-side textmode session state
///
/// `alive` tracks whether the transmitter is currently polling in textmode
/// (the driver swaps timing profiles on the transitions). The escape
/// handshake needs one extra response cycle: the record goes out carrying
/// the escape byte once, and the sensor id is restored on the following
/// request.
#[derive(Debug, Default)]
pub struct TextmodeSession {
    pub(crate) alive: bool,
    restore_esc: bool,
}

impl TextmodeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the transmitter is currently polling in textmode
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Handle a textmode command byte against the grid record
    ///
    /// Returns `true` when the record should be queued as the response,
    /// `false` when the command addresses a different sensor class.
    pub(crate) fn process_request(
        &mut self,
        command: u8,
        record: &mut TextRecord,
        handler: &mut dyn OverlayHandler,
    ) -> bool {
        let Some(key) = decoder::textmode_key(command) else {
            return false;
        };

        if self.restore_esc {
            record.set_esc(HOTT_EAM_SENSOR_TEXT_ID);
            self.restore_esc = false;
        }

        if record.esc() != HOTT_TEXTMODE_ESC {
            handler.on_session_open();
        } else {
            // Let the escape byte go out once before restoring the id
            self.restore_esc = true;
        }

        handler.on_key(key, record.esc() == HOTT_TEXTMODE_ESC);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingOverlay {
        opens: usize,
        keys: Vec<(u8, bool)>,
    }

    impl OverlayHandler for RecordingOverlay {
        fn on_session_open(&mut self) {
            self.opens += 1;
        }

        fn on_key(&mut self, key: u8, leaving: bool) {
            self.keys.push((key, leaving));
        }
    }

    #[test]
    fn test_wrong_sensor_class_is_rejected() {
        let mut session = TextmodeSession::new();
        let mut record = TextRecord::new();
        let mut overlay = RecordingOverlay::default();

        assert!(!session.process_request(0xA3, &mut record, &mut overlay));
        assert_eq!(overlay.opens, 0);
        assert!(overlay.keys.is_empty());
    }

    #[test]
    fn test_request_opens_session_and_forwards_key() {
        let mut session = TextmodeSession::new();
        let mut record = TextRecord::new();
        let mut overlay = RecordingOverlay::default();

        assert!(session.process_request(0xE5, &mut record, &mut overlay));
        assert_eq!(overlay.opens, 1);
        assert_eq!(overlay.keys, vec![(5, false)]);
    }

    #[test]
    fn test_escape_handshake_takes_one_extra_cycle() {
        let mut session = TextmodeSession::new();
        let mut record = TextRecord::new();
        let mut overlay = RecordingOverlay::default();

        // The menu asked to leave: the record carries the escape byte
        record.set_esc(HOTT_TEXTMODE_ESC);

        // This exchange still answers, with the escape byte on the wire
        assert!(session.process_request(0xE0, &mut record, &mut overlay));
        assert_eq!(record.esc(), HOTT_TEXTMODE_ESC);
        assert_eq!(overlay.keys, vec![(0, true)]);
        assert_eq!(overlay.opens, 0);

        // The next request restores the sensor id and reopens normally
        assert!(session.process_request(0xE0, &mut record, &mut overlay));
        assert_eq!(record.esc(), HOTT_EAM_SENSOR_TEXT_ID);
        assert_eq!(overlay.opens, 1);
        assert_eq!(overlay.keys.last(), Some(&(0, false)));
    }
}
