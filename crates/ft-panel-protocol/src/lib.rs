//! CPU↔panel MCU protocol: fixed-width records and the boot handshake.
//!
//! The panel MCU (a separate microcontroller driving the front-panel
//! buttons, encoders, knobs, and the touch strip) talks to the CPU over a
//! UART using fixed 5-byte records rather than the framed, variable-length
//! protocol used for the CPU↔DSP link — there is no payload-length byte
//! because every record is the same size.

#![cfg_attr(not(test), no_std)]

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn button_record_roundtrips() {
        let record = PanelRecord { category: PanelCategory::Button, data: [1, 0, 0, 0] };
        let bytes = record.to_bytes();
        assert_eq!(PanelRecord::from_bytes(bytes), Some(record));
    }

    #[test]
    fn unknown_category_byte_is_rejected() {
        assert_eq!(PanelRecord::from_bytes([0xff, 0, 0, 0, 0]), None);
    }

    #[test]
    fn init_record_matches_the_handshake_trigger() {
        assert_eq!(PANEL_INIT_RECORD, [0x80, 0, 0, 0, 0]);
    }

    #[test]
    fn handshake_blocks_until_ack_record_observed() {
        let mut hs = PanelHandshake::new();
        assert!(!hs.is_ready());
        hs.on_record(&PanelRecord { category: PanelCategory::Button, data: [0; 4] });
        assert!(!hs.is_ready(), "non-ACK records must not complete the handshake");
        hs.on_record(&PanelRecord { category: PanelCategory::Ack, data: [0; 4] });
        assert!(hs.is_ready());
    }

    #[test]
    fn all_eight_categories_round_trip() {
        let categories = [
            PanelCategory::Button,
            PanelCategory::Encoder,
            PanelCategory::Knob,
            PanelCategory::Trigger,
            PanelCategory::XyPad,
            PanelCategory::Ack,
            PanelCategory::ButtonsLsw,
            PanelCategory::ButtonsMsw,
        ];
        for category in categories {
            let record = PanelRecord { category, data: [9, 8, 7, 6] };
            assert_eq!(PanelRecord::from_bytes(record.to_bytes()), Some(record));
        }
    }
}

// ─── Public types ───────────────────────────────────────────────────────────

/// Record sent by the CPU to request the panel MCU begin streaming input
/// events. The panel MCU replies with a single [`PanelCategory::Ack`] record
/// once it has finished its own initialisation.
pub const PANEL_INIT_RECORD: [u8; 5] = [0x80, 0, 0, 0, 0];

/// Category tag for a panel record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PanelCategory {
    /// Momentary button press/release.
    Button,
    /// Rotary encoder detent movement.
    Encoder,
    /// Continuous knob position.
    Knob,
    /// Pad trigger (velocity-sensitive).
    Trigger,
    /// XY touch pad position.
    XyPad,
    /// Acknowledgement of the init handshake.
    Ack,
    /// Bitmask of held buttons, least-significant word.
    ButtonsLsw,
    /// Bitmask of held buttons, most-significant word.
    ButtonsMsw,
}

impl PanelCategory {
    const fn to_byte(self) -> u8 {
        match self {
            PanelCategory::Button => 0,
            PanelCategory::Encoder => 1,
            PanelCategory::Knob => 2,
            PanelCategory::Trigger => 3,
            PanelCategory::XyPad => 4,
            PanelCategory::Ack => 5,
            PanelCategory::ButtonsLsw => 6,
            PanelCategory::ButtonsMsw => 7,
        }
    }

    const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(PanelCategory::Button),
            1 => Some(PanelCategory::Encoder),
            2 => Some(PanelCategory::Knob),
            3 => Some(PanelCategory::Trigger),
            4 => Some(PanelCategory::XyPad),
            5 => Some(PanelCategory::Ack),
            6 => Some(PanelCategory::ButtonsLsw),
            7 => Some(PanelCategory::ButtonsMsw),
            _ => None,
        }
    }
}

/// A fixed 5-byte panel record: one category byte followed by four data
/// bytes (interpretation depends on the category — e.g. button index +
/// pressed flag, or a little-endian knob position).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelRecord {
    /// What kind of input this record carries.
    pub category: PanelCategory,
    /// Category-specific payload.
    pub data: [u8; 4],
}

impl PanelRecord {
    /// Serialises this record to its wire form.
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; 5] {
        let [a, b, c, d] = self.data;
        [self.category.to_byte(), a, b, c, d]
    }

    /// Parses a record from its wire form, or `None` if the category byte is
    /// not one of the eight known categories.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 5]) -> Option<Self> {
        let [cat, a, b, c, d] = bytes;
        match PanelCategory::from_byte(cat) {
            Some(category) => Some(Self { category, data: [a, b, c, d] }),
            None => None,
        }
    }
}

/// Tracks the CPU-side init handshake with the panel MCU: send
/// [`PANEL_INIT_RECORD`], then block further panel-dependent startup until a
/// [`PanelCategory::Ack`] record is observed.
#[derive(Debug, Default)]
pub struct PanelHandshake {
    ready: bool,
}

impl PanelHandshake {
    /// Creates a handshake tracker in the not-yet-ready state.
    #[must_use]
    pub const fn new() -> Self {
        Self { ready: false }
    }

    /// Feeds an observed record. Transitions to ready on the first `Ack`.
    pub fn on_record(&mut self, record: &PanelRecord) {
        if record.category == PanelCategory::Ack {
            self.ready = true;
        }
    }

    /// True once the panel MCU has acknowledged init.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }
}
