//! JPEG marker definitions (ITU T.81 Table B.1).

/// JPEG marker types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum Marker {
    /// Start of Frame. Parameter is the SOF type (0-15).
    SOF(u8),
    /// Define Huffman Table.
    DHT,
    /// Define Arithmetic Coding conditioning.
    DAC,
    /// Restart marker (0-7).
    RST(u8),
    /// Start of Image.
    SOI,
    /// End of Image.
    EOI,
    /// Start of Scan.
    SOS,
    /// Define Quantization Table.
    DQT,
    /// Define Number of Lines.
    DNL,
    /// Define Restart Interval.
    DRI,
    /// Define Hierarchical Progression.
    DHP,
    /// Expand Reference Component.
    EXP,
    /// Application segment (0-15).
    APP(u8),
    /// Comment.
    COM,
    /// Temporary marker for arithmetic coding.
    TEM,
}

impl Marker {
    /// Returns true if this marker is followed by a length field.
    pub fn has_length(self) -> bool {
        !matches!(self, Marker::RST(..) | Marker::SOI | Marker::EOI | Marker::TEM)
    }

    /// Convert a byte to a Marker, if recognized.
    ///
    /// Returns None for 0x00 (stuffed byte), 0xFF (fill byte) and the
    /// reserved range; callers report those as unknown markers.
    pub fn from_u8(n: u8) -> Option<Marker> {
        use Marker::*;
        match n {
            0x01 => Some(TEM),
            0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => Some(SOF(n - 0xC0)),
            0xC4 => Some(DHT),
            0xCC => Some(DAC),
            0xD0..=0xD7 => Some(RST(n - 0xD0)),
            0xD8 => Some(SOI),
            0xD9 => Some(EOI),
            0xDA => Some(SOS),
            0xDB => Some(DQT),
            0xDC => Some(DNL),
            0xDD => Some(DRI),
            0xDE => Some(DHP),
            0xDF => Some(EXP),
            0xE0..=0xEF => Some(APP(n - 0xE0)),
            0xFE => Some(COM),
            _ => None,
        }
    }

    /// Convert the marker back to its byte representation.
    pub fn to_u8(self) -> u8 {
        use Marker::*;
        match self {
            TEM => 0x01,
            SOF(n) => 0xC0 + n,
            DHT => 0xC4,
            DAC => 0xCC,
            RST(n) => 0xD0 + n,
            SOI => 0xD8,
            EOI => 0xD9,
            SOS => 0xDA,
            DQT => 0xDB,
            DNL => 0xDC,
            DRI => 0xDD,
            DHP => 0xDE,
            EXP => 0xDF,
            APP(n) => 0xE0 + n,
            COM => 0xFE,
        }
    }
}
