// src/common/frame.rs

//! Wire-level framing constants and the [`Frame`] type produced by the codec.
//!
//! Two frame families share the link:
//!
//! - **Command / ACK** (host <-> radar): `FD FC FB FA`, `u16` LE length,
//!   command word + value bytes, `04 03 02 01`.
//! - **Report** (radar -> host): `F4 F3 F2 F1`, `u16` LE length, report data
//!   (`type`, `0xAA`, ..., `0x55`, `0x00`), `F8 F7 F6 F5`.
//!
//! There is no CRC in the vendor protocol. Integrity comes from the header,
//! the declared length, the footer and, for reports, the inner head/tail/check bytes.

use heapless::Vec;

/// Command / ACK frame header.
pub const CMD_HEADER: [u8; 4] = [0xFD, 0xFC, 0xFB, 0xFA];
/// Command / ACK frame footer.
pub const CMD_FOOTER: [u8; 4] = [0x04, 0x03, 0x02, 0x01];
/// Report frame header.
pub const REPORT_HEADER: [u8; 4] = [0xF4, 0xF3, 0xF2, 0xF1];
/// Report frame footer.
pub const REPORT_FOOTER: [u8; 4] = [0xF8, 0xF7, 0xF6, 0xF5];

/// Inner markers inside report frame data.
pub const REPORT_INNER_HEAD: u8 = 0xAA;
pub const REPORT_INNER_TAIL: u8 = 0x55;
pub const REPORT_INNER_CHECK: u8 = 0x00;

pub const HEADER_LEN: usize = 4;
pub const LENGTH_FIELD_LEN: usize = 2;
pub const FOOTER_LEN: usize = 4;
/// Header + length field + footer.
pub const FRAME_OVERHEAD: usize = HEADER_LEN + LENGTH_FIELD_LEN + FOOTER_LEN;

/// Largest intra-frame length accepted. Anything larger is a corrupted length field.
pub const MAX_FRAME_DATA_LEN: usize = 128;
/// Largest complete frame on the wire.
pub const MAX_FRAME_LEN: usize = MAX_FRAME_DATA_LEN + FRAME_OVERHEAD;

/// Smallest command/ACK data: the command word.
pub const MIN_CMD_DATA_LEN: usize = 2;
/// Smallest report data: type, head, tail, check.
pub const MIN_REPORT_DATA_LEN: usize = 4;

/// Which of the two frame families a frame belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameKind {
    /// Command sent by the host or ACK returned by the radar.
    CommandAck,
    /// Periodic target report pushed by the radar.
    Report,
}

impl FrameKind {
    pub const fn header(&self) -> &'static [u8; 4] {
        match self {
            FrameKind::CommandAck => &CMD_HEADER,
            FrameKind::Report => &REPORT_HEADER,
        }
    }

    pub const fn footer(&self) -> &'static [u8; 4] {
        match self {
            FrameKind::CommandAck => &CMD_FOOTER,
            FrameKind::Report => &REPORT_FOOTER,
        }
    }

    pub const fn min_data_len(&self) -> usize {
        match self {
            FrameKind::CommandAck => MIN_CMD_DATA_LEN,
            FrameKind::Report => MIN_REPORT_DATA_LEN,
        }
    }

    /// Frame family whose header starts with `first`, if any.
    pub fn from_header_start(first: u8) -> Option<Self> {
        match first {
            0xFD => Some(FrameKind::CommandAck),
            0xF4 => Some(FrameKind::Report),
            _ => None,
        }
    }
}

/// One complete, integrity-checked frame. `data` holds the bytes covered by
/// the length field (everything between the length and the footer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub data: Vec<u8, MAX_FRAME_DATA_LEN>,
}

impl Frame {
    /// Builds a frame from already validated intra-frame bytes.
    /// Returns `None` if `data` exceeds [`MAX_FRAME_DATA_LEN`].
    pub fn new(kind: FrameKind, data: &[u8]) -> Option<Self> {
        let data = Vec::from_slice(data).ok()?;
        Some(Frame { kind, data })
    }

    /// Leading `u16` LE word of a command/ACK frame.
    pub fn command_word(&self) -> Option<u16> {
        match (self.kind, self.data.get(0..2)) {
            (FrameKind::CommandAck, Some(&[lo, hi])) => Some(u16::from_le_bytes([lo, hi])),
            _ => None,
        }
    }
}

// --- UART settings ---

/// Parity setting of the serial link.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// The serial format the radar speaks. TX and RX are both required.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SerialFormat {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
}

impl SerialFormat {
    /// LD2410S factory setting: 115200 baud, 8N1.
    pub const LD2410S: SerialFormat = SerialFormat {
        baud_rate: 115_200,
        data_bits: 8,
        parity: Parity::None,
        stop_bits: 1,
    };

    /// Time one byte occupies on the wire (start bit + data + parity + stop).
    pub fn byte_duration(&self) -> core::time::Duration {
        let parity_bits = if self.parity == Parity::None { 0 } else { 1 };
        let bits = 1 + u64::from(self.data_bits) + parity_bits + u64::from(self.stop_bits);
        core::time::Duration::from_nanos(bits * 1_000_000_000 / u64::from(self.baud_rate.max(1)))
    }
}

impl Default for SerialFormat {
    fn default() -> Self {
        Self::LD2410S
    }
}
