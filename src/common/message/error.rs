// src/common/message/error.rs

use core::fmt;

/// Why an integrity-checked frame could not be decoded.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MalformedReason {
    /// Report type byte is neither basic (`0x02`) nor engineering (`0x01`).
    UnknownReportType(u8),
    /// Report data shorter than the fixed basic fields.
    ReportTooShort,
    /// ACK word does not belong to a known command.
    UnknownCommand(u16),
    /// Command frame without the ACK bit, e.g. an echo of our own command.
    NotAnAck(u16),
    /// ACK too short for its status or payload.
    AckTooShort,
    /// Serial number payload inconsistent or not text.
    BadSerialNumber,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::UnknownReportType(t) => write!(f, "unknown report type {:#04x}", t),
            MalformedReason::ReportTooShort => write!(f, "report too short"),
            MalformedReason::UnknownCommand(w) => write!(f, "ACK for unknown command {:#06x}", w),
            MalformedReason::NotAnAck(w) => write!(f, "command frame {:#06x} is not an ACK", w),
            MalformedReason::AckTooShort => write!(f, "ACK too short"),
            MalformedReason::BadSerialNumber => write!(f, "bad serial number payload"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MalformedReason {}
