// src/common/version.rs

use core::fmt;
use core::fmt::Write;
use heapless::String;

/// Longest rendered version, `65535.65535.65535`.
pub const VERSION_TEXT_LEN: usize = 17;
/// Longest serial number kept.
pub const SERIAL_NUMBER_LEN: usize = 32;

/// Firmware version as reported by the read firmware version ACK.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct FirmwareVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl FirmwareVersion {
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        FirmwareVersion { major, minor, patch }
    }

    /// Parses the six version bytes (three `u16` LE) following the ACK status.
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [ma0, ma1, mi0, mi1, pa0, pa1, ..] => Some(FirmwareVersion {
                major: u16::from_le_bytes([*ma0, *ma1]),
                minor: u16::from_le_bytes([*mi0, *mi1]),
                patch: u16::from_le_bytes([*pa0, *pa1]),
            }),
            _ => None,
        }
    }

    /// Renders the version into a fixed-capacity string for text outputs.
    pub fn to_text(&self) -> String<VERSION_TEXT_LEN> {
        let mut out = String::new();
        // Cannot overflow: capacity covers three maximal u16 values plus dots
        let _ = write!(out, "{}", self);
        out
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}.{:02}", self.major, self.minor, self.patch)
    }
}

/// Factory serial number string.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct SerialNumber(String<SERIAL_NUMBER_LEN>);

impl SerialNumber {
    /// Parses `u16 length` + ASCII bytes. Trailing NUL padding is stripped.
    pub fn from_ack_payload(bytes: &[u8]) -> Option<Self> {
        let len = match bytes {
            [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]) as usize,
            _ => return None,
        };
        let raw = bytes[2..].get(..len)?;
        let trimmed = match raw.iter().rposition(|b| *b != 0) {
            Some(last) => &raw[..=last],
            None => &raw[..0],
        };
        let text = core::str::from_utf8(trimmed).ok()?;
        let mut out = String::new();
        out.push_str(text).ok()?;
        Some(SerialNumber(out))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
