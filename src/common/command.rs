// src/common/command.rs

//! LD2410S command definitions.
//!
//! Every command travels in a command frame as a `u16` LE command word followed
//! by value bytes. The radar answers with the same word OR'ed with
//! [`ACK_FLAG`] and a `u16` status.

use arrayvec::ArrayVec;
use core::fmt;

use super::frame::{Frame, FrameKind};
use super::types::MAX_GATES;

/// Bit set in the command word of every ACK.
pub const ACK_FLAG: u16 = 0x0100;

/// Most parameters a single read/write common parameters command carries.
pub const MAX_PARAMETERS: usize = 8;

/// Value bytes of the largest command (write of one threshold per gate).
pub const MAX_COMMAND_VALUE_LEN: usize = MAX_GATES * 6;

/// Gate indexes of a threshold read.
pub type GateList = ArrayVec<u8, MAX_GATES>;

/// `(gate, threshold)` pairs of a threshold write or read.
pub type GateThresholds = ArrayVec<(u8, u32), MAX_GATES>;

/// Raw command words understood by the radar.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u16)]
pub enum CommandWord {
    ReadFirmwareVersion = 0x0000,
    ReadSerialNumber = 0x0011,
    WriteCommonParameters = 0x0070,
    ReadCommonParameters = 0x0071,
    WriteMoveThresholds = 0x0072,
    ReadMoveThresholds = 0x0073,
    WriteStillThresholds = 0x0076,
    ReadStillThresholds = 0x0077,
    SetReportMode = 0x007A,
    DisableConfig = 0x00FE,
    EnableConfig = 0x00FF,
}

impl CommandWord {
    /// Tries to convert a raw (non-ACK) word into a known command.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0000 => Some(CommandWord::ReadFirmwareVersion),
            0x0011 => Some(CommandWord::ReadSerialNumber),
            0x0070 => Some(CommandWord::WriteCommonParameters),
            0x0071 => Some(CommandWord::ReadCommonParameters),
            0x0072 => Some(CommandWord::WriteMoveThresholds),
            0x0073 => Some(CommandWord::ReadMoveThresholds),
            0x0076 => Some(CommandWord::WriteStillThresholds),
            0x0077 => Some(CommandWord::ReadStillThresholds),
            0x007A => Some(CommandWord::SetReportMode),
            0x00FE => Some(CommandWord::DisableConfig),
            0x00FF => Some(CommandWord::EnableConfig),
            _ => None,
        }
    }

    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// The word the radar puts in the ACK for this command.
    pub const fn ack_word(self) -> u16 {
        self as u16 | ACK_FLAG
    }
}

/// Identifiers of the "common parameters" block.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u16)]
pub enum ParameterId {
    /// Status report frequency, tenths of a hertz.
    StatusReportFrequency = 0x0002,
    /// Farthest detection gate.
    FarthestGate = 0x0005,
    /// Seconds without presence before reporting "no target".
    UnmannedDelay = 0x0006,
    /// Response speed, 5 = normal, 10 = fast.
    ResponseSpeed = 0x000B,
    /// Nearest detection gate.
    NearestGate = 0x000A,
    /// Distance report frequency, tenths of a hertz.
    DistanceReportFrequency = 0x000C,
}

impl ParameterId {
    /// The parameters the query routine reads, in request order.
    pub const QUERY_SET: [ParameterId; 6] = [
        ParameterId::FarthestGate,
        ParameterId::NearestGate,
        ParameterId::UnmannedDelay,
        ParameterId::StatusReportFrequency,
        ParameterId::DistanceReportFrequency,
        ParameterId::ResponseSpeed,
    ];

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0002 => Some(ParameterId::StatusReportFrequency),
            0x0005 => Some(ParameterId::FarthestGate),
            0x0006 => Some(ParameterId::UnmannedDelay),
            0x000A => Some(ParameterId::NearestGate),
            0x000B => Some(ParameterId::ResponseSpeed),
            0x000C => Some(ParameterId::DistanceReportFrequency),
            _ => None,
        }
    }

    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Output format of the periodic reports.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ReportMode {
    /// Presence, distances and overall energies.
    Basic,
    /// Basic fields plus per-gate energies.
    Engineering,
}

impl ReportMode {
    pub const fn raw(self) -> u32 {
        match self {
            ReportMode::Basic => 0x0000_0064,
            ReportMode::Engineering => 0x0000_0004,
        }
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x0000_0064 => Some(ReportMode::Basic),
            0x0000_0004 => Some(ReportMode::Engineering),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ReportMode::Basic => "basic",
            ReportMode::Engineering => "engineering",
        }
    }
}

impl fmt::Display for ReportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which per-gate energy threshold a command addresses.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ThresholdKind {
    /// Energy a moving target must exceed to trigger detection.
    Move = 0,
    /// Energy a still target must exceed to hold detection.
    Still = 1,
}

impl ThresholdKind {
    pub const fn read_word(self) -> CommandWord {
        match self {
            ThresholdKind::Move => CommandWord::ReadMoveThresholds,
            ThresholdKind::Still => CommandWord::ReadStillThresholds,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ThresholdKind::Move => "move",
            ThresholdKind::Still => "still",
        }
    }

    pub const fn write_word(self) -> CommandWord {
        match self {
            ThresholdKind::Move => CommandWord::WriteMoveThresholds,
            ThresholdKind::Still => CommandWord::WriteStillThresholds,
        }
    }
}

/// A command the host can send to the radar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Enter configuration mode. Required before any other command.
    EnableConfig,
    /// Leave configuration mode and resume reporting.
    DisableConfig,
    /// Read major/minor/patch firmware version.
    ReadFirmwareVersion,
    /// Read the factory serial number.
    ReadSerialNumber,
    /// Read the listed common parameters. The ACK returns one `u32` per id, in order.
    ReadCommonParameters(ArrayVec<ParameterId, MAX_PARAMETERS>),
    /// Write the listed common parameters.
    WriteCommonParameters(ArrayVec<(ParameterId, u32), MAX_PARAMETERS>),
    /// Switch between basic and engineering reports.
    SetReportMode(ReportMode),
    /// Read thresholds of the listed gates. The ACK returns one `u32` per gate, in order.
    ReadGateThresholds(ThresholdKind, GateList),
    WriteGateThresholds(ThresholdKind, GateThresholds),
}

/// Error returned when a command frame cannot be turned back into a [`Command`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CommandDecodeError {
    /// Frame is a report, or too short to hold a command word.
    NotACommand,
    /// Command word has the ACK bit set.
    IsAck,
    UnknownWord(u16),
    UnknownParameter(u16),
    UnknownGate(u16),
    /// Value bytes do not fit the command's layout.
    BadValueLength,
}

impl fmt::Display for CommandDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandDecodeError::NotACommand => write!(f, "frame is not a command"),
            CommandDecodeError::IsAck => write!(f, "frame is an ACK"),
            CommandDecodeError::UnknownWord(w) => write!(f, "unknown command word {:#06x}", w),
            CommandDecodeError::UnknownParameter(p) => write!(f, "unknown parameter {:#06x}", p),
            CommandDecodeError::UnknownGate(g) => write!(f, "gate {} out of range", g),
            CommandDecodeError::BadValueLength => write!(f, "bad command value length"),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::EnableConfig => write!(f, "enable-config"),
            Command::DisableConfig => write!(f, "disable-config"),
            Command::ReadFirmwareVersion => write!(f, "read-firmware-version"),
            Command::ReadSerialNumber => write!(f, "read-serial-number"),
            Command::ReadCommonParameters(ids) => write!(f, "read-common-parameters[{}]", ids.len()),
            Command::WriteCommonParameters(values) => {
                write!(f, "write-common-parameters[{}]", values.len())
            }
            Command::SetReportMode(mode) => write!(f, "set-report-mode[{}]", mode),
            Command::ReadGateThresholds(kind, gates) => {
                write!(f, "read-{}-thresholds[{}]", kind.name(), gates.len())
            }
            Command::WriteGateThresholds(kind, values) => {
                write!(f, "write-{}-thresholds[{}]", kind.name(), values.len())
            }
        }
    }
}

impl Command {
    /// Read of the parameter set the query routine reports.
    pub fn read_query_parameters() -> Self {
        Command::ReadCommonParameters(ParameterId::QUERY_SET.iter().copied().collect())
    }

    /// Read of one threshold kind for every gate.
    pub fn read_all_gate_thresholds(kind: ThresholdKind) -> Self {
        Command::ReadGateThresholds(kind, (0..MAX_GATES as u8).collect())
    }

    pub fn word(&self) -> CommandWord {
        match self {
            Command::EnableConfig => CommandWord::EnableConfig,
            Command::DisableConfig => CommandWord::DisableConfig,
            Command::ReadFirmwareVersion => CommandWord::ReadFirmwareVersion,
            Command::ReadSerialNumber => CommandWord::ReadSerialNumber,
            Command::ReadCommonParameters(_) => CommandWord::ReadCommonParameters,
            Command::WriteCommonParameters(_) => CommandWord::WriteCommonParameters,
            Command::SetReportMode(_) => CommandWord::SetReportMode,
            Command::ReadGateThresholds(kind, _) => kind.read_word(),
            Command::WriteGateThresholds(kind, _) => kind.write_word(),
        }
    }

    /// Value bytes following the command word.
    pub fn value_bytes(&self) -> ArrayVec<u8, MAX_COMMAND_VALUE_LEN> {
        let mut out = ArrayVec::new();
        match self {
            // Protocol expects 0x0001 as the enable value
            Command::EnableConfig => out.extend([0x01, 0x00]),
            Command::DisableConfig | Command::ReadFirmwareVersion | Command::ReadSerialNumber => {}
            Command::ReadCommonParameters(ids) => {
                for id in ids {
                    out.extend(id.as_u16().to_le_bytes());
                }
            }
            Command::WriteCommonParameters(values) => {
                for (id, value) in values {
                    out.extend(id.as_u16().to_le_bytes());
                    out.extend(value.to_le_bytes());
                }
            }
            Command::SetReportMode(mode) => {
                out.extend([0x00, 0x00]);
                out.extend(mode.raw().to_le_bytes());
            }
            Command::ReadGateThresholds(_, gates) => {
                for gate in gates {
                    out.extend(u16::from(*gate).to_le_bytes());
                }
            }
            Command::WriteGateThresholds(_, values) => {
                for (gate, value) in values {
                    out.extend(u16::from(*gate).to_le_bytes());
                    out.extend(value.to_le_bytes());
                }
            }
        }
        out
    }

    /// Number of `u32` values the ACK for this command carries after the status.
    pub fn expected_values(&self) -> usize {
        match self {
            Command::ReadCommonParameters(ids) => ids.len(),
            Command::ReadGateThresholds(_, gates) => gates.len(),
            _ => 0,
        }
    }

    /// True for commands the radar only accepts in configuration mode.
    pub fn requires_config_mode(&self) -> bool {
        !matches!(self, Command::EnableConfig)
    }

    /// Parses a command frame (host -> radar direction) back into a `Command`.
    pub fn from_frame(frame: &Frame) -> Result<Self, CommandDecodeError> {
        if frame.kind != FrameKind::CommandAck {
            return Err(CommandDecodeError::NotACommand);
        }
        let raw = frame.command_word().ok_or(CommandDecodeError::NotACommand)?;
        if raw & ACK_FLAG != 0 {
            return Err(CommandDecodeError::IsAck);
        }
        let word = CommandWord::from_u16(raw).ok_or(CommandDecodeError::UnknownWord(raw))?;
        let value = &frame.data[2..];

        match word {
            CommandWord::EnableConfig => match value {
                [0x01, 0x00] => Ok(Command::EnableConfig),
                _ => Err(CommandDecodeError::BadValueLength),
            },
            CommandWord::DisableConfig if value.is_empty() => Ok(Command::DisableConfig),
            CommandWord::ReadFirmwareVersion if value.is_empty() => Ok(Command::ReadFirmwareVersion),
            CommandWord::ReadSerialNumber if value.is_empty() => Ok(Command::ReadSerialNumber),
            CommandWord::ReadCommonParameters => {
                if value.len() % 2 != 0 || value.len() / 2 > MAX_PARAMETERS {
                    return Err(CommandDecodeError::BadValueLength);
                }
                let mut ids = ArrayVec::new();
                for chunk in value.chunks_exact(2) {
                    let raw_id = u16::from_le_bytes([chunk[0], chunk[1]]);
                    ids.push(ParameterId::from_u16(raw_id).ok_or(CommandDecodeError::UnknownParameter(raw_id))?);
                }
                Ok(Command::ReadCommonParameters(ids))
            }
            CommandWord::WriteCommonParameters => {
                if value.len() % 6 != 0 || value.len() / 6 > MAX_PARAMETERS {
                    return Err(CommandDecodeError::BadValueLength);
                }
                let mut values = ArrayVec::new();
                for chunk in value.chunks_exact(6) {
                    let raw_id = u16::from_le_bytes([chunk[0], chunk[1]]);
                    let id = ParameterId::from_u16(raw_id).ok_or(CommandDecodeError::UnknownParameter(raw_id))?;
                    values.push((id, u32::from_le_bytes([chunk[2], chunk[3], chunk[4], chunk[5]])));
                }
                Ok(Command::WriteCommonParameters(values))
            }
            CommandWord::SetReportMode => match value {
                [0x00, 0x00, b0, b1, b2, b3] => ReportMode::from_raw(u32::from_le_bytes([*b0, *b1, *b2, *b3]))
                    .map(Command::SetReportMode)
                    .ok_or(CommandDecodeError::BadValueLength),
                _ => Err(CommandDecodeError::BadValueLength),
            },
            CommandWord::ReadMoveThresholds | CommandWord::ReadStillThresholds => {
                let kind = threshold_kind(word);
                if value.len() % 2 != 0 || value.len() / 2 > MAX_GATES {
                    return Err(CommandDecodeError::BadValueLength);
                }
                let mut gates = ArrayVec::new();
                for chunk in value.chunks_exact(2) {
                    gates.push(decode_gate(chunk)?);
                }
                Ok(Command::ReadGateThresholds(kind, gates))
            }
            CommandWord::WriteMoveThresholds | CommandWord::WriteStillThresholds => {
                let kind = threshold_kind(word);
                if value.len() % 6 != 0 || value.len() / 6 > MAX_GATES {
                    return Err(CommandDecodeError::BadValueLength);
                }
                let mut values = ArrayVec::new();
                for chunk in value.chunks_exact(6) {
                    let gate = decode_gate(&chunk[..2])?;
                    values.push((gate, u32::from_le_bytes([chunk[2], chunk[3], chunk[4], chunk[5]])));
                }
                Ok(Command::WriteGateThresholds(kind, values))
            }
            _ => Err(CommandDecodeError::BadValueLength),
        }
    }
}

fn threshold_kind(word: CommandWord) -> ThresholdKind {
    match word {
        CommandWord::ReadStillThresholds | CommandWord::WriteStillThresholds => ThresholdKind::Still,
        _ => ThresholdKind::Move,
    }
}

fn decode_gate(chunk: &[u8]) -> Result<u8, CommandDecodeError> {
    let raw = u16::from_le_bytes([chunk[0], chunk[1]]);
    match u8::try_from(raw) {
        Ok(gate) if usize::from(gate) < MAX_GATES => Ok(gate),
        _ => Err(CommandDecodeError::UnknownGate(raw)),
    }
}
