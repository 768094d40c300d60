// src/common/message/ack.rs

use arrayvec::ArrayVec;

use super::error::MalformedReason;
use super::DecodedMessage;
use crate::common::command::{CommandWord, ParameterId, ACK_FLAG, MAX_PARAMETERS};
use crate::common::types::MAX_GATES;
use crate::common::version::{FirmwareVersion, SerialNumber};

/// Status value of a successful ACK.
pub const ACK_STATUS_OK: u16 = 0x0000;

/// Extra data in the enable configuration ACK.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ConfigModeInfo {
    pub protocol_version: u16,
    pub buffer_size: u16,
}

/// Parameter values paired with the ids that were requested.
pub type ParameterValues = ArrayVec<(ParameterId, u32), MAX_PARAMETERS>;

/// Data carried by an ACK to a read command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryData {
    FirmwareVersion(FirmwareVersion),
    SerialNumber(SerialNumber),
    /// Raw `u32` values in request order; the sequencer pairs them with the
    /// requested ids since the ACK does not echo them.
    Parameters(ArrayVec<u32, MAX_PARAMETERS>),
    /// Raw per-gate thresholds in request order, paired like parameters.
    GateThresholds(ArrayVec<u32, MAX_GATES>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResponse {
    pub command: CommandWord,
    pub data: QueryData,
}

/// Decodes command/ACK frame data (command word onward).
pub(super) fn parse_ack(data: &[u8]) -> DecodedMessage {
    match decode(data) {
        Ok(message) => message,
        Err(reason) => DecodedMessage::Malformed(reason),
    }
}

fn decode(data: &[u8]) -> Result<DecodedMessage, MalformedReason> {
    let raw_word = match data {
        [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
        _ => return Err(MalformedReason::AckTooShort),
    };
    if raw_word & ACK_FLAG == 0 {
        return Err(MalformedReason::NotAnAck(raw_word));
    }
    let command = CommandWord::from_u16(raw_word & !ACK_FLAG)
        .ok_or(MalformedReason::UnknownCommand(raw_word))?;

    let status = match &data[2..] {
        [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
        _ => return Err(MalformedReason::AckTooShort),
    };
    if status != ACK_STATUS_OK {
        return Ok(DecodedMessage::Nak { command, status });
    }
    let payload = &data[4..];

    let query = |data| Ok(DecodedMessage::QueryResponse(QueryResponse { command, data }));
    match command {
        CommandWord::EnableConfig => {
            let config = match payload {
                [pv0, pv1, bs0, bs1, ..] => Some(ConfigModeInfo {
                    protocol_version: u16::from_le_bytes([*pv0, *pv1]),
                    buffer_size: u16::from_le_bytes([*bs0, *bs1]),
                }),
                _ => None,
            };
            Ok(DecodedMessage::Ack { command, config })
        }
        CommandWord::DisableConfig
        | CommandWord::WriteCommonParameters
        | CommandWord::SetReportMode
        | CommandWord::WriteMoveThresholds
        | CommandWord::WriteStillThresholds => {
            Ok(DecodedMessage::Ack { command, config: None })
        }
        CommandWord::ReadFirmwareVersion => {
            let version = FirmwareVersion::from_le_bytes(payload).ok_or(MalformedReason::AckTooShort)?;
            query(QueryData::FirmwareVersion(version))
        }
        CommandWord::ReadSerialNumber => {
            let sn = SerialNumber::from_ack_payload(payload).ok_or(MalformedReason::BadSerialNumber)?;
            query(QueryData::SerialNumber(sn))
        }
        CommandWord::ReadCommonParameters => {
            query(QueryData::Parameters(u32_values(payload)))
        }
        CommandWord::ReadMoveThresholds | CommandWord::ReadStillThresholds => {
            query(QueryData::GateThresholds(u32_values(payload)))
        }
    }
}

fn u32_values<const N: usize>(payload: &[u8]) -> ArrayVec<u32, N> {
    payload
        .chunks_exact(4)
        .take(N)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
