// src/common/message/mod.rs

mod ack;
mod error;
pub mod parse; // Make interpret public
mod report;

// Re-export items for external use
pub use ack::{ConfigModeInfo, ParameterValues, QueryData, QueryResponse};
pub use error::MalformedReason;
pub use parse::interpret;
pub use report::{PeriodicReport, ReportKind};

use crate::common::command::CommandWord;

/// Everything a frame can decode to.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    /// Periodic target report (basic or engineering).
    PeriodicReport(PeriodicReport),
    /// Successful ACK to a read command, carrying the data read.
    QueryResponse(QueryResponse),
    /// Successful ACK to a command that returns no data.
    Ack { command: CommandWord, config: Option<ConfigModeInfo> },
    /// ACK with a non-zero status.
    Nak { command: CommandWord, status: u16 },
    /// Frame passed integrity checks but its content could not be understood.
    Malformed(MalformedReason),
}

impl DecodedMessage {
    /// The command an ACK, NAK or query response answers.
    pub fn answered_command(&self) -> Option<CommandWord> {
        match self {
            DecodedMessage::QueryResponse(resp) => Some(resp.command),
            DecodedMessage::Ack { command, .. } | DecodedMessage::Nak { command, .. } => Some(*command),
            DecodedMessage::PeriodicReport(_) | DecodedMessage::Malformed(_) => None,
        }
    }
}
