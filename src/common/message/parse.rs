// src/common/message/parse.rs

use log::{debug, trace};

use super::ack::parse_ack;
use super::report::parse_report;
use super::DecodedMessage;
use crate::common::frame::{Frame, FrameKind};

/// Decodes one integrity-checked frame. Never fails: anything that cannot be
/// understood becomes [`DecodedMessage::Malformed`].
pub fn interpret(frame: &Frame) -> DecodedMessage {
    let message = match frame.kind {
        FrameKind::Report => match parse_report(&frame.data) {
            Ok(report) => DecodedMessage::PeriodicReport(report),
            Err(reason) => DecodedMessage::Malformed(reason),
        },
        FrameKind::CommandAck => parse_ack(&frame.data),
    };

    match &message {
        DecodedMessage::Malformed(reason) => debug!(target: "ld2410s", "malformed frame: {}", reason),
        other => trace!(target: "ld2410s", "decoded {:?}", other),
    }
    message
}
