// src/driver/sequencer.rs

use core::fmt;
use core::time::Duration;
use log::{debug, warn};

use crate::common::{
    codec::{EncodedFrame, FrameCodec},
    command::{Command, CommandWord, GateThresholds, ThresholdKind},
    error::Ld2410sError,
    hal_traits::Ld2410sInstant,
    message::{ConfigModeInfo, DecodedMessage, ParameterValues, QueryData, QueryResponse},
    version::{FirmwareVersion, SerialNumber},
};

/// A command on the wire that has not been answered yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand<I> {
    pub command: Command,
    pub issued_at: I,
    /// Retransmissions performed so far.
    pub retries: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerState<I> {
    Idle,
    AwaitingResponse(PendingCommand<I>),
}

/// Data carried by a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Plain ACK. Enable config also reports protocol version and buffer size.
    Acknowledged(Option<ConfigModeInfo>),
    FirmwareVersion(FirmwareVersion),
    SerialNumber(SerialNumber),
    /// Values paired with the ids that were requested.
    Parameters(ParameterValues),
    /// Thresholds paired with the gates that were requested.
    GateThresholds { kind: ThresholdKind, values: GateThresholds },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CommandFailure {
    /// No answer after the first attempt plus all retries.
    TimedOut { attempts: u8 },
    /// Radar answered with a non-zero status.
    Rejected { status: u16 },
    /// Answer matched the command but its content did not.
    BadResponse,
    /// Frame could not be pushed to the UART.
    NotSent,
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandFailure::TimedOut { attempts } => write!(f, "no response after {} attempts", attempts),
            CommandFailure::Rejected { status } => write!(f, "rejected with status {:#06x}", status),
            CommandFailure::BadResponse => f.write_str("response did not match the request"),
            CommandFailure::NotSent => f.write_str("could not be transmitted"),
        }
    }
}

/// Final result of one issued command. Produced exactly once per command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command: Command,
    pub result: Result<Completion, CommandFailure>,
}

impl CommandOutcome {
    pub fn failed(command: Command, failure: CommandFailure) -> Self {
        CommandOutcome { command, result: Err(failure) }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Converts a failure into the crate error type.
    pub fn into_result<E: fmt::Debug>(self) -> Result<Completion, Ld2410sError<E>> {
        let command = self.command.word();
        self.result.map_err(|failure| match failure {
            CommandFailure::TimedOut { .. } => Ld2410sError::Timeout,
            CommandFailure::Rejected { status } => Ld2410sError::CommandRejected { command, status },
            CommandFailure::BadResponse => Ld2410sError::InvalidFrame,
            CommandFailure::NotSent => Ld2410sError::TransmitFailed { command },
        })
    }
}

/// Returned by [`CommandSequencer::issue`] while another command is pending.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SequencerBusy {
    pub pending: CommandWord,
}

/// What the caller has to do after [`CommandSequencer::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollAction {
    None,
    /// Timeout hit with retries left; send these bytes again.
    Retransmit(EncodedFrame),
    /// Timeout hit with no retries left. The sequencer is idle again.
    Exhausted(CommandOutcome),
}

/// Enforces one outstanding command at a time and owns its timeout/retry
/// bookkeeping. Pure state machine: it hands out bytes and outcomes, the
/// driver does the I/O.
#[derive(Debug)]
pub struct CommandSequencer<I> {
    state: SequencerState<I>,
    response_timeout: Duration,
    max_retries: u8,
}

impl<I: Ld2410sInstant> CommandSequencer<I> {
    pub fn new(response_timeout: Duration, max_retries: u8) -> Self {
        CommandSequencer { state: SequencerState::Idle, response_timeout, max_retries }
    }

    pub fn state(&self) -> &SequencerState<I> {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, SequencerState::Idle)
    }

    pub fn pending(&self) -> Option<&PendingCommand<I>> {
        match &self.state {
            SequencerState::AwaitingResponse(p) => Some(p),
            SequencerState::Idle => None,
        }
    }

    /// Records `command` as pending and returns the frame to transmit.
    pub fn issue(&mut self, command: Command, now: I) -> Result<EncodedFrame, SequencerBusy> {
        if let Some(p) = self.pending() {
            return Err(SequencerBusy { pending: p.command.word() });
        }
        let frame = FrameCodec::encode(&command);
        debug!(target: "ld2410s", "sending {}", command);
        self.state = SequencerState::AwaitingResponse(PendingCommand { command, issued_at: now, retries: 0 });
        Ok(frame)
    }

    /// Feeds an ACK, NAK or query response. Returns the outcome when it answers
    /// the pending command; anything else is logged and dropped.
    pub fn on_response(&mut self, message: &DecodedMessage) -> Option<CommandOutcome> {
        let answered = message.answered_command()?;
        let matches = self.pending().is_some_and(|p| p.command.word() == answered);
        if !matches {
            warn!(target: "ld2410s", "unsolicited response to {:?} discarded", answered);
            return None;
        }
        let SequencerState::AwaitingResponse(pending) = core::mem::replace(&mut self.state, SequencerState::Idle)
        else {
            return None;
        };

        let command = pending.command;
        let result = match message {
            DecodedMessage::Nak { status, .. } => Err(CommandFailure::Rejected { status: *status }),
            DecodedMessage::Ack { config, .. } => Ok(Completion::Acknowledged(*config)),
            DecodedMessage::QueryResponse(response) => complete_query(&command, response),
            DecodedMessage::PeriodicReport(_) | DecodedMessage::Malformed(_) => Err(CommandFailure::BadResponse),
        };
        if let Err(failure) = &result {
            warn!(target: "ld2410s", "{} failed: {}", command, failure);
        }
        Some(CommandOutcome { command, result })
    }

    /// Checks the pending command against its deadline.
    pub fn poll(&mut self, now: I) -> PollAction {
        let timeout = self.response_timeout;
        let max_retries = self.max_retries;
        let SequencerState::AwaitingResponse(pending) = &mut self.state else {
            return PollAction::None;
        };
        if now - pending.issued_at < timeout {
            return PollAction::None;
        }

        if pending.retries < max_retries {
            pending.retries += 1;
            pending.issued_at = now;
            debug!(target: "ld2410s", "{} timed out, retry {}/{}", pending.command, pending.retries, max_retries);
            return PollAction::Retransmit(FrameCodec::encode(&pending.command));
        }

        let attempts = pending.retries.saturating_add(1);
        match core::mem::replace(&mut self.state, SequencerState::Idle) {
            SequencerState::AwaitingResponse(pending) => {
                warn!(target: "ld2410s", "{} got no response after {} attempts", pending.command, attempts);
                PollAction::Exhausted(CommandOutcome::failed(pending.command, CommandFailure::TimedOut { attempts }))
            }
            SequencerState::Idle => PollAction::None,
        }
    }

    /// Drops the pending command, e.g. when its frame could not be written.
    pub fn abort(&mut self, failure: CommandFailure) -> Option<CommandOutcome> {
        match core::mem::replace(&mut self.state, SequencerState::Idle) {
            SequencerState::AwaitingResponse(pending) => {
                warn!(target: "ld2410s", "{} aborted: {}", pending.command, failure);
                Some(CommandOutcome::failed(pending.command, failure))
            }
            SequencerState::Idle => None,
        }
    }
}

fn complete_query(command: &Command, response: &QueryResponse) -> Result<Completion, CommandFailure> {
    match (&response.data, command) {
        (QueryData::FirmwareVersion(v), Command::ReadFirmwareVersion) => Ok(Completion::FirmwareVersion(*v)),
        (QueryData::SerialNumber(sn), Command::ReadSerialNumber) => Ok(Completion::SerialNumber(sn.clone())),
        (QueryData::Parameters(values), Command::ReadCommonParameters(ids)) => {
            if values.len() != ids.len() {
                return Err(CommandFailure::BadResponse);
            }
            Ok(Completion::Parameters(ids.iter().copied().zip(values.iter().copied()).collect()))
        }
        (QueryData::GateThresholds(values), Command::ReadGateThresholds(kind, gates)) => {
            if values.len() != gates.len() {
                return Err(CommandFailure::BadResponse);
            }
            let values = gates.iter().copied().zip(values.iter().copied()).collect();
            Ok(Completion::GateThresholds { kind: *kind, values })
        }
        _ => Err(CommandFailure::BadResponse),
    }
}
