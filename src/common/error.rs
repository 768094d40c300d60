// src/common/error.rs

use super::command::CommandWord;

#[derive(Debug, thiserror::Error)]
pub enum Ld2410sError<E = ()>
where
    E: core::fmt::Debug, // Still need Debug for the generic Io error
{
    /// Underlying I/O error from the HAL implementation.
    #[error("I/O error: {0:?}")]
    Io(E),

    /// Operation timed out.
    #[error("Operation timed out")]
    Timeout,

    /// A command is already awaiting its acknowledgement.
    #[error("Command sequencer busy: {pending:?} still awaiting response")]
    Busy { pending: CommandWord },

    /// Buffer provided was too small.
    #[error("Buffer overflow: needed {needed}, got {got}")]
    BufferOverflow { needed: usize, got: usize },

    /// Request carried no values to send.
    #[error("Empty request")]
    EmptyRequest,

    /// Gate index outside the radar's range.
    #[error("Invalid gate index: {0}")]
    InvalidGate(u8),

    /// Command is only accepted while the radar is in configuration mode.
    #[error("Command {command:?} requires configuration mode")]
    NotInConfigMode { command: CommandWord },

    /// A frame answered the pending command but its content did not fit the request.
    #[error("Invalid frame")]
    InvalidFrame,

    /// A command frame could not be written to the UART.
    #[error("Command {command:?} could not be transmitted")]
    TransmitFailed { command: CommandWord },

    /// Radar acknowledged a command with a non-zero status.
    #[error("Command {command:?} rejected with status {status:#06x}")]
    CommandRejected { command: CommandWord, status: u16 },
}

// Allow mapping from underlying HAL error if From is implemented
impl<E: core::fmt::Debug> From<E> for Ld2410sError<E> {
    fn from(e: E) -> Self {
        Ld2410sError::Io(e)
    }
}

impl<E: core::fmt::Debug> Ld2410sError<E> {
    /// True for conditions the driver recovers from on its own by retrying
    /// on a later tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Ld2410sError::Io(_) | Ld2410sError::Timeout | Ld2410sError::TransmitFailed { .. }
        )
    }
}
