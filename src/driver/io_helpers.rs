// src/driver/io_helpers.rs

use log::debug;

use super::Ld2410sDriver;
use crate::common::{
    codec::EncodedFrame,
    error::Ld2410sError,
    hal_traits::{Ld2410sSerial, Ld2410sTimer},
};

/// Command frame being pushed into the UART across ticks.
#[derive(Debug)]
pub(super) struct OutgoingFrame<I> {
    bytes: EncodedFrame,
    written: usize,
    /// One budget for the whole frame, flush included.
    deadline: I,
    pub(super) retransmit: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(super) enum TxProgress {
    /// Every byte written and flushed.
    Sent,
    /// The UART would block; the rest goes out on a later tick.
    Pending,
}

impl<IF> Ld2410sDriver<IF>
where
    IF: Ld2410sSerial + Ld2410sTimer,
{
    /// Queues an encoded command frame and writes whatever the UART accepts
    /// right away. The frame must be out within its byte time plus
    /// `write_timeout`, counted from now.
    pub(super) fn start_frame(
        &mut self,
        bytes: EncodedFrame,
        retransmit: bool,
    ) -> Result<TxProgress, Ld2410sError<IF::Error>> {
        let write_duration = self.config.serial_format.byte_duration() * bytes.len() as u32;
        let deadline = self.interface.now() + write_duration + self.config.write_timeout;
        if let Some(old) = &self.tx {
            debug!(target: "ld2410s", "dropping frame with {}/{} bytes written", old.written, old.bytes.len());
        }
        self.tx = Some(OutgoingFrame { bytes, written: 0, deadline, retransmit });
        self.pump_tx()
    }

    /// Pushes queued bytes until the UART would block. Never waits.
    ///
    /// The queue is cleared once the frame is flushed, on a transport error,
    /// or when the frame deadline passed with bytes still unsent.
    pub(super) fn pump_tx(&mut self) -> Result<TxProgress, Ld2410sError<IF::Error>> {
        let Some(tx) = self.tx.as_mut() else {
            return Ok(TxProgress::Sent);
        };

        let result = loop {
            let step = match tx.bytes.get(tx.written) {
                Some(&byte) => self.interface.write_byte(byte),
                None => match self.interface.flush() {
                    Ok(()) => break Ok(TxProgress::Sent),
                    Err(e) => Err(e),
                },
            };
            match step {
                Ok(()) => tx.written += 1,
                Err(nb::Error::WouldBlock) => break Ok(TxProgress::Pending),
                Err(nb::Error::Other(e)) => break Err(Ld2410sError::Io(e)),
            }
        };

        let result = match result {
            Ok(TxProgress::Pending) if self.interface.now() >= tx.deadline => Err(Ld2410sError::Timeout),
            other => other,
        };
        if !matches!(result, Ok(TxProgress::Pending)) {
            self.tx = None;
        }
        result
    }

    /// Pulls whatever the UART already holds into `out`, never waiting.
    ///
    /// Stops at the first `WouldBlock` or when `out` holds `limit` bytes.
    /// Bytes read before a transport error stay in `out`.
    pub(super) fn read_available<const N: usize>(
        &mut self,
        out: &mut heapless::Vec<u8, N>,
        limit: usize,
    ) -> Result<(), Ld2410sError<IF::Error>> {
        let limit = limit.min(N);
        while out.len() < limit {
            match self.interface.read_byte() {
                Ok(byte) => {
                    if out.push(byte).is_err() {
                        return Err(Ld2410sError::BufferOverflow { needed: out.len() + 1, got: N });
                    }
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(e)) => return Err(Ld2410sError::Io(e)),
            }
        }
        Ok(())
    }
}
