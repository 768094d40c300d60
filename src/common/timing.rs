// src/common/timing.rs

use core::time::Duration;

// Nominal values. The radar answers config commands within a few tens of
// milliseconds; the defaults leave generous headroom for a busy MCU loop.

// === Command/Response Timing ===

/// How long the sequencer waits for an ACK before retransmitting.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);
/// Retransmissions after the first attempt before a command is failed.
pub const MAX_COMMAND_RETRIES: u8 = 2;
/// Upper bound on pushing one encoded command into the UART.
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(50);

// === Receive Path ===

/// A partial frame with no new bytes for this long is dropped.
pub const RESYNC_TIMEOUT: Duration = Duration::from_millis(200);
/// Bytes pulled from the UART in one tick.
pub const MAX_BYTES_PER_TICK: usize = 256;
/// Minimum spacing between applied periodic reports. Zero applies every report.
pub const DEFAULT_THROTTLE: Duration = Duration::ZERO;
