// src/driver/config.rs

use core::time::Duration;
use log::info;

use crate::common::{timing, SerialFormat};

/// Tunables of [`Ld2410sDriver`](super::Ld2410sDriver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// How long to wait for an ACK before retransmitting.
    pub response_timeout: Duration,
    /// Retransmissions after the first attempt.
    pub max_retries: u8,
    /// Budget for pushing one command frame into the UART.
    pub write_timeout: Duration,
    /// Silence after which a half-received frame is dropped.
    pub resync_timeout: Duration,
    /// Upper bound on bytes drained from the UART per tick.
    pub max_bytes_per_tick: usize,
    /// Minimum spacing between accepted reports. Zero accepts every report.
    pub throttle: Duration,
    /// Run the configuration query routine from [`start`](super::Ld2410sDriver::start).
    pub query_on_start: bool,
    pub serial_format: SerialFormat,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            response_timeout: timing::RESPONSE_TIMEOUT,
            max_retries: timing::MAX_COMMAND_RETRIES,
            write_timeout: timing::WRITE_TIMEOUT,
            resync_timeout: timing::RESYNC_TIMEOUT,
            max_bytes_per_tick: timing::MAX_BYTES_PER_TICK,
            throttle: timing::DEFAULT_THROTTLE,
            query_on_start: true,
            serial_format: SerialFormat::LD2410S,
        }
    }
}

impl DriverConfig {
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_resync_timeout(mut self, timeout: Duration) -> Self {
        self.resync_timeout = timeout;
        self
    }

    /// Clamped to `1..=timing::MAX_BYTES_PER_TICK`.
    pub fn with_max_bytes_per_tick(mut self, max: usize) -> Self {
        self.max_bytes_per_tick = max.clamp(1, timing::MAX_BYTES_PER_TICK);
        self
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_query_on_start(mut self, enabled: bool) -> Self {
        self.query_on_start = enabled;
        self
    }

    pub fn with_serial_format(mut self, format: SerialFormat) -> Self {
        self.serial_format = format;
        self
    }

    pub(super) fn log(&self) {
        info!(target: "ld2410s", "LD2410S:");
        info!(
            target: "ld2410s",
            "  UART: {} baud, {} data bits, {:?} parity, {} stop bits",
            self.serial_format.baud_rate,
            self.serial_format.data_bits,
            self.serial_format.parity,
            self.serial_format.stop_bits
        );
        info!(
            target: "ld2410s",
            "  Response timeout: {:?}, retries: {}",
            self.response_timeout,
            self.max_retries
        );
        info!(target: "ld2410s", "  Throttle: {:?}", self.throttle);
        info!(target: "ld2410s", "  Query on start: {}", self.query_on_start);
    }
}
