// src/common/hal_traits.rs

use core::fmt::Debug;
use core::ops::{Add, Sub};
use core::time::Duration;

/// Monotonic point in time as seen by the driver.
///
/// Any counter works as long as it is monotonic and converts differences
/// into a `Duration` (e.g. a microsecond tick counter on an MCU).
pub trait Ld2410sInstant:
    Copy + Ord + Debug + Add<Duration, Output = Self> + Sub<Self, Output = Duration>
{
}

impl<T> Ld2410sInstant for T where
    T: Copy + Ord + Debug + Add<Duration, Output = T> + Sub<T, Output = Duration>
{
}

/// Abstraction over the wall clock checked on each driver tick.
pub trait Ld2410sTimer {
    type Instant: Ld2410sInstant;

    /// Returns the current instant. Must never block.
    fn now(&self) -> Self::Instant;
}

/// Abstraction for non-blocking serial communication with the radar.
///
/// The link runs 8N1 at a fixed baud rate (see `frame::SerialFormat`);
/// configuring the peripheral is the HAL's job.
pub trait Ld2410sSerial {
    /// Associated error type for communication errors.
    type Error: Debug;

    /// Attempts to read a single byte from the serial interface.
    ///
    /// Returns `Ok(byte)` if a byte was read, or `Err(nb::Error::WouldBlock)`
    /// if no byte is available yet. Other errors are returned as `Err(nb::Error::Other(Self::Error))`.
    fn read_byte(&mut self) -> nb::Result<u8, Self::Error>;

    /// Attempts to write a single byte to the serial interface.
    ///
    /// Returns `Ok(())` if the byte was accepted for transmission, or `Err(nb::Error::WouldBlock)`
    /// if the write buffer is full.
    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error>;

    /// Attempts to flush the transmit buffer, ensuring all written bytes have been sent.
    fn flush(&mut self) -> nb::Result<(), Self::Error>;
}

/// Clock backed by `std::time::Instant`, for hosts talking to the radar
/// through a USB-UART bridge.
#[cfg(feature = "std")]
#[derive(Debug, Default, Clone, Copy)]
pub struct StdTimer;

#[cfg(feature = "std")]
impl Ld2410sTimer for StdTimer {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }
}

/// Adapts a HAL UART exposing `embedded-io` traits to [`Ld2410sSerial`].
///
/// `ReadReady` is what keeps reads non-blocking: a byte is only pulled
/// when the peripheral reports one is pending.
#[cfg(feature = "impl-native")]
#[derive(Debug)]
pub struct NativeUart<U> {
    uart: U,
}

#[cfg(feature = "impl-native")]
impl<U> NativeUart<U> {
    pub fn new(uart: U) -> Self {
        NativeUart { uart }
    }

    /// Release the underlying UART
    pub fn free(self) -> U {
        self.uart
    }
}

#[cfg(feature = "impl-native")]
impl<U> Ld2410sSerial for NativeUart<U>
where
    U: embedded_io::Read + embedded_io::ReadReady + embedded_io::Write,
{
    type Error = U::Error;

    fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
        if !self.uart.read_ready().map_err(nb::Error::Other)? {
            return Err(nb::Error::WouldBlock);
        }
        let mut byte = [0u8; 1];
        match self.uart.read(&mut byte) {
            Ok(1) => Ok(byte[0]),
            Ok(_) => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(e)),
        }
    }

    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        match self.uart.write(&[byte]) {
            Ok(0) => Err(nb::Error::WouldBlock),
            Ok(_) => Ok(()),
            Err(e) => Err(nb::Error::Other(e)),
        }
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        self.uart.flush().map_err(nb::Error::Other)
    }
}
