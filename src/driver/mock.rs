// src/driver/mock.rs
//
// Scripted radar used by the driver tests. Command frames written by the
// driver are decoded and, unless muted, answered with ACK frames that the
// next read picks up.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::time::Duration;

use crate::common::{
    command::{Command, CommandWord, ParameterId, ReportMode},
    types::MAX_GATES,
    hal_traits::{Ld2410sSerial, Ld2410sTimer},
    FrameCodec, FirmwareVersion,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MockInstant(pub u64);

impl core::ops::Add<Duration> for MockInstant {
    type Output = Self;
    fn add(self, rhs: Duration) -> Self {
        MockInstant(self.0.saturating_add(rhs.as_micros() as u64))
    }
}

impl core::ops::Sub<MockInstant> for MockInstant {
    type Output = Duration;
    fn sub(self, rhs: MockInstant) -> Duration {
        Duration::from_micros(self.0.saturating_sub(rhs.0))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MockCommError;

pub struct MockRadar {
    pub current_time_us: u64,
    pub rx: VecDeque<u8>,
    /// Every byte the driver wrote, in order.
    pub written: Vec<u8>,
    pending_tx: Vec<u8>,
    pub commands: Vec<Command>,
    /// Decoded but never answered.
    pub muted: bool,
    pub reject: Option<(CommandWord, u16)>,
    pub version: FirmwareVersion,
    pub serial: &'static str,
    pub parameters: Vec<(ParameterId, u32)>,
    /// Indexed by `ThresholdKind`, then gate.
    pub thresholds: [[u32; MAX_GATES]; 2],
    pub report_mode: ReportMode,
    pub fail_next_read: bool,
    pub fail_writes: bool,
    /// Every write reports WouldBlock.
    pub block_writes: bool,
    /// After accepting a byte, writes report WouldBlock until this much time passed.
    pub write_gap_us: u64,
    next_write_at: u64,
    /// `write_byte` calls, accepted or not.
    pub write_calls: usize,
    host_codec: FrameCodec,
}

impl MockRadar {
    pub fn new() -> Self {
        MockRadar {
            current_time_us: 0,
            rx: VecDeque::new(),
            written: Vec::new(),
            pending_tx: Vec::new(),
            commands: Vec::new(),
            muted: false,
            reject: None,
            version: FirmwareVersion::new(1, 2, 22),
            serial: "SN-0042",
            parameters: alloc::vec![
                (ParameterId::FarthestGate, 12),
                (ParameterId::NearestGate, 0),
                (ParameterId::UnmannedDelay, 10),
                (ParameterId::StatusReportFrequency, 80),
                (ParameterId::DistanceReportFrequency, 80),
                (ParameterId::ResponseSpeed, 5),
            ],
            thresholds: [
                core::array::from_fn(|gate| 40 + gate as u32),
                core::array::from_fn(|gate| 30 + gate as u32),
            ],
            report_mode: ReportMode::Basic,
            fail_next_read: false,
            fail_writes: false,
            block_writes: false,
            write_gap_us: 0,
            next_write_at: 0,
            write_calls: 0,
            host_codec: FrameCodec::new(),
        }
    }

    pub fn advance_time(&mut self, us: u64) {
        self.current_time_us = self.current_time_us.saturating_add(us);
    }

    pub fn stage(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    pub fn command_words(&self) -> Vec<CommandWord> {
        self.commands.iter().map(Command::word).collect()
    }

    fn parameter(&self, id: ParameterId) -> u32 {
        self.parameters.iter().find(|(p, _)| *p == id).map_or(0, |(_, v)| *v)
    }

    fn answer(&mut self, command: &Command) {
        let word = command.word();
        if let Some((rejected, status)) = self.reject {
            if rejected == word {
                let frame = ack_frame(word, status, &[]);
                self.stage(&frame);
                return;
            }
        }
        let mut payload = Vec::new();
        match command {
            Command::EnableConfig => payload.extend_from_slice(&[0x01, 0x00, 0x40, 0x00]),
            Command::DisableConfig => {}
            Command::ReadFirmwareVersion => {
                for part in [self.version.major, self.version.minor, self.version.patch] {
                    payload.extend_from_slice(&part.to_le_bytes());
                }
            }
            Command::ReadSerialNumber => {
                payload.extend_from_slice(&(self.serial.len() as u16).to_le_bytes());
                payload.extend_from_slice(self.serial.as_bytes());
            }
            Command::ReadCommonParameters(ids) => {
                for id in ids {
                    payload.extend_from_slice(&self.parameter(*id).to_le_bytes());
                }
            }
            Command::WriteCommonParameters(values) => {
                for (id, value) in values {
                    self.parameters.retain(|(p, _)| p != id);
                    self.parameters.push((*id, *value));
                }
            }
            Command::SetReportMode(mode) => self.report_mode = *mode,
            Command::ReadGateThresholds(kind, gates) => {
                for gate in gates {
                    payload.extend_from_slice(&self.thresholds[*kind as usize][usize::from(*gate)].to_le_bytes());
                }
            }
            Command::WriteGateThresholds(kind, values) => {
                for (gate, value) in values {
                    self.thresholds[*kind as usize][usize::from(*gate)] = *value;
                }
            }
        }
        let frame = ack_frame(word, 0, &payload);
        self.stage(&frame);
    }
}

impl Ld2410sTimer for MockRadar {
    type Instant = MockInstant;
    fn now(&self) -> Self::Instant {
        MockInstant(self.current_time_us)
    }
}

impl Ld2410sSerial for MockRadar {
    type Error = MockCommError;

    fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
        if self.fail_next_read {
            self.fail_next_read = false;
            return Err(nb::Error::Other(MockCommError));
        }
        self.rx.pop_front().ok_or(nb::Error::WouldBlock)
    }

    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        self.write_calls += 1;
        if self.fail_writes {
            return Err(nb::Error::Other(MockCommError));
        }
        if self.block_writes || self.current_time_us < self.next_write_at {
            return Err(nb::Error::WouldBlock);
        }
        self.next_write_at = self.current_time_us + self.write_gap_us;
        self.written.push(byte);
        self.pending_tx.push(byte);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        let pending = core::mem::take(&mut self.pending_tx);
        for frame in self.host_codec.feed(&pending) {
            if let Ok(command) = Command::from_frame(&frame) {
                if !self.muted {
                    self.answer(&command);
                }
                self.commands.push(command);
            }
        }
        Ok(())
    }
}

// --- Frame builders ---

pub fn ack_frame(word: CommandWord, status: u16, payload: &[u8]) -> Vec<u8> {
    let mut v = alloc::vec![0xFD, 0xFC, 0xFB, 0xFA];
    v.extend_from_slice(&((4 + payload.len()) as u16).to_le_bytes());
    v.extend_from_slice(&word.ack_word().to_le_bytes());
    v.extend_from_slice(&status.to_le_bytes());
    v.extend_from_slice(payload);
    v.extend_from_slice(&[0x04, 0x03, 0x02, 0x01]);
    v
}

pub fn report_frame(state: u8, moving: u16, moving_energy: u8, still: u16, still_energy: u8, detect: u16) -> Vec<u8> {
    let mut data = alloc::vec![0x02, 0xAA, state];
    data.extend_from_slice(&moving.to_le_bytes());
    data.push(moving_energy);
    data.extend_from_slice(&still.to_le_bytes());
    data.push(still_energy);
    data.extend_from_slice(&detect.to_le_bytes());
    data.extend_from_slice(&[0x55, 0x00]);

    let mut v = alloc::vec![0xF4, 0xF3, 0xF2, 0xF1];
    v.extend_from_slice(&(data.len() as u16).to_le_bytes());
    v.extend_from_slice(&data);
    v.extend_from_slice(&[0xF8, 0xF7, 0xF6, 0xF5]);
    v
}
