// src/common/codec.rs

//! Incremental frame codec.
//!
//! Bytes are accumulated until a full frame is present. Decisions depend only
//! on buffered content, never on how the stream was chunked, so feeding one
//! byte at a time yields the same frames as feeding everything at once.

use alloc::vec::Vec as AllocVec;
use arrayvec::ArrayVec;
use heapless::Vec;
use log::{trace, warn};

use super::command::Command;
use super::frame::{
    Frame, FrameKind, FOOTER_LEN, FRAME_OVERHEAD, HEADER_LEN, LENGTH_FIELD_LEN,
    MAX_FRAME_DATA_LEN, MAX_FRAME_LEN, REPORT_INNER_CHECK, REPORT_INNER_HEAD, REPORT_INNER_TAIL,
};

/// Receive buffer capacity. Twice a maximum frame so a frame in progress
/// plus the start of the next always fit.
pub const RX_BUFFER_LEN: usize = MAX_FRAME_LEN * 2;

/// Bytes of an encoded command frame.
pub type EncodedFrame = ArrayVec<u8, MAX_FRAME_LEN>;

/// Why a candidate frame was rejected. Only surfaced through logging and counters.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameRejection {
    /// Declared length below the family minimum or above [`MAX_FRAME_DATA_LEN`].
    BadLength(usize),
    /// Footer did not match the header's family.
    BadFooter,
    /// Report head/tail/check bytes wrong.
    BadInnerMarkers,
}

/// Running totals kept by the codec.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct CodecStats {
    pub frames: u32,
    pub rejected: u32,
    pub discarded_bytes: u32,
}

/// Stream-to-frame decoder and command encoder.
#[derive(Debug)]
pub struct FrameCodec {
    buffer: Vec<u8, RX_BUFFER_LEN>,
    stats: CodecStats,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    pub const fn new() -> Self {
        FrameCodec {
            buffer: Vec::new(),
            stats: CodecStats { frames: 0, rejected: 0, discarded_bytes: 0 },
        }
    }

    pub fn stats(&self) -> CodecStats {
        self.stats
    }

    /// True while bytes of an unfinished frame are held.
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Drops whatever is buffered. Used when the link has been silent mid-frame.
    pub fn discard_partial(&mut self) {
        if !self.buffer.is_empty() {
            warn!(target: "ld2410s", "dropping {} stale bytes of partial frame", self.buffer.len());
            self.stats.discarded_bytes += self.buffer.len() as u32;
            self.buffer.clear();
        }
    }

    /// Appends `bytes` and returns every frame completed by them, in stream order.
    pub fn feed(&mut self, bytes: &[u8]) -> AllocVec<Frame> {
        let mut frames = AllocVec::new();
        for &byte in bytes {
            if self.buffer.push(byte).is_err() {
                self.drain_frames(&mut frames);
                if self.buffer.push(byte).is_err() {
                    // Unreachable while RX_BUFFER_LEN >= MAX_FRAME_LEN; keep the stream moving anyway.
                    self.consume(1);
                    self.stats.discarded_bytes += 1;
                    let _ = self.buffer.push(byte);
                }
            }
            // Cheap early exit: only scan once a frame could possibly be complete.
            if self.buffer.len() >= HEADER_LEN + LENGTH_FIELD_LEN {
                self.drain_frames(&mut frames);
            }
        }
        self.drain_frames(&mut frames);
        frames
    }

    /// Encodes `command` into a complete command frame.
    pub fn encode(command: &Command) -> EncodedFrame {
        let value = command.value_bytes();
        let intra_len = 2 + value.len();

        let mut out = EncodedFrame::new();
        out.extend(FrameKind::CommandAck.header().iter().copied());
        out.extend((intra_len as u16).to_le_bytes());
        out.extend(command.word().as_u16().to_le_bytes());
        out.extend(value.iter().copied());
        out.extend(FrameKind::CommandAck.footer().iter().copied());
        out
    }

    // --- Internal scanning ---

    fn drain_frames(&mut self, frames: &mut AllocVec<Frame>) {
        loop {
            let start = self.find_candidate();
            if start > 0 {
                trace!(target: "ld2410s", "skipping {} bytes before header", start);
                self.stats.discarded_bytes += start as u32;
                self.consume(start);
            }

            if self.buffer.len() < HEADER_LEN + LENGTH_FIELD_LEN {
                return; // Need at least header + length to go further
            }
            let kind = match FrameKind::from_header_start(self.buffer[0]) {
                Some(kind) if self.buffer[..HEADER_LEN] == kind.header()[..] => kind,
                _ => return, // find_candidate guarantees a full header here
            };

            let data_len =
                u16::from_le_bytes([self.buffer[HEADER_LEN], self.buffer[HEADER_LEN + 1]]) as usize;
            if data_len < kind.min_data_len() || data_len > MAX_FRAME_DATA_LEN {
                self.reject(FrameRejection::BadLength(data_len));
                continue;
            }

            let total = data_len + FRAME_OVERHEAD;
            if self.buffer.len() < total {
                return; // Wait for the rest of the frame
            }

            let data_start = HEADER_LEN + LENGTH_FIELD_LEN;
            let data = &self.buffer[data_start..data_start + data_len];
            let footer = &self.buffer[total - FOOTER_LEN..total];

            if footer != &kind.footer()[..] {
                self.reject(FrameRejection::BadFooter);
                continue;
            }
            if kind == FrameKind::Report && !report_markers_ok(data) {
                self.reject(FrameRejection::BadInnerMarkers);
                continue;
            }

            match Frame::new(kind, data) {
                Some(frame) => {
                    trace!(target: "ld2410s", "frame {:?} with {} data bytes", kind, data_len);
                    self.stats.frames += 1;
                    frames.push(frame);
                }
                None => self.stats.rejected += 1,
            }
            self.consume(total);
        }
    }

    /// Index of the first byte that starts (or could start) a header.
    /// Returns the buffer length if there is none.
    fn find_candidate(&self) -> usize {
        let buf = &self.buffer[..];
        (0..buf.len())
            .find(|&i| {
                FrameKind::from_header_start(buf[i]).is_some_and(|kind| {
                    let avail = (buf.len() - i).min(HEADER_LEN);
                    buf[i..i + avail] == kind.header()[..avail]
                })
            })
            .unwrap_or(buf.len())
    }

    /// Steps past the header at the front so scanning resumes at the next marker.
    fn reject(&mut self, reason: FrameRejection) {
        warn!(target: "ld2410s", "discarding frame: {:?}", reason);
        self.stats.rejected += 1;
        self.consume(1);
    }

    fn consume(&mut self, n: usize) {
        let n = n.min(self.buffer.len());
        let remaining = self.buffer.len() - n;
        self.buffer.copy_within(n.., 0);
        self.buffer.truncate(remaining);
    }
}

fn report_markers_ok(data: &[u8]) -> bool {
    let n = data.len();
    n >= 4
        && data[1] == REPORT_INNER_HEAD
        && data[n - 2] == REPORT_INNER_TAIL
        && data[n - 1] == REPORT_INNER_CHECK
}
