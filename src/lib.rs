// src/lib.rs

#![no_std] // Specify no_std at the crate root

// Output bindings are boxed trait objects, so alloc is always required.
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod common;
pub mod driver;

// Re-export key types for convenience
pub use common::Ld2410sError;
pub use common::{Command, DecodedMessage, FrameCodec, PeriodicReport, ReportMode, ThresholdKind};
pub use driver::{DriverConfig, Ld2410sDriver, TickSummary};
