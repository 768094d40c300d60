// src/common/mod.rs

// --- Declare all public modules within common ---
pub mod codec;
pub mod command;
pub mod error;
pub mod frame;
pub mod hal_traits;
pub mod message;
pub mod timing;
pub mod types;
pub mod version;

// --- Re-export key types/traits/functions for easier access ---

// From codec.rs
pub use codec::{CodecStats, EncodedFrame, FrameCodec};

// From command.rs
pub use command::{
    Command, CommandDecodeError, CommandWord, GateList, GateThresholds, ParameterId, ReportMode, ThresholdKind,
};

// From error.rs
pub use error::Ld2410sError;

// From frame.rs
pub use frame::{Frame, FrameKind, Parity, SerialFormat};

// From hal_traits.rs
pub use hal_traits::{Ld2410sInstant, Ld2410sSerial, Ld2410sTimer};

// From message/mod.rs (and its sub-modules via its own `pub use`)
pub use message::{
    interpret, ConfigModeInfo, DecodedMessage, MalformedReason, ParameterValues, PeriodicReport,
    QueryData, QueryResponse, ReportKind,
};

// From types.rs
pub use types::{Field, FieldSet, GateEnergies, GateMask, TargetState};

// From version.rs
pub use version::{FirmwareVersion, SerialNumber};

// --- Feature-gated re-exports ---

#[cfg(feature = "std")]
pub use hal_traits::StdTimer;

#[cfg(feature = "impl-native")]
pub use hal_traits::NativeUart;
