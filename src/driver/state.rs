// src/driver/state.rs

use crate::common::message::PeriodicReport;
use crate::common::types::{FieldSet, GateMask};

/// The last accepted report plus a counter bumped on every accepted report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorSnapshot {
    pub sequence: u64,
    pub report: PeriodicReport,
}

/// What changed between the previous snapshot and the new one.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct Changes {
    pub fields: FieldSet,
    pub moving_gates: GateMask,
    pub still_gates: GateMask,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.moving_gates == 0 && self.still_gates == 0
    }
}

/// Owner of the authoritative snapshot.
///
/// The snapshot is only ever replaced as a whole. The driver is ticked from a
/// single context, so no locking is involved.
#[derive(Debug, Default)]
pub struct SensorState {
    current: Option<SensorSnapshot>,
}

impl SensorState {
    pub const fn new() -> Self {
        SensorState { current: None }
    }

    /// Replaces the snapshot with `report` and returns the changed subset.
    pub fn update(&mut self, report: PeriodicReport) -> Changes {
        let previous = self.current.as_ref();
        let fields = report.changed_fields(previous.map(|s| &s.report));
        let previous_gates = previous.and_then(|s| s.report.gates.as_ref());
        let (moving_gates, still_gates) = match &report.gates {
            Some(gates) => (gates.moving_changes(previous_gates), gates.still_changes(previous_gates)),
            None => (0, 0),
        };
        let sequence = previous.map_or(1, |s| s.sequence + 1);

        self.current = Some(SensorSnapshot { sequence, report });
        Changes { fields, moving_gates, still_gates }
    }

    /// Latest snapshot, `None` until the first report arrives.
    pub fn current(&self) -> Option<&SensorSnapshot> {
        self.current.as_ref()
    }

    pub fn sequence(&self) -> u64 {
        self.current.as_ref().map_or(0, |s| s.sequence)
    }
}
