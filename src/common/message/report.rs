// src/common/message/report.rs

use heapless::Vec;
use log::warn;

use super::error::MalformedReason;
use crate::common::types::{
    clamp_distance, clamp_energy, Field, FieldSet, GateEnergies, TargetState, MAX_GATES,
};

/// Report type byte for engineering-mode reports.
pub const REPORT_TYPE_ENGINEERING: u8 = 0x01;
/// Report type byte for basic reports.
pub const REPORT_TYPE_BASIC: u8 = 0x02;

/// type, head, target state, moving distance (2), moving energy, still distance (2),
/// still energy, detection distance (2).
const BASIC_FIELDS_END: usize = 11;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ReportKind {
    Basic,
    Engineering,
}

/// Decoded periodic report. Distances in centimeters, energies in percent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodicReport {
    pub kind: ReportKind,
    pub target: TargetState,
    pub moving_distance_cm: u16,
    pub moving_energy: u8,
    pub still_distance_cm: u16,
    pub still_energy: u8,
    pub detection_distance_cm: u16,
    /// Per-gate energies, engineering reports only.
    pub gates: Option<GateEnergies>,
    /// Fields whose raw value was out of range and got clamped.
    pub clamped: FieldSet,
}

impl PeriodicReport {
    /// Builds a basic report, clamping values like the decoder does.
    pub fn basic(
        target: TargetState,
        moving_distance_cm: u16,
        moving_energy: u8,
        still_distance_cm: u16,
        still_energy: u8,
        detection_distance_cm: u16,
    ) -> Self {
        let mut clamped = FieldSet::EMPTY;
        let mut distance = |field, raw| {
            let (v, c) = clamp_distance(raw);
            if c {
                clamped.insert(field);
            }
            v
        };
        let moving_distance_cm = distance(Field::MovingDistance, moving_distance_cm);
        let still_distance_cm = distance(Field::StillDistance, still_distance_cm);
        let detection_distance_cm = distance(Field::DetectionDistance, detection_distance_cm);

        let (moving_energy, c) = clamp_energy(moving_energy);
        if c {
            clamped.insert(Field::MovingEnergy);
        }
        let (still_energy, c) = clamp_energy(still_energy);
        if c {
            clamped.insert(Field::StillEnergy);
        }

        PeriodicReport {
            kind: ReportKind::Basic,
            target,
            moving_distance_cm,
            moving_energy,
            still_distance_cm,
            still_energy,
            detection_distance_cm,
            gates: None,
            clamped,
        }
    }

    /// Numeric value of a field as pushed to outputs.
    pub fn numeric(&self, field: Field) -> Option<f32> {
        match field {
            Field::MovingDistance => Some(f32::from(self.moving_distance_cm)),
            Field::StillDistance => Some(f32::from(self.still_distance_cm)),
            Field::MovingEnergy => Some(f32::from(self.moving_energy)),
            Field::StillEnergy => Some(f32::from(self.still_energy)),
            Field::DetectionDistance => Some(f32::from(self.detection_distance_cm)),
            Field::HasTarget | Field::HasMovingTarget | Field::HasStillTarget => None,
        }
    }

    /// Boolean value of a presence field.
    pub fn flag(&self, field: Field) -> Option<bool> {
        match field {
            Field::HasTarget => Some(self.target.has_target()),
            Field::HasMovingTarget => Some(self.target.has_moving_target()),
            Field::HasStillTarget => Some(self.target.has_still_target()),
            _ => None,
        }
    }

    /// Fields whose value differs from `previous`; all of them when there is none.
    pub fn changed_fields(&self, previous: Option<&PeriodicReport>) -> FieldSet {
        let Some(prev) = previous else {
            return FieldSet::ALL;
        };
        Field::ALL
            .into_iter()
            .filter(|&field| {
                if field.is_binary() {
                    self.flag(field) != prev.flag(field)
                } else {
                    self.numeric(field) != prev.numeric(field)
                }
            })
            .collect()
    }
}

/// Decodes report frame data (type through check byte). Inner markers were
/// already verified by the codec.
pub(super) fn parse_report(data: &[u8]) -> Result<PeriodicReport, MalformedReason> {
    let kind = match data.first() {
        Some(&REPORT_TYPE_BASIC) => ReportKind::Basic,
        Some(&REPORT_TYPE_ENGINEERING) => ReportKind::Engineering,
        Some(&other) => return Err(MalformedReason::UnknownReportType(other)),
        None => return Err(MalformedReason::ReportTooShort),
    };
    // Payload stops before tail + check
    let body = &data[..data.len().saturating_sub(2)];
    if body.len() < BASIC_FIELDS_END {
        return Err(MalformedReason::ReportTooShort);
    }

    let le = |i: usize| u16::from_le_bytes([body[i], body[i + 1]]);
    let (target, stray_bits) = TargetState::from_raw(body[2]);
    if stray_bits {
        warn!(target: "ld2410s", "target state {:#04x} has undefined bits", body[2]);
    }

    let mut report = PeriodicReport::basic(target, le(3), body[5], le(6), body[8], le(9));
    report.kind = kind;
    for field in report.clamped.iter() {
        warn!(target: "ld2410s", "{} out of range, clamped", field);
    }

    if kind == ReportKind::Engineering {
        report.gates = parse_gates(&body[BASIC_FIELDS_END..]);
        if report.gates.is_none() {
            warn!(target: "ld2410s", "engineering gate data inconsistent, keeping basic fields");
        }
    }
    Ok(report)
}

/// max moving gate, max still gate, moving energies, still energies, vendor bytes.
fn parse_gates(bytes: &[u8]) -> Option<GateEnergies> {
    let (&max_moving, rest) = bytes.split_first()?;
    let (&max_still, rest) = rest.split_first()?;
    let moving_count = usize::from(max_moving) + 1;
    let still_count = usize::from(max_still) + 1;
    if moving_count > MAX_GATES || still_count > MAX_GATES || rest.len() < moving_count + still_count {
        return None;
    }

    let clamp_all = |raw: &[u8]| -> Vec<u8, MAX_GATES> { raw.iter().map(|e| clamp_energy(*e).0).collect() };
    Some(GateEnergies {
        moving: clamp_all(&rest[..moving_count]),
        still: clamp_all(&rest[moving_count..moving_count + still_count]),
    })
}
