// src/driver/dispatch.rs

use alloc::boxed::Box;
use heapless::String;
use log::trace;

use super::routine::RoutineResult;
use super::sequencer::{CommandOutcome, Completion};
use super::state::{Changes, SensorSnapshot};
use crate::common::command::{Command, ParameterId, ThresholdKind};
use crate::common::types::{Field, GateMask, MAX_GATES};
use crate::common::version::SERIAL_NUMBER_LEN;

// --- Output traits ---

/// On/off entity, e.g. "has target".
pub trait BinaryOutput {
    fn publish_state(&mut self, state: bool);
}

/// Numeric entity, e.g. "moving distance".
pub trait NumericOutput {
    fn publish_state(&mut self, value: f32);
}

/// Text entity, e.g. "firmware version".
pub trait TextOutput {
    fn publish_state(&mut self, value: &str);
}

/// Receiver of the query button press result.
pub trait RoutineResultOutput {
    fn publish_result(&mut self, result: RoutineResult);
}

impl<F: FnMut(bool)> BinaryOutput for F {
    fn publish_state(&mut self, state: bool) {
        self(state)
    }
}

impl<F: FnMut(f32)> NumericOutput for F {
    fn publish_state(&mut self, value: f32) {
        self(value)
    }
}

impl<F: FnMut(&str)> TextOutput for F {
    fn publish_state(&mut self, value: &str) {
        self(value)
    }
}

impl<F: FnMut(RoutineResult)> RoutineResultOutput for F {
    fn publish_result(&mut self, result: RoutineResult) {
        self(result)
    }
}

// --- Bindings ---

/// Text values the driver can publish.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TextField {
    FirmwareVersion = 0,
    SerialNumber = 1,
    ReportMode = 2,
}

const TEXT_FIELDS: usize = 3;

enum ReportBinding {
    Binary(Box<dyn BinaryOutput>),
    Numeric(Box<dyn NumericOutput>),
}

type NumericSlot = Option<Box<dyn NumericOutput>>;
type TextValue = String<SERIAL_NUMBER_LEN>;

/// Optional sinks, one slot per value. Every slot may stay empty.
pub struct OutputDispatcher {
    report: [Option<ReportBinding>; Field::ALL.len()],
    text: [Option<Box<dyn TextOutput>>; TEXT_FIELDS],
    last_text: [Option<TextValue>; TEXT_FIELDS],
    parameters: [NumericSlot; ParameterId::QUERY_SET.len()],
    last_parameters: [Option<u32>; ParameterId::QUERY_SET.len()],
    moving_gates: [NumericSlot; MAX_GATES],
    still_gates: [NumericSlot; MAX_GATES],
    /// Indexed by [`ThresholdKind`], then gate.
    thresholds: [[NumericSlot; MAX_GATES]; 2],
    last_thresholds: [[Option<u32>; MAX_GATES]; 2],
    routine_result: Option<Box<dyn RoutineResultOutput>>,
}

impl Default for OutputDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for OutputDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OutputDispatcher").field("bound", &self.bound_count()).finish()
    }
}

impl OutputDispatcher {
    pub fn new() -> Self {
        OutputDispatcher {
            report: core::array::from_fn(|_| None),
            text: core::array::from_fn(|_| None),
            last_text: core::array::from_fn(|_| None),
            parameters: core::array::from_fn(|_| None),
            last_parameters: [None; ParameterId::QUERY_SET.len()],
            moving_gates: core::array::from_fn(|_| None),
            still_gates: core::array::from_fn(|_| None),
            thresholds: core::array::from_fn(|_| core::array::from_fn(|_| None)),
            last_thresholds: [[None; MAX_GATES]; 2],
            routine_result: None,
        }
    }

    /// Binds a presence field. Returns `false` for numeric fields.
    pub fn bind_binary(&mut self, field: Field, output: impl BinaryOutput + 'static) -> bool {
        if !field.is_binary() {
            return false;
        }
        self.report[field as usize] = Some(ReportBinding::Binary(Box::new(output)));
        true
    }

    /// Binds a distance or energy field. Returns `false` for presence fields.
    pub fn bind_numeric(&mut self, field: Field, output: impl NumericOutput + 'static) -> bool {
        if field.is_binary() {
            return false;
        }
        self.report[field as usize] = Some(ReportBinding::Numeric(Box::new(output)));
        true
    }

    pub fn bind_text(&mut self, field: TextField, output: impl TextOutput + 'static) {
        self.text[field as usize] = Some(Box::new(output));
    }

    /// Frequencies are published in hertz, everything else raw.
    pub fn bind_parameter(&mut self, id: ParameterId, output: impl NumericOutput + 'static) {
        if let Some(slot) = parameter_slot(id) {
            self.parameters[slot] = Some(Box::new(output));
        }
    }

    /// Returns `false` when `gate` is out of range.
    pub fn bind_moving_gate(&mut self, gate: usize, output: impl NumericOutput + 'static) -> bool {
        bind_gate(&mut self.moving_gates, gate, Box::new(output))
    }

    pub fn bind_still_gate(&mut self, gate: usize, output: impl NumericOutput + 'static) -> bool {
        bind_gate(&mut self.still_gates, gate, Box::new(output))
    }

    /// Threshold of one gate, published raw. Returns `false` when `gate` is out of range.
    pub fn bind_gate_threshold(
        &mut self,
        kind: ThresholdKind,
        gate: usize,
        output: impl NumericOutput + 'static,
    ) -> bool {
        bind_gate(&mut self.thresholds[kind as usize], gate, Box::new(output))
    }

    pub fn bind_routine_result(&mut self, output: impl RoutineResultOutput + 'static) {
        self.routine_result = Some(Box::new(output));
    }

    pub fn bound_count(&self) -> usize {
        let count = |slots: &[NumericSlot]| slots.iter().filter(|s| s.is_some()).count();
        self.report.iter().filter(|s| s.is_some()).count()
            + self.text.iter().filter(|s| s.is_some()).count()
            + count(&self.parameters)
            + count(&self.moving_gates)
            + count(&self.still_gates)
            + self.thresholds.iter().map(|slots| count(slots)).sum::<usize>()
            + usize::from(self.routine_result.is_some())
    }

    /// Pushes changed report values to their bound outputs. Returns the number
    /// of publish calls made.
    pub fn dispatch_changes(&mut self, changes: &Changes, snapshot: &SensorSnapshot) -> usize {
        let report = &snapshot.report;
        let mut calls = 0;
        for field in changes.fields.iter() {
            match &mut self.report[field as usize] {
                Some(ReportBinding::Binary(out)) => {
                    if let Some(state) = report.flag(field) {
                        out.publish_state(state);
                        calls += 1;
                    }
                }
                Some(ReportBinding::Numeric(out)) => {
                    if let Some(value) = report.numeric(field) {
                        out.publish_state(value);
                        calls += 1;
                    }
                }
                None => {}
            }
        }

        if let Some(gates) = &report.gates {
            calls += publish_gates(&mut self.moving_gates, changes.moving_gates, &gates.moving);
            calls += publish_gates(&mut self.still_gates, changes.still_gates, &gates.still);
        }
        if calls > 0 {
            trace!(target: "ld2410s", "report #{} published to {} outputs", snapshot.sequence, calls);
        }
        calls
    }

    /// Publishes values read or written by a successful command. Unchanged
    /// values are skipped.
    pub fn dispatch_outcome(&mut self, outcome: &CommandOutcome) -> usize {
        match &outcome.result {
            Ok(Completion::FirmwareVersion(version)) => {
                self.publish_text(TextField::FirmwareVersion, version.to_text().as_str())
            }
            Ok(Completion::SerialNumber(sn)) => self.publish_text(TextField::SerialNumber, sn.as_str()),
            Ok(Completion::Parameters(values)) => values
                .iter()
                .map(|&(id, raw)| self.publish_parameter(id, raw))
                .sum(),
            Ok(Completion::GateThresholds { kind, values }) => values
                .iter()
                .map(|&(gate, raw)| self.publish_threshold(*kind, gate, raw))
                .sum(),
            Ok(Completion::Acknowledged(_)) => self.dispatch_written(&outcome.command),
            Err(_) => 0,
        }
    }

    /// An ACK to a write means the radar now holds the written values.
    fn dispatch_written(&mut self, command: &Command) -> usize {
        match command {
            Command::WriteCommonParameters(values) => values
                .iter()
                .map(|&(id, raw)| self.publish_parameter(id, raw))
                .sum(),
            Command::WriteGateThresholds(kind, values) => values
                .iter()
                .map(|&(gate, raw)| self.publish_threshold(*kind, gate, raw))
                .sum(),
            Command::SetReportMode(mode) => self.publish_text(TextField::ReportMode, mode.name()),
            _ => 0,
        }
    }

    pub fn dispatch_routine_result(&mut self, result: RoutineResult) -> usize {
        match &mut self.routine_result {
            Some(out) => {
                out.publish_result(result);
                1
            }
            None => 0,
        }
    }

    fn publish_text(&mut self, field: TextField, value: &str) -> usize {
        let idx = field as usize;
        let Some(out) = &mut self.text[idx] else {
            return 0;
        };
        if self.last_text[idx].as_ref().is_some_and(|last| last.as_str() == value) {
            return 0;
        }
        out.publish_state(value);
        // Versions, serial numbers and mode names all fit SERIAL_NUMBER_LEN
        self.last_text[idx] = String::try_from(value).ok();
        1
    }

    fn publish_parameter(&mut self, id: ParameterId, raw: u32) -> usize {
        let Some(slot) = parameter_slot(id) else {
            return 0;
        };
        let Some(out) = &mut self.parameters[slot] else {
            return 0;
        };
        if self.last_parameters[slot] == Some(raw) {
            return 0;
        }
        out.publish_state(parameter_value(id, raw));
        self.last_parameters[slot] = Some(raw);
        1
    }

    fn publish_threshold(&mut self, kind: ThresholdKind, gate: u8, raw: u32) -> usize {
        let gate = usize::from(gate);
        let Some(Some(out)) = self.thresholds[kind as usize].get_mut(gate) else {
            return 0;
        };
        let last = &mut self.last_thresholds[kind as usize][gate];
        if *last == Some(raw) {
            return 0;
        }
        out.publish_state(raw as f32);
        *last = Some(raw);
        1
    }
}

fn parameter_slot(id: ParameterId) -> Option<usize> {
    ParameterId::QUERY_SET.iter().position(|&p| p == id)
}

/// Scales a raw parameter to the unit it is published in.
pub fn parameter_value(id: ParameterId, raw: u32) -> f32 {
    match id {
        ParameterId::StatusReportFrequency | ParameterId::DistanceReportFrequency => raw as f32 / 10.0,
        _ => raw as f32,
    }
}

fn bind_gate(slots: &mut [NumericSlot; MAX_GATES], gate: usize, output: Box<dyn NumericOutput>) -> bool {
    match slots.get_mut(gate) {
        Some(slot) => {
            *slot = Some(output);
            true
        }
        None => false,
    }
}

fn publish_gates(slots: &mut [NumericSlot; MAX_GATES], changed: GateMask, energies: &[u8]) -> usize {
    let mut calls = 0;
    for (gate, (slot, energy)) in slots.iter_mut().zip(energies).enumerate() {
        if changed & (1 << gate) == 0 {
            continue;
        }
        if let Some(out) = slot {
            out.publish_state(f32::from(*energy));
            calls += 1;
        }
    }
    calls
}
