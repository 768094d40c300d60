// src/driver/routine.rs

use arrayvec::ArrayVec;
use core::fmt;
use log::{info, warn};

use super::sequencer::{CommandFailure, CommandOutcome};
use crate::common::command::{Command, CommandWord, GateThresholds, ReportMode, ThresholdKind, MAX_PARAMETERS};
use crate::common::ParameterId;

const MAX_STEPS: usize = 5;

/// Which multi-command session is running.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RoutineKind {
    /// Enable config, read version, serial number and parameters, disable config.
    Query,
    /// Enable config, write parameters, disable config.
    WriteParameters,
    /// Enable config, switch report mode, disable config.
    SetReportMode,
    /// Enable config, read move and still thresholds of every gate, disable config.
    ReadThresholds,
    /// Enable config, write one kind of gate thresholds, disable config.
    WriteThresholds,
}

/// Result of a finished routine, surfaced to the query button output.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RoutineResult {
    Completed,
    /// First step that failed. Config mode was left on a best-effort basis.
    Failed { step: CommandWord, failure: CommandFailure },
}

impl RoutineResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, RoutineResult::Completed)
    }
}

impl fmt::Display for RoutineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutineResult::Completed => f.write_str("completed"),
            RoutineResult::Failed { step, failure } => write!(f, "{:?} failed: {}", step, failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutineStep {
    Issue(Command),
    Finished(RoutineResult),
}

/// Sequence of commands that must run inside configuration mode.
///
/// Steps are issued one at a time through the sequencer. When a step fails
/// after config mode was entered, the routine skips to disable config so the
/// radar resumes reporting.
#[derive(Debug, Clone)]
pub struct ConfigRoutine {
    kind: RoutineKind,
    steps: ArrayVec<Command, MAX_STEPS>,
    next: usize,
    in_config: bool,
    failure: Option<(CommandWord, CommandFailure)>,
}

impl ConfigRoutine {
    pub fn query() -> Self {
        let steps = [
            Command::EnableConfig,
            Command::ReadFirmwareVersion,
            Command::ReadSerialNumber,
            Command::read_query_parameters(),
            Command::DisableConfig,
        ];
        Self::with_steps(RoutineKind::Query, steps.into_iter().collect())
    }

    pub fn write_parameters(values: ArrayVec<(ParameterId, u32), MAX_PARAMETERS>) -> Self {
        Self::bracketed(RoutineKind::WriteParameters, Command::WriteCommonParameters(values))
    }

    pub fn set_report_mode(mode: ReportMode) -> Self {
        Self::bracketed(RoutineKind::SetReportMode, Command::SetReportMode(mode))
    }

    pub fn read_gate_thresholds() -> Self {
        let steps = [
            Command::EnableConfig,
            Command::read_all_gate_thresholds(ThresholdKind::Move),
            Command::read_all_gate_thresholds(ThresholdKind::Still),
            Command::DisableConfig,
        ];
        Self::with_steps(RoutineKind::ReadThresholds, steps.into_iter().collect())
    }

    pub fn write_gate_thresholds(kind: ThresholdKind, values: GateThresholds) -> Self {
        Self::bracketed(RoutineKind::WriteThresholds, Command::WriteGateThresholds(kind, values))
    }

    fn bracketed(kind: RoutineKind, command: Command) -> Self {
        let steps = [Command::EnableConfig, command, Command::DisableConfig];
        Self::with_steps(kind, steps.into_iter().collect())
    }

    fn with_steps(kind: RoutineKind, steps: ArrayVec<Command, MAX_STEPS>) -> Self {
        ConfigRoutine { kind, steps, next: 0, in_config: false, failure: None }
    }

    pub fn kind(&self) -> RoutineKind {
        self.kind
    }

    /// First command of the routine. Call once.
    pub fn begin(&mut self) -> RoutineStep {
        info!(target: "ld2410s", "{:?} routine started", self.kind);
        self.issue_next()
    }

    /// Consumes the outcome of the step last issued and picks the next one.
    pub fn advance(&mut self, outcome: &CommandOutcome) -> RoutineStep {
        let word = outcome.command.word();
        match &outcome.result {
            Ok(_) => match word {
                CommandWord::EnableConfig => self.in_config = true,
                CommandWord::DisableConfig => self.in_config = false,
                _ => {}
            },
            Err(failure) => {
                if self.failure.is_none() {
                    self.failure = Some((word, *failure));
                }
                if word == CommandWord::DisableConfig || !self.in_config {
                    return self.finish();
                }
                warn!(target: "ld2410s", "{:?} routine aborted at {:?}, leaving config mode", self.kind, word);
                // Jump to the closing disable config step
                self.next = self.steps.len().saturating_sub(1);
            }
        }
        self.issue_next()
    }

    fn issue_next(&mut self) -> RoutineStep {
        match self.steps.get(self.next) {
            Some(command) => {
                self.next += 1;
                RoutineStep::Issue(command.clone())
            }
            None => self.finish(),
        }
    }

    fn finish(&mut self) -> RoutineStep {
        self.next = self.steps.len();
        let result = match self.failure {
            None => RoutineResult::Completed,
            Some((step, failure)) => RoutineResult::Failed { step, failure },
        };
        info!(target: "ld2410s", "{:?} routine {}", self.kind, result);
        RoutineStep::Finished(result)
    }
}
