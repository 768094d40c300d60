// src/driver/mod.rs

mod config;
mod dispatch;
mod io_helpers;
mod routine;
mod sequencer;
mod state;

#[cfg(test)]
mod mock;
#[cfg(test)]
mod tests;

pub use config::DriverConfig;
pub use dispatch::{
    parameter_value, BinaryOutput, NumericOutput, OutputDispatcher, RoutineResultOutput, TextField, TextOutput,
};
pub use routine::{ConfigRoutine, RoutineKind, RoutineResult, RoutineStep};
pub use sequencer::{
    CommandFailure, CommandOutcome, CommandSequencer, Completion, PendingCommand, PollAction, SequencerBusy,
    SequencerState,
};
pub use state::{Changes, SensorSnapshot, SensorState};

use arrayvec::ArrayVec;
use log::{debug, info, warn};

use io_helpers::OutgoingFrame;

use crate::common::{
    command::{Command, GateThresholds, ParameterId, ReportMode, ThresholdKind, MAX_PARAMETERS},
    error::Ld2410sError,
    hal_traits::{Ld2410sSerial, Ld2410sTimer},
    message::{interpret, DecodedMessage, ParameterValues, PeriodicReport},
    timing,
    types::{Field, MAX_GATES},
    version::{FirmwareVersion, SerialNumber},
    CodecStats, FrameCodec,
};

/// What a single [`Ld2410sDriver::tick`] did.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TickSummary {
    pub bytes_read: usize,
    pub frames: usize,
    pub reports_applied: usize,
    pub reports_throttled: usize,
    pub malformed: usize,
    /// Command outcomes produced (answered, rejected, or exhausted).
    pub outcomes: usize,
    /// Publish calls made to bound outputs.
    pub published: usize,
    /// The UART reported a read or write error. The tick still completed.
    pub transport_error: bool,
    /// A stale partial frame was dropped.
    pub resynced: bool,
}

/// LD2410S driver instance.
///
/// Owns the UART/clock interface and every piece of protocol state. All work
/// happens inside [`tick`](Self::tick), which never waits for the radar: it
/// writes what the UART accepts of a queued command, drains what the UART
/// already holds, advances the command sequencer and pushes changed values to
/// the bound outputs.
pub struct Ld2410sDriver<IF>
where
    IF: Ld2410sSerial + Ld2410sTimer,
{
    interface: IF,
    config: DriverConfig,
    codec: FrameCodec,
    state: SensorState,
    sequencer: CommandSequencer<IF::Instant>,
    outputs: OutputDispatcher,
    routine: Option<ConfigRoutine>,
    tx: Option<OutgoingFrame<IF::Instant>>,
    /// Last acknowledged enable/disable config.
    config_mode: bool,
    last_rx: Option<IF::Instant>,
    last_report_at: Option<IF::Instant>,
    firmware_version: Option<FirmwareVersion>,
    serial_number: Option<SerialNumber>,
    parameters: Option<ParameterValues>,
    report_mode: Option<ReportMode>,
    /// Indexed by [`ThresholdKind`].
    gate_thresholds: [Option<GateThresholds>; 2],
    last_outcome: Option<CommandOutcome>,
    last_routine_result: Option<RoutineResult>,
}

impl<IF> core::fmt::Debug for Ld2410sDriver<IF>
where
    IF: Ld2410sSerial + Ld2410sTimer,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ld2410sDriver")
            .field("config", &self.config)
            .field("sequencer", &self.sequencer.state())
            .field("routine", &self.routine.as_ref().map(ConfigRoutine::kind))
            .field("tx_pending", &self.tx.is_some())
            .field("config_mode", &self.config_mode)
            .field("sequence", &self.state.sequence())
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

impl<IF> Ld2410sDriver<IF>
where
    IF: Ld2410sSerial + Ld2410sTimer,
{
    pub fn new(interface: IF, config: DriverConfig) -> Self {
        Ld2410sDriver {
            interface,
            sequencer: CommandSequencer::new(config.response_timeout, config.max_retries),
            config,
            codec: FrameCodec::new(),
            state: SensorState::new(),
            outputs: OutputDispatcher::new(),
            routine: None,
            tx: None,
            config_mode: false,
            last_rx: None,
            last_report_at: None,
            firmware_version: None,
            serial_number: None,
            parameters: None,
            report_mode: None,
            gate_thresholds: [None, None],
            last_outcome: None,
            last_routine_result: None,
        }
    }

    /// Release the interface.
    pub fn free(self) -> IF {
        self.interface
    }

    pub fn interface_mut(&mut self) -> &mut IF {
        &mut self.interface
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Where outputs are bound. Unbound values are simply not published.
    pub fn outputs_mut(&mut self) -> &mut OutputDispatcher {
        &mut self.outputs
    }

    // --- Output registration ---

    pub fn set_has_target_binary_sensor(&mut self, output: impl BinaryOutput + 'static) {
        self.outputs.bind_binary(Field::HasTarget, output);
    }

    pub fn set_has_moving_target_binary_sensor(&mut self, output: impl BinaryOutput + 'static) {
        self.outputs.bind_binary(Field::HasMovingTarget, output);
    }

    pub fn set_has_still_target_binary_sensor(&mut self, output: impl BinaryOutput + 'static) {
        self.outputs.bind_binary(Field::HasStillTarget, output);
    }

    /// Centimeters.
    pub fn set_moving_distance_sensor(&mut self, output: impl NumericOutput + 'static) {
        self.outputs.bind_numeric(Field::MovingDistance, output);
    }

    pub fn set_still_distance_sensor(&mut self, output: impl NumericOutput + 'static) {
        self.outputs.bind_numeric(Field::StillDistance, output);
    }

    pub fn set_detection_distance_sensor(&mut self, output: impl NumericOutput + 'static) {
        self.outputs.bind_numeric(Field::DetectionDistance, output);
    }

    /// Percent, 0 to 100.
    pub fn set_moving_energy_sensor(&mut self, output: impl NumericOutput + 'static) {
        self.outputs.bind_numeric(Field::MovingEnergy, output);
    }

    pub fn set_still_energy_sensor(&mut self, output: impl NumericOutput + 'static) {
        self.outputs.bind_numeric(Field::StillEnergy, output);
    }

    pub fn set_version_text_sensor(&mut self, output: impl TextOutput + 'static) {
        self.outputs.bind_text(TextField::FirmwareVersion, output);
    }

    pub fn set_serial_number_text_sensor(&mut self, output: impl TextOutput + 'static) {
        self.outputs.bind_text(TextField::SerialNumber, output);
    }

    pub fn set_parameter_sensor(&mut self, id: ParameterId, output: impl NumericOutput + 'static) {
        self.outputs.bind_parameter(id, output);
    }

    /// Returns `false` when `gate` is out of range.
    pub fn set_gate_move_sensor(&mut self, gate: usize, output: impl NumericOutput + 'static) -> bool {
        self.outputs.bind_moving_gate(gate, output)
    }

    pub fn set_gate_still_sensor(&mut self, gate: usize, output: impl NumericOutput + 'static) -> bool {
        self.outputs.bind_still_gate(gate, output)
    }

    pub fn set_report_mode_text_sensor(&mut self, output: impl TextOutput + 'static) {
        self.outputs.bind_text(TextField::ReportMode, output);
    }

    /// Trigger threshold of one gate. Returns `false` when `gate` is out of range.
    pub fn set_gate_move_threshold_number(&mut self, gate: usize, output: impl NumericOutput + 'static) -> bool {
        self.outputs.bind_gate_threshold(ThresholdKind::Move, gate, output)
    }

    /// Hold threshold of one gate. Returns `false` when `gate` is out of range.
    pub fn set_gate_still_threshold_number(&mut self, gate: usize, output: impl NumericOutput + 'static) -> bool {
        self.outputs.bind_gate_threshold(ThresholdKind::Still, gate, output)
    }

    /// Receives the result of every [`press_query`](Self::press_query).
    pub fn set_query_button(&mut self, output: impl RoutineResultOutput + 'static) {
        self.outputs.bind_routine_result(output);
    }

    // --- Lifecycle ---

    /// Logs the configuration and, if enabled, runs the query routine.
    pub fn start(&mut self) -> Result<(), Ld2410sError<IF::Error>> {
        self.log_config();
        if self.config.query_on_start {
            self.press_query()?;
        }
        Ok(())
    }

    pub fn log_config(&self) {
        self.config.log();
        info!(target: "ld2410s", "  Outputs bound: {}", self.outputs.bound_count());
        if let Some(version) = &self.firmware_version {
            info!(target: "ld2410s", "  Firmware version: {}", version);
        }
        if let Some(sn) = &self.serial_number {
            info!(target: "ld2410s", "  Serial number: {}", sn);
        }
        if let Some(mode) = self.report_mode {
            info!(target: "ld2410s", "  Report mode: {}", mode);
        }
    }

    /// One unit of cooperative work. Never blocks on the radar.
    pub fn tick(&mut self) -> TickSummary {
        let mut summary = TickSummary::default();
        let now = self.interface.now();

        if self.tx.is_some() {
            self.service_tx(now, &mut summary);
        }

        let mut rx: heapless::Vec<u8, { timing::MAX_BYTES_PER_TICK }> = heapless::Vec::new();
        if let Err(e) = self.read_available(&mut rx, self.config.max_bytes_per_tick) {
            warn!(target: "ld2410s", "UART read failed: {:?}", e);
            summary.transport_error = true;
        }
        summary.bytes_read = rx.len();

        if !rx.is_empty() {
            self.last_rx = Some(now);
        } else if self.codec.has_partial()
            && self.last_rx.is_some_and(|t| now - t >= self.config.resync_timeout)
        {
            self.codec.discard_partial();
            summary.resynced = true;
        }

        for frame in self.codec.feed(&rx) {
            summary.frames += 1;
            self.route(interpret(&frame), now, &mut summary);
        }

        match self.sequencer.poll(now) {
            PollAction::None => {}
            PollAction::Retransmit(frame) => {
                // A failed retransmit counts as a lost attempt; the next timeout retries again
                if let Err(e) = self.start_frame(frame, true) {
                    warn!(target: "ld2410s", "retransmit failed: {:?}", e);
                }
            }
            PollAction::Exhausted(outcome) => {
                self.tx = None;
                self.handle_outcome(outcome, now, &mut summary)
            }
        }
        summary
    }

    // --- Commands ---

    /// Starts the query routine (the "query parameters" button).
    pub fn press_query(&mut self) -> Result<(), Ld2410sError<IF::Error>> {
        self.start_routine(ConfigRoutine::query())
    }

    /// Writes common parameters inside a config-mode session.
    pub fn write_parameters(&mut self, values: &[(ParameterId, u32)]) -> Result<(), Ld2410sError<IF::Error>> {
        if values.is_empty() {
            return Err(Ld2410sError::EmptyRequest);
        }
        if values.len() > MAX_PARAMETERS {
            return Err(Ld2410sError::BufferOverflow { needed: values.len(), got: MAX_PARAMETERS });
        }
        let values: ArrayVec<(ParameterId, u32), MAX_PARAMETERS> = values.iter().copied().collect();
        self.start_routine(ConfigRoutine::write_parameters(values))
    }

    /// Switches the report format inside a config-mode session. Per-gate
    /// energies only arrive in [`ReportMode::Engineering`].
    pub fn set_report_mode(&mut self, mode: ReportMode) -> Result<(), Ld2410sError<IF::Error>> {
        self.start_routine(ConfigRoutine::set_report_mode(mode))
    }

    /// Reads move and still thresholds of every gate.
    pub fn read_gate_thresholds(&mut self) -> Result<(), Ld2410sError<IF::Error>> {
        self.start_routine(ConfigRoutine::read_gate_thresholds())
    }

    /// Writes `(gate, threshold)` pairs of one kind inside a config-mode session.
    pub fn write_gate_thresholds(
        &mut self,
        kind: ThresholdKind,
        values: &[(u8, u32)],
    ) -> Result<(), Ld2410sError<IF::Error>> {
        if values.is_empty() {
            return Err(Ld2410sError::EmptyRequest);
        }
        if values.len() > MAX_GATES {
            return Err(Ld2410sError::BufferOverflow { needed: values.len(), got: MAX_GATES });
        }
        if let Some(&(gate, _)) = values.iter().find(|(gate, _)| usize::from(*gate) >= MAX_GATES) {
            return Err(Ld2410sError::InvalidGate(gate));
        }
        let values: GateThresholds = values.iter().copied().collect();
        self.start_routine(ConfigRoutine::write_gate_thresholds(kind, values))
    }

    /// Sends one command outside any routine. The outcome is available
    /// through [`take_last_outcome`](Self::take_last_outcome) once it arrives.
    ///
    /// Everything but enable config needs an acknowledged enable config first;
    /// the radar ignores such commands otherwise.
    pub fn issue_command(&mut self, command: Command) -> Result<(), Ld2410sError<IF::Error>> {
        self.ensure_idle()?;
        if command.requires_config_mode() && !self.config_mode {
            return Err(Ld2410sError::NotInConfigMode { command: command.word() });
        }
        let now = self.interface.now();
        let frame = self
            .sequencer
            .issue(command, now)
            .map_err(|busy| Ld2410sError::Busy { pending: busy.pending })?;
        if let Err(e) = self.start_frame(frame, false) {
            self.last_outcome = self.sequencer.abort(CommandFailure::NotSent);
            return Err(e);
        }
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        !self.sequencer.is_idle() || self.routine.is_some()
    }

    // --- Accessors ---

    /// Latest accepted report, `None` before the first one.
    pub fn current(&self) -> Option<&SensorSnapshot> {
        self.state.current()
    }

    pub fn firmware_version(&self) -> Option<&FirmwareVersion> {
        self.firmware_version.as_ref()
    }

    pub fn serial_number(&self) -> Option<&SerialNumber> {
        self.serial_number.as_ref()
    }

    pub fn parameters(&self) -> Option<&ParameterValues> {
        self.parameters.as_ref()
    }

    pub fn report_mode(&self) -> Option<ReportMode> {
        self.report_mode
    }

    pub fn gate_thresholds(&self, kind: ThresholdKind) -> Option<&GateThresholds> {
        self.gate_thresholds[kind as usize].as_ref()
    }

    /// True between an acknowledged enable config and the next acknowledged disable.
    pub fn in_config_mode(&self) -> bool {
        self.config_mode
    }

    pub fn take_last_outcome(&mut self) -> Option<CommandOutcome> {
        self.last_outcome.take()
    }

    pub fn last_routine_result(&self) -> Option<RoutineResult> {
        self.last_routine_result
    }

    pub fn codec_stats(&self) -> CodecStats {
        self.codec.stats()
    }

    pub fn sequencer_state(&self) -> &SequencerState<IF::Instant> {
        self.sequencer.state()
    }

    // --- Internals ---

    fn ensure_idle(&self) -> Result<(), Ld2410sError<IF::Error>> {
        match self.sequencer.pending() {
            Some(p) => Err(Ld2410sError::Busy { pending: p.command.word() }),
            None => Ok(()),
        }
    }

    fn start_routine(&mut self, mut routine: ConfigRoutine) -> Result<(), Ld2410sError<IF::Error>> {
        self.ensure_idle()?;
        let now = self.interface.now();
        let first = match routine.begin() {
            RoutineStep::Issue(command) => command,
            RoutineStep::Finished(result) => {
                self.last_routine_result = Some(result);
                return Ok(());
            }
        };
        self.routine = Some(routine);
        if let Err(outcome) = self.transmit(first, now) {
            let mut summary = TickSummary::default();
            self.handle_outcome(outcome, now, &mut summary);
        }
        Ok(())
    }

    /// Issues and writes `command`. On failure the sequencer is idle again and
    /// the returned outcome describes why.
    fn transmit(&mut self, command: Command, now: IF::Instant) -> Result<(), CommandOutcome> {
        let frame = match self.sequencer.issue(command.clone(), now) {
            Ok(frame) => frame,
            Err(busy) => {
                warn!(target: "ld2410s", "cannot send {}: {:?} still pending", command, busy.pending);
                return Err(CommandOutcome::failed(command, CommandFailure::NotSent));
            }
        };
        match self.start_frame(frame, false) {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(target: "ld2410s", "writing {} failed: {:?}", command, e);
                Err(self
                    .sequencer
                    .abort(CommandFailure::NotSent)
                    .unwrap_or_else(|| CommandOutcome::failed(command, CommandFailure::NotSent)))
            }
        }
    }

    /// Continues a queued frame. A first attempt that cannot be written fails
    /// its command; a retransmit is just a lost attempt.
    fn service_tx(&mut self, now: IF::Instant, summary: &mut TickSummary) {
        let retransmit = self.tx.as_ref().is_some_and(|tx| tx.retransmit);
        let Err(e) = self.pump_tx() else {
            return;
        };
        if matches!(e, Ld2410sError::Io(_)) {
            summary.transport_error = true;
        }
        if retransmit {
            warn!(target: "ld2410s", "retransmit failed: {:?}", e);
            return;
        }
        warn!(target: "ld2410s", "writing command failed: {:?}", e);
        if let Some(outcome) = self.sequencer.abort(CommandFailure::NotSent) {
            self.handle_outcome(outcome, now, summary);
        }
    }

    fn route(&mut self, message: DecodedMessage, now: IF::Instant, summary: &mut TickSummary) {
        match message {
            DecodedMessage::PeriodicReport(report) => self.apply_report(report, now, summary),
            DecodedMessage::Malformed(_) => summary.malformed += 1,
            response => {
                if let Some(outcome) = self.sequencer.on_response(&response) {
                    self.handle_outcome(outcome, now, summary);
                }
            }
        }
    }

    fn apply_report(&mut self, report: PeriodicReport, now: IF::Instant, summary: &mut TickSummary) {
        let throttle = self.config.throttle;
        if !throttle.is_zero() && self.last_report_at.is_some_and(|t| now - t < throttle) {
            summary.reports_throttled += 1;
            return;
        }
        self.last_report_at = Some(now);

        let changes = self.state.update(report);
        summary.reports_applied += 1;
        if changes.is_empty() {
            return;
        }
        if let Some(snapshot) = self.state.current() {
            summary.published += self.outputs.dispatch_changes(&changes, snapshot);
        }
    }

    /// Surfaces an outcome and, inside a routine, moves on to the next step.
    fn handle_outcome(&mut self, mut outcome: CommandOutcome, now: IF::Instant, summary: &mut TickSummary) {
        loop {
            summary.outcomes += 1;
            summary.published += self.outputs.dispatch_outcome(&outcome);
            self.record(&outcome);

            let Some(routine) = self.routine.as_mut() else {
                self.last_outcome = Some(outcome);
                return;
            };
            let kind = routine.kind();
            match routine.advance(&outcome) {
                RoutineStep::Issue(next) => match self.transmit(next, now) {
                    Ok(()) => return,
                    Err(failed) => outcome = failed,
                },
                RoutineStep::Finished(result) => {
                    self.routine = None;
                    self.last_routine_result = Some(result);
                    self.last_outcome = Some(outcome);
                    if kind == RoutineKind::Query {
                        summary.published += self.outputs.dispatch_routine_result(result);
                    }
                    return;
                }
            }
        }
    }

    fn record(&mut self, outcome: &CommandOutcome) {
        match &outcome.result {
            Ok(Completion::FirmwareVersion(version)) => {
                debug!(target: "ld2410s", "firmware version {}", version);
                self.firmware_version = Some(*version);
            }
            Ok(Completion::SerialNumber(sn)) => {
                debug!(target: "ld2410s", "serial number {}", sn);
                self.serial_number = Some(sn.clone());
            }
            Ok(Completion::Parameters(values)) => self.parameters = Some(values.clone()),
            Ok(Completion::GateThresholds { kind, values }) => {
                self.gate_thresholds[*kind as usize] = Some(values.clone());
            }
            Ok(Completion::Acknowledged(_)) => match &outcome.command {
                Command::EnableConfig => self.config_mode = true,
                Command::DisableConfig => self.config_mode = false,
                Command::WriteCommonParameters(written) => self.merge_parameters(written),
                Command::WriteGateThresholds(kind, written) => self.merge_thresholds(*kind, written),
                Command::SetReportMode(mode) => {
                    info!(target: "ld2410s", "report mode set to {}", mode);
                    self.report_mode = Some(*mode);
                }
                _ => {}
            },
            Err(_) => {}
        }
    }

    fn merge_thresholds(&mut self, kind: ThresholdKind, written: &[(u8, u32)]) {
        let Some(known) = self.gate_thresholds[kind as usize].as_mut() else {
            return;
        };
        for &(gate, value) in written {
            match known.iter_mut().find(|(g, _)| *g == gate) {
                Some(entry) => entry.1 = value,
                None => {
                    let _ = known.try_push((gate, value));
                }
            }
        }
    }

    fn merge_parameters(&mut self, written: &[(ParameterId, u32)]) {
        let Some(known) = self.parameters.as_mut() else {
            return;
        };
        for &(id, value) in written {
            match known.iter_mut().find(|(p, _)| *p == id) {
                Some(entry) => entry.1 = value,
                None => {
                    let _ = known.try_push((id, value));
                }
            }
        }
    }
}
