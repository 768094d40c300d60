// src/driver/tests.rs

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::time::Duration;

use super::mock::{ack_frame, report_frame, MockRadar};
use super::*;
use crate::common::{Command, CommandWord, ParameterId, ReportMode, TargetState, ThresholdKind};

type Log<T> = Rc<RefCell<Vec<T>>>;

fn new_log<T>() -> Log<T> {
    Rc::new(RefCell::new(Vec::new()))
}

fn quiet_config() -> DriverConfig {
    DriverConfig::default().with_query_on_start(false)
}

fn driver(config: DriverConfig) -> Ld2410sDriver<MockRadar> {
    Ld2410sDriver::new(MockRadar::new(), config)
}

/// Ticks until the routine finishes, moving the clock 10 ms per tick.
fn run_until_idle(drv: &mut Ld2410sDriver<MockRadar>) {
    for _ in 0..1_000 {
        if !drv.is_busy() {
            return;
        }
        drv.interface_mut().advance_time(10_000);
        drv.tick();
    }
    panic!("driver never went idle");
}

/// Gets an enable config acknowledged so single commands are accepted.
fn enter_config(drv: &mut Ld2410sDriver<MockRadar>) {
    drv.issue_command(Command::EnableConfig).unwrap();
    drv.tick();
    assert!(drv.in_config_mode());
    drv.take_last_outcome();
    drv.interface_mut().commands.clear();
}

struct Bound {
    moving: Log<f32>,
    still: Log<f32>,
    moving_energy: Log<f32>,
    still_energy: Log<f32>,
    has_target: Log<bool>,
    version: Log<String>,
    serial: Log<String>,
    results: Log<RoutineResult>,
}

fn bind_all(drv: &mut Ld2410sDriver<MockRadar>) -> Bound {
    let b = Bound {
        moving: new_log(),
        still: new_log(),
        moving_energy: new_log(),
        still_energy: new_log(),
        has_target: new_log(),
        version: new_log(),
        serial: new_log(),
        results: new_log(),
    };
    let numeric = |l: &Log<f32>| {
        let l = l.clone();
        move |v: f32| l.borrow_mut().push(v)
    };
    drv.set_moving_distance_sensor(numeric(&b.moving));
    drv.set_still_distance_sensor(numeric(&b.still));
    drv.set_moving_energy_sensor(numeric(&b.moving_energy));
    drv.set_still_energy_sensor(numeric(&b.still_energy));
    let l = b.has_target.clone();
    drv.set_has_target_binary_sensor(move |v: bool| l.borrow_mut().push(v));
    let l = b.version.clone();
    drv.set_version_text_sensor(move |v: &str| l.borrow_mut().push(v.into()));
    let l = b.serial.clone();
    drv.set_serial_number_text_sensor(move |v: &str| l.borrow_mut().push(v.into()));
    let l = b.results.clone();
    drv.set_query_button(move |r: RoutineResult| l.borrow_mut().push(r));
    b
}

// --- Report path ---

#[test]
fn test_noise_report_bad_frame_and_version_ack() {
    let mut drv = driver(quiet_config());
    let bound = bind_all(&mut drv);
    enter_config(&mut drv);
    drv.interface_mut().muted = true;
    drv.issue_command(Command::ReadFirmwareVersion).unwrap();

    let mut bad = report_frame(0x01, 10, 10, 10, 10, 10);
    let footer = bad.len() - 1;
    bad[footer] = 0x00;

    let radar = drv.interface_mut();
    radar.stage(&[0x00, 0x13, 0x37, 0xF4]);
    radar.stage(&report_frame(0x03, 120, 80, 95, 40, 120));
    radar.stage(&bad);
    radar.stage(&ack_frame(CommandWord::ReadFirmwareVersion, 0, &[0x01, 0x00, 0x02, 0x00, 0x16, 0x00]));

    let summary = drv.tick();
    assert_eq!(summary.reports_applied, 1);
    assert_eq!(summary.outcomes, 1);
    assert!(!summary.transport_error);

    assert_eq!(*bound.moving.borrow(), [120.0]);
    assert_eq!(*bound.still.borrow(), [95.0]);
    assert_eq!(*bound.moving_energy.borrow(), [80.0]);
    assert_eq!(*bound.still_energy.borrow(), [40.0]);
    assert_eq!(*bound.has_target.borrow(), [true]);
    assert_eq!(*bound.version.borrow(), ["1.02.22"]);
    assert!(drv.codec_stats().rejected >= 1);

    let snapshot = drv.current().unwrap();
    assert_eq!(snapshot.report.target, TargetState::BOTH);
    assert_eq!(snapshot.report.detection_distance_cm, 120);
    assert_eq!(drv.firmware_version().map(|v| v.minor), Some(2));
    assert!(matches!(drv.sequencer_state(), SequencerState::Idle));
    assert!(drv.take_last_outcome().is_some_and(|o| o.is_success()));
}

#[test]
fn test_no_bindings_means_no_calls() {
    let mut drv = driver(quiet_config());
    drv.interface_mut().stage(&report_frame(0x03, 120, 80, 95, 40, 120));
    let summary = drv.tick();
    assert_eq!(summary.reports_applied, 1);
    assert_eq!(summary.published, 0);
    assert_eq!(drv.current().map(|s| s.report.moving_distance_cm), Some(120));
}

#[test]
fn test_unchanged_report_publishes_nothing() {
    let mut drv = driver(quiet_config());
    let bound = bind_all(&mut drv);
    let frame = report_frame(0x01, 120, 80, 0, 0, 120);

    drv.interface_mut().stage(&frame);
    let first = drv.tick();
    assert!(first.published > 0);

    drv.interface_mut().stage(&frame);
    let second = drv.tick();
    assert_eq!(second.reports_applied, 1);
    assert_eq!(second.published, 0);
    assert_eq!(bound.moving.borrow().len(), 1);
    assert_eq!(drv.current().map(|s| s.sequence), Some(2));
}

#[test]
fn test_frame_split_across_ticks() {
    let mut drv = driver(quiet_config().with_max_bytes_per_tick(5));
    let bound = bind_all(&mut drv);
    drv.interface_mut().stage(&report_frame(0x02, 0, 0, 95, 40, 95));

    let mut applied = 0;
    for _ in 0..10 {
        applied += drv.tick().reports_applied;
    }
    assert_eq!(applied, 1);
    assert_eq!(*bound.still.borrow(), [95.0]);
}

#[test]
fn test_throttle_drops_reports_inside_window() {
    let mut drv = driver(quiet_config().with_throttle(Duration::from_millis(100)));
    let bound = bind_all(&mut drv);

    drv.interface_mut().stage(&report_frame(0x01, 100, 50, 0, 0, 100));
    assert_eq!(drv.tick().reports_applied, 1);

    drv.interface_mut().advance_time(50_000);
    drv.interface_mut().stage(&report_frame(0x01, 110, 50, 0, 0, 110));
    let summary = drv.tick();
    assert_eq!(summary.reports_throttled, 1);
    assert_eq!(summary.reports_applied, 0);

    drv.interface_mut().advance_time(50_000);
    drv.interface_mut().stage(&report_frame(0x01, 120, 50, 0, 0, 120));
    assert_eq!(drv.tick().reports_applied, 1);
    assert_eq!(*bound.moving.borrow(), [100.0, 120.0]);
}

#[test]
fn test_stale_partial_frame_resyncs() {
    let mut drv = driver(quiet_config());
    let frame = report_frame(0x01, 100, 50, 0, 0, 100);
    drv.interface_mut().stage(&frame[..8]);
    drv.tick();

    drv.interface_mut().advance_time(100_000);
    assert!(!drv.tick().resynced);
    drv.interface_mut().advance_time(150_000);
    assert!(drv.tick().resynced);

    drv.interface_mut().stage(&frame);
    assert_eq!(drv.tick().reports_applied, 1);
}

#[test]
fn test_read_error_is_not_fatal() {
    let mut drv = driver(quiet_config());
    drv.interface_mut().fail_next_read = true;
    drv.interface_mut().stage(&report_frame(0x01, 100, 50, 0, 0, 100));
    let summary = drv.tick();
    assert!(summary.transport_error);
    assert_eq!(summary.reports_applied, 0);

    let summary = drv.tick();
    assert!(!summary.transport_error);
    assert_eq!(summary.reports_applied, 1);
}

// --- Command path ---

#[test]
fn test_second_command_while_pending_is_busy() {
    let mut drv = driver(quiet_config());
    enter_config(&mut drv);
    drv.interface_mut().muted = true;
    drv.issue_command(Command::ReadFirmwareVersion).unwrap();

    let err = drv.issue_command(Command::ReadSerialNumber).unwrap_err();
    assert!(matches!(err, Ld2410sError::Busy { pending: CommandWord::ReadFirmwareVersion }));
    assert!(matches!(drv.press_query(), Err(Ld2410sError::Busy { .. })));
    assert_eq!(drv.interface_mut().command_words(), [CommandWord::ReadFirmwareVersion]);
}

#[test]
fn test_retries_exhausted_yield_single_failure() {
    let mut drv = driver(quiet_config());
    enter_config(&mut drv);
    drv.interface_mut().muted = true;
    drv.issue_command(Command::ReadSerialNumber).unwrap();

    let mut outcomes = 0;
    for _ in 0..40 {
        drv.interface_mut().advance_time(100_000);
        outcomes += drv.tick().outcomes;
    }
    assert_eq!(outcomes, 1);
    // First attempt plus two retries
    assert_eq!(drv.interface_mut().commands.len(), 3);
    let outcome = drv.take_last_outcome().unwrap();
    assert_eq!(outcome.result, Err(CommandFailure::TimedOut { attempts: 3 }));
    assert!(!drv.is_busy());
    assert!(drv.issue_command(Command::ReadSerialNumber).is_ok());
}

#[test]
fn test_late_answer_after_exhaustion_is_dropped() {
    let mut drv = driver(quiet_config().with_max_retries(0));
    enter_config(&mut drv);
    drv.interface_mut().muted = true;
    drv.issue_command(Command::ReadSerialNumber).unwrap();
    drv.interface_mut().advance_time(600_000);
    assert_eq!(drv.tick().outcomes, 1);

    drv.interface_mut().stage(&ack_frame(CommandWord::ReadSerialNumber, 0, &[0x02, 0x00, b'A', b'B']));
    let summary = drv.tick();
    assert_eq!(summary.frames, 1);
    assert_eq!(summary.outcomes, 0);
    assert!(drv.serial_number().is_none());
}

#[test]
fn test_write_failure_surfaces_io_error() {
    let mut drv = driver(quiet_config());
    drv.interface_mut().fail_writes = true;
    let err = drv.issue_command(Command::EnableConfig).unwrap_err();
    assert!(err.is_transient());
    assert!(!drv.is_busy());
    assert_eq!(drv.take_last_outcome().map(|o| o.result), Some(Err(CommandFailure::NotSent)));
}

#[test]
fn test_single_command_needs_config_mode() {
    let mut drv = driver(quiet_config());
    let err = drv.issue_command(Command::ReadSerialNumber).unwrap_err();
    assert!(matches!(err, Ld2410sError::NotInConfigMode { command: CommandWord::ReadSerialNumber }));
    assert!(drv.interface_mut().written.is_empty());
    assert!(!drv.is_busy());

    enter_config(&mut drv);
    drv.issue_command(Command::ReadSerialNumber).unwrap();
    drv.tick();
    assert_eq!(drv.serial_number().map(|sn| sn.as_str()), Some("SN-0042"));

    drv.issue_command(Command::DisableConfig).unwrap();
    drv.tick();
    assert!(!drv.in_config_mode());
    assert!(matches!(
        drv.issue_command(Command::read_query_parameters()),
        Err(Ld2410sError::NotInConfigMode { .. })
    ));
}

#[test]
fn test_slow_uart_does_not_stall_command_or_tick() {
    let mut drv = driver(quiet_config());
    let bound = bind_all(&mut drv);
    enter_config(&mut drv);
    drv.interface_mut().write_gap_us = 2_000;
    let start_us = drv.interface_mut().current_time_us;
    let written_before = drv.interface_mut().written.len();

    drv.issue_command(Command::ReadFirmwareVersion).unwrap();
    assert_eq!(drv.interface_mut().current_time_us, start_us);
    assert_eq!(drv.interface_mut().written.len(), written_before + 1);
    assert!(drv.is_busy());

    let mut outcomes = 0;
    for _ in 0..20 {
        drv.interface_mut().advance_time(2_000);
        let calls_before = drv.interface_mut().write_calls;
        outcomes += drv.tick().outcomes;
        assert!(drv.interface_mut().write_calls - calls_before <= 2);
    }
    assert_eq!(outcomes, 1);
    assert_eq!(*bound.version.borrow(), ["1.02.22"]);
    assert!(!drv.is_busy());
}

#[test]
fn test_frame_not_out_within_budget_fails_command() {
    let mut drv = driver(quiet_config());
    enter_config(&mut drv);
    drv.interface_mut().write_gap_us = 40_000;

    drv.issue_command(Command::ReadFirmwareVersion).unwrap();
    drv.interface_mut().advance_time(40_000);
    assert_eq!(drv.tick().outcomes, 0);
    drv.interface_mut().advance_time(40_000);
    let summary = drv.tick();
    assert_eq!(summary.outcomes, 1);
    assert!(!summary.transport_error);

    assert_eq!(drv.take_last_outcome().map(|o| o.result), Some(Err(CommandFailure::NotSent)));
    assert!(!drv.is_busy());
    assert!(drv.interface_mut().commands.is_empty());
}

// --- Routines ---

#[test]
fn test_start_runs_query_routine() {
    let mut drv = driver(DriverConfig::default());
    let bound = bind_all(&mut drv);
    let (freq, gate) = (new_log::<f32>(), new_log::<f32>());
    let (f, g) = (freq.clone(), gate.clone());
    drv.set_parameter_sensor(ParameterId::StatusReportFrequency, move |v: f32| f.borrow_mut().push(v));
    drv.outputs_mut().bind_parameter(ParameterId::FarthestGate, move |v: f32| g.borrow_mut().push(v));

    drv.start().unwrap();
    assert!(drv.is_busy());
    run_until_idle(&mut drv);

    assert_eq!(
        drv.interface_mut().command_words(),
        [
            CommandWord::EnableConfig,
            CommandWord::ReadFirmwareVersion,
            CommandWord::ReadSerialNumber,
            CommandWord::ReadCommonParameters,
            CommandWord::DisableConfig,
        ]
    );
    assert_eq!(*bound.version.borrow(), ["1.02.22"]);
    assert_eq!(*bound.serial.borrow(), ["SN-0042"]);
    assert_eq!(*freq.borrow(), [8.0]);
    assert_eq!(*gate.borrow(), [12.0]);
    assert_eq!(*bound.results.borrow(), [RoutineResult::Completed]);
    assert_eq!(drv.parameters().map(|p| p.len()), Some(ParameterId::QUERY_SET.len()));
}

#[test]
fn test_start_without_query_sends_nothing() {
    let mut drv = driver(quiet_config());
    drv.start().unwrap();
    drv.tick();
    assert!(drv.interface_mut().written.is_empty());
    assert!(!drv.is_busy());
}

#[test]
fn test_rejected_step_still_leaves_config_mode() {
    let mut drv = driver(quiet_config());
    let bound = bind_all(&mut drv);
    drv.interface_mut().reject = Some((CommandWord::ReadSerialNumber, 1));

    drv.press_query().unwrap();
    run_until_idle(&mut drv);

    assert_eq!(
        drv.interface_mut().command_words(),
        [
            CommandWord::EnableConfig,
            CommandWord::ReadFirmwareVersion,
            CommandWord::ReadSerialNumber,
            CommandWord::DisableConfig,
        ]
    );
    let expected = RoutineResult::Failed {
        step: CommandWord::ReadSerialNumber,
        failure: CommandFailure::Rejected { status: 1 },
    };
    assert_eq!(*bound.results.borrow(), [expected]);
    assert_eq!(drv.last_routine_result(), Some(expected));
    assert_eq!(*bound.version.borrow(), ["1.02.22"]);
    assert!(bound.serial.borrow().is_empty());
}

#[test]
fn test_silent_radar_fails_routine_once() {
    let mut drv = driver(quiet_config());
    let bound = bind_all(&mut drv);
    drv.interface_mut().muted = true;

    drv.press_query().unwrap();
    run_until_idle(&mut drv);

    // Enable config never entered, so no disable is attempted
    assert_eq!(drv.interface_mut().command_words(), [CommandWord::EnableConfig; 3]);
    assert_eq!(
        *bound.results.borrow(),
        [RoutineResult::Failed {
            step: CommandWord::EnableConfig,
            failure: CommandFailure::TimedOut { attempts: 3 },
        }]
    );
}

#[test]
fn test_write_parameters_routine() {
    let mut drv = driver(quiet_config());
    let delay_out = new_log::<f32>();
    let l = delay_out.clone();
    drv.set_parameter_sensor(ParameterId::UnmannedDelay, move |v: f32| l.borrow_mut().push(v));
    drv.press_query().unwrap();
    run_until_idle(&mut drv);

    drv.write_parameters(&[(ParameterId::UnmannedDelay, 30)]).unwrap();
    run_until_idle(&mut drv);

    let words = drv.interface_mut().command_words();
    assert_eq!(
        &words[5..],
        [CommandWord::EnableConfig, CommandWord::WriteCommonParameters, CommandWord::DisableConfig]
    );
    assert_eq!(drv.last_routine_result(), Some(RoutineResult::Completed));
    let delay = drv.parameters().and_then(|p| p.iter().find(|(id, _)| *id == ParameterId::UnmannedDelay).copied());
    assert_eq!(delay, Some((ParameterId::UnmannedDelay, 30)));
    assert!(drv.interface_mut().parameters.contains(&(ParameterId::UnmannedDelay, 30)));
    // Bound output follows the write without another query
    assert_eq!(*delay_out.borrow(), [10.0, 30.0]);
}

#[test]
fn test_write_parameters_rejects_empty_and_oversized() {
    let mut drv = driver(quiet_config());
    assert!(matches!(drv.write_parameters(&[]), Err(Ld2410sError::EmptyRequest)));
    let too_many = [(ParameterId::UnmannedDelay, 30); 9];
    assert!(matches!(
        drv.write_parameters(&too_many),
        Err(Ld2410sError::BufferOverflow { needed: 9, got: 8 })
    ));
    assert!(!drv.is_busy());
    assert!(drv.interface_mut().written.is_empty());
}

#[test]
fn test_set_report_mode_routine() {
    let mut drv = driver(quiet_config());
    let bound = bind_all(&mut drv);
    let mode = new_log::<String>();
    let l = mode.clone();
    drv.set_report_mode_text_sensor(move |v: &str| l.borrow_mut().push(v.into()));

    drv.set_report_mode(ReportMode::Engineering).unwrap();
    run_until_idle(&mut drv);

    assert_eq!(
        drv.interface_mut().command_words(),
        [CommandWord::EnableConfig, CommandWord::SetReportMode, CommandWord::DisableConfig]
    );
    assert_eq!(drv.interface_mut().report_mode, ReportMode::Engineering);
    assert_eq!(drv.report_mode(), Some(ReportMode::Engineering));
    assert_eq!(*mode.borrow(), ["engineering"]);
    assert!(!drv.in_config_mode());
    assert_eq!(drv.last_routine_result(), Some(RoutineResult::Completed));
    // Only the query routine reports to the button
    assert!(bound.results.borrow().is_empty());
}

#[test]
fn test_rejected_report_mode_keeps_previous_mode() {
    let mut drv = driver(quiet_config());
    drv.interface_mut().reject = Some((CommandWord::SetReportMode, 1));
    drv.set_report_mode(ReportMode::Engineering).unwrap();
    run_until_idle(&mut drv);

    assert_eq!(drv.interface_mut().command_words().last(), Some(&CommandWord::DisableConfig));
    assert_eq!(drv.report_mode(), None);
    assert!(matches!(
        drv.last_routine_result(),
        Some(RoutineResult::Failed { step: CommandWord::SetReportMode, .. })
    ));
}

#[test]
fn test_gate_threshold_read_and_write() {
    let mut drv = driver(quiet_config());
    let (move2, still0) = (new_log::<f32>(), new_log::<f32>());
    let (m, s) = (move2.clone(), still0.clone());
    assert!(drv.set_gate_move_threshold_number(2, move |v: f32| m.borrow_mut().push(v)));
    assert!(drv.set_gate_still_threshold_number(0, move |v: f32| s.borrow_mut().push(v)));
    assert!(!drv.set_gate_still_threshold_number(16, |_: f32| {}));

    drv.read_gate_thresholds().unwrap();
    run_until_idle(&mut drv);
    assert_eq!(
        drv.interface_mut().command_words(),
        [
            CommandWord::EnableConfig,
            CommandWord::ReadMoveThresholds,
            CommandWord::ReadStillThresholds,
            CommandWord::DisableConfig,
        ]
    );
    assert_eq!(drv.gate_thresholds(ThresholdKind::Move).map(|t| t.len()), Some(16));
    assert_eq!(drv.gate_thresholds(ThresholdKind::Move).map(|t| t[2]), Some((2, 42)));
    assert_eq!(*move2.borrow(), [42.0]);
    assert_eq!(*still0.borrow(), [30.0]);

    drv.write_gate_thresholds(ThresholdKind::Move, &[(2, 55)]).unwrap();
    run_until_idle(&mut drv);
    assert_eq!(drv.interface_mut().thresholds[ThresholdKind::Move as usize][2], 55);
    assert_eq!(drv.gate_thresholds(ThresholdKind::Move).map(|t| t[2]), Some((2, 55)));
    assert_eq!(*move2.borrow(), [42.0, 55.0]);
    assert_eq!(*still0.borrow(), [30.0]);
}

#[test]
fn test_write_gate_thresholds_validates_input() {
    let mut drv = driver(quiet_config());
    assert!(matches!(drv.write_gate_thresholds(ThresholdKind::Still, &[]), Err(Ld2410sError::EmptyRequest)));
    assert!(matches!(
        drv.write_gate_thresholds(ThresholdKind::Still, &[(3, 20), (16, 20)]),
        Err(Ld2410sError::InvalidGate(16))
    ));
    let too_many = [(0u8, 20u32); 17];
    assert!(matches!(
        drv.write_gate_thresholds(ThresholdKind::Move, &too_many),
        Err(Ld2410sError::BufferOverflow { needed: 17, got: 16 })
    ));
    assert!(!drv.is_busy());
    assert!(drv.interface_mut().written.is_empty());
}

#[test]
fn test_reports_keep_flowing_during_routine() {
    let mut drv = driver(quiet_config());
    let bound = bind_all(&mut drv);
    drv.press_query().unwrap();
    drv.interface_mut().stage(&report_frame(0x01, 150, 60, 0, 0, 150));
    run_until_idle(&mut drv);
    assert_eq!(*bound.moving.borrow(), [150.0]);
    assert_eq!(drv.last_routine_result(), Some(RoutineResult::Completed));
}

#[test]
fn test_engineering_report_feeds_gate_sensors() {
    let mut drv = driver(quiet_config());
    let gate1 = new_log::<f32>();
    let l = gate1.clone();
    assert!(drv.set_gate_move_sensor(1, move |v: f32| l.borrow_mut().push(v)));
    assert!(!drv.set_gate_still_sensor(16, |_: f32| {}));

    // type, head, state, mov(2), mov_e, still(2), still_e, det(2),
    // max gates, 2 moving + 2 still energies, tail, check
    let data = [
        0x01, 0xAA, 0x01, 0x64, 0x00, 0x32, 0x00, 0x00, 0x00, 0x64, 0x00, 0x01, 0x01, 0x0A, 0x14, 0x05,
        0x06, 0x55, 0x00,
    ];
    let mut frame = alloc::vec![0xF4, 0xF3, 0xF2, 0xF1, data.len() as u8, 0x00];
    frame.extend_from_slice(&data);
    frame.extend_from_slice(&[0xF8, 0xF7, 0xF6, 0xF5]);

    drv.interface_mut().stage(&frame);
    drv.tick();
    assert_eq!(*gate1.borrow(), [20.0]);
    let gates = drv.current().and_then(|s| s.report.gates.clone()).unwrap();
    assert_eq!(&gates.still[..], &[5, 6]);
}
