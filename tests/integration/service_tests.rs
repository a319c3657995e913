//! Integration tests for the LoadService → Regulator → outputs pipeline.
//!
//! These run on the host (x86_64) against a simulated source and verify
//! the behaviour an operator would observe at the load terminals.

use crate::mock_hw::{BrokenEeprom, MockHardware, RecordingSink};

use dcload::adapters::eeprom::EepromAdapter;
use dcload::app::commands::LoadCommand;
use dcload::app::events::LoadEvent;
use dcload::app::ports::{LineLevel, StorageError};
use dcload::app::service::LoadService;
use dcload::config::{CUR_MAX_MA, CUR_MIN_MA, DutyCalibration, TICK_HZ};
use dcload::error::{Error, LoadFault};
use dcload::events::IsrFlags;
use dcload::settings::{MaxPowerAction, Mode, SettingsSource};
use dcload::state::{DisableReason, LoadState};

fn make_service() -> (LoadService<EepromAdapter>, RecordingSink, IsrFlags) {
    let mut svc = LoadService::new(EepromAdapter::simulated(64), DutyCalibration::default());
    let mut sink = RecordingSink::new();
    svc.start(&mut sink);
    (svc, sink, IsrFlags::new())
}

fn configure(svc: &mut LoadService<EepromAdapter>, mode: Mode, setpoint: u16) {
    let s = svc.settings_mut();
    s.mode = mode;
    s.setpoints[mode] = setpoint;
}

fn switch_on(
    svc: &mut LoadService<EepromAdapter>,
    hw: &mut MockHardware,
    sink: &mut RecordingSink,
) {
    svc.enable();
    svc.tick(hw, sink);
    assert!(svc.is_active());
}

fn run(
    svc: &mut LoadService<EepromAdapter>,
    hw: &mut MockHardware,
    sink: &mut RecordingSink,
    ticks: u32,
) {
    for _ in 0..ticks {
        svc.tick(hw, sink);
    }
}

// ── Regulation modes ──────────────────────────────────────────

#[test]
fn cc_load_sinks_setpoint_with_enable_low() {
    let (mut svc, mut sink, _) = make_service();
    let mut hw = MockHardware::stiff(12_000);
    configure(&mut svc, Mode::Cc, 2_000);

    switch_on(&mut svc, &mut hw, &mut sink);
    assert_eq!(hw.enable_line(), LineLevel::Low);
    assert_eq!(svc.current_setpoint(), 2_000);
    assert!((1_998..=2_000).contains(&hw.flowing_ma()), "{}", hw.flowing_ma());
}

#[test]
fn cr_and_cw_follow_sensed_voltage() {
    let (mut svc, mut sink, _) = make_service();
    let mut hw = MockHardware::stiff(10_000);

    // 10 V across 5 Ω
    configure(&mut svc, Mode::Cr, 500);
    switch_on(&mut svc, &mut hw, &mut sink);
    assert_eq!(svc.current_setpoint(), 2_000);

    // 25 W at 10 V
    configure(&mut svc, Mode::Cw, 25_000);
    svc.tick(&mut hw, &mut sink);
    assert_eq!(svc.current_setpoint(), 2_500);
}

#[test]
fn cv_converges_on_resistive_source() {
    let (mut svc, mut sink, _) = make_service();
    // V = 12 V - I * 0.5 Ω, so 10 V is reached at 4 A.
    let mut hw = MockHardware::with_resistance(12_000, 500);
    configure(&mut svc, Mode::Cv, 10_000);

    switch_on(&mut svc, &mut hw, &mut sink);
    run(&mut svc, &mut hw, &mut sink, 5_000);

    for _ in 0..500 {
        svc.tick(&mut hw, &mut sink);
        let v = i32::from(hw.terminal_mv());
        assert!((v - 10_000).abs() <= 50, "sensed {v} mV");
    }
    assert_eq!(svc.error(), None);
    assert!(svc.is_active());
}

#[test]
fn setpoint_edit_applies_on_next_tick() {
    let (mut svc, mut sink, flags) = make_service();
    let mut hw = MockHardware::stiff(12_000);
    switch_on(&mut svc, &mut hw, &mut sink);

    svc.handle_command(
        LoadCommand::SetSetpoint {
            mode: Mode::Cc,
            value: 3_000,
        },
        &mut hw,
        &flags,
        &mut sink,
    )
    .unwrap();
    assert_eq!(svc.current_setpoint(), 1_000);
    svc.tick(&mut hw, &mut sink);
    assert_eq!(svc.current_setpoint(), 3_000);
}

// ── Protection ────────────────────────────────────────────────

#[test]
fn zero_current_limit_still_sinks_minimum_current() {
    let (mut svc, mut sink, flags) = make_service();
    let mut hw = MockHardware::stiff(12_000);
    configure(&mut svc, Mode::Cw, 30_000);

    svc.handle_command(LoadCommand::SetCurrentLimit(0), &mut hw, &flags, &mut sink)
        .unwrap();
    assert_eq!(svc.settings().current_limit, CUR_MIN_MA);

    switch_on(&mut svc, &mut hw, &mut sink);
    assert_eq!(svc.current_setpoint(), CUR_MIN_MA);

    svc.handle_command(LoadCommand::SetCurrentLimit(u16::MAX), &mut hw, &flags, &mut sink)
        .unwrap();
    assert_eq!(svc.settings().current_limit, CUR_MAX_MA);
}

#[test]
fn power_clamp_uses_terminal_not_sense_voltage() {
    let (mut svc, mut sink, _) = make_service();
    let mut hw = MockHardware::stiff(20_000);
    hw.sense_drop_mv = 8_000;
    configure(&mut svc, Mode::Cc, 8_000);

    switch_on(&mut svc, &mut hw, &mut sink);
    // 60 W at 20 V terminal voltage
    assert_eq!(svc.current_setpoint(), 3_000);
    assert_eq!(svc.error(), None);
}

#[test]
fn power_fault_disables_and_needs_acknowledgement() {
    let (mut svc, mut sink, flags) = make_service();
    let mut hw = MockHardware::stiff(12_000);
    configure(&mut svc, Mode::Cc, 8_000);
    svc.settings_mut().max_power_action = MaxPowerAction::Fault;

    switch_on(&mut svc, &mut hw, &mut sink);
    assert_eq!(svc.error(), Some(LoadFault::Overload));
    svc.tick(&mut hw, &mut sink);
    assert_eq!(svc.state(), LoadState::Disabled(DisableReason::Error));
    assert_eq!(hw.enable_line(), LineLevel::High);
    assert!(sink.contains(&LoadEvent::FaultRaised(LoadFault::Overload)));
    assert!(sink.contains(&LoadEvent::StateChanged {
        from: LoadState::Active,
        to: LoadState::Disabled(DisableReason::Error),
    }));

    // Still latched: enabling does nothing.
    svc.enable();
    run(&mut svc, &mut hw, &mut sink, 10);
    assert_eq!(svc.state(), LoadState::Disabled(DisableReason::Error));

    for cmd in [LoadCommand::ClearError, LoadCommand::AcknowledgeStop] {
        svc.handle_command(cmd, &mut hw, &flags, &mut sink).unwrap();
    }
    assert_eq!(svc.state(), LoadState::Disabled(DisableReason::User));
    assert_eq!(svc.error(), None);
}

#[test]
fn cutoff_trips_when_source_sags() {
    let (mut svc, mut sink, _) = make_service();
    // 1 Ω source: 3 A pulls a 5 V source down to 2 V.
    let mut hw = MockHardware::with_resistance(5_000, 1_000);
    configure(&mut svc, Mode::Cc, 3_000);
    svc.settings_mut().cutoff_enabled = true;
    svc.settings_mut().cutoff_voltage = 3_300;

    switch_on(&mut svc, &mut hw, &mut sink);
    svc.tick(&mut hw, &mut sink);
    assert_eq!(svc.state(), LoadState::Disabled(DisableReason::Cutoff));
    assert_eq!(hw.enable_line(), LineLevel::High);
    assert!(!svc.regulated());
}

#[test]
fn external_fault_disables_on_next_tick() {
    let (mut svc, mut sink, flags) = make_service();
    let mut hw = MockHardware::stiff(12_000);
    switch_on(&mut svc, &mut hw, &mut sink);

    svc.handle_command(
        LoadCommand::RaiseFault(LoadFault::Temperature),
        &mut hw,
        &flags,
        &mut sink,
    )
    .unwrap();
    assert!(svc.is_active(), "takes effect on the next tick");
    svc.tick(&mut hw, &mut sink);
    assert_eq!(svc.state(), LoadState::Disabled(DisableReason::Error));
    assert_eq!(svc.telemetry().fault_code, LoadFault::Temperature.code());
}

#[test]
fn disable_is_immediate() {
    let (mut svc, mut sink, _) = make_service();
    let mut hw = MockHardware::stiff(12_000);
    switch_on(&mut svc, &mut hw, &mut sink);

    svc.disable(DisableReason::Cutoff, &mut hw, &mut sink);
    assert!(!svc.is_active());
    assert_eq!(svc.state(), LoadState::Disabled(DisableReason::Cutoff));
    assert_eq!(hw.enable_line(), LineLevel::High);
    assert_eq!(hw.flowing_ma(), 0);
}

#[test]
fn overrun_raises_timing_fault() {
    let (mut svc, mut sink, flags) = make_service();
    let mut hw = MockHardware::stiff(12_000);
    svc.enable();
    flags.on_systick();
    svc.poll(&flags, &mut hw, &mut sink);
    assert!(svc.is_active());

    for _ in 0..3 {
        flags.on_systick();
    }
    svc.poll(&flags, &mut hw, &mut sink);
    assert_eq!(svc.error(), Some(LoadFault::Timing));
    assert_eq!(svc.state(), LoadState::Disabled(DisableReason::Error));
}

// ── Energy ────────────────────────────────────────────────────

#[test]
fn one_second_at_one_amp_ten_volts() {
    let (mut svc, mut sink, _) = make_service();
    let mut hw = MockHardware::stiff(10_000);
    configure(&mut svc, Mode::Cc, 1_000);

    switch_on(&mut svc, &mut hw, &mut sink);
    run(&mut svc, &mut hw, &mut sink, TICK_HZ);
    let t = svc.telemetry();
    assert_eq!(t.milliamp_seconds, 1_000);
    assert_eq!(t.milliwatt_seconds, 10_000);
    assert_eq!(t.milliamp_hours(), 0);
}

#[test]
fn hour_readout_after_long_run() {
    let (mut svc, mut sink, _) = make_service();
    let mut hw = MockHardware::stiff(10_000);
    configure(&mut svc, Mode::Cc, 3_600);

    switch_on(&mut svc, &mut hw, &mut sink);
    run(&mut svc, &mut hw, &mut sink, 10 * TICK_HZ);
    let t = svc.telemetry();
    assert_eq!(t.milliamp_seconds, 36_000);
    assert_eq!(t.milliamp_hours(), 10);
    assert_eq!(t.milliwatt_hours(), 100);
}

#[test]
fn counters_freeze_when_unregulated_and_clear_on_command() {
    let (mut svc, mut sink, flags) = make_service();
    let mut hw = MockHardware::stiff(10_000);
    switch_on(&mut svc, &mut hw, &mut sink);
    run(&mut svc, &mut hw, &mut sink, TICK_HZ);
    let before = svc.telemetry().milliamp_seconds;
    assert!(before > 0);

    hw.regulated = false;
    run(&mut svc, &mut hw, &mut sink, 3 * TICK_HZ);
    assert_eq!(svc.telemetry().milliamp_seconds, before);

    svc.handle_command(LoadCommand::ClearCounters, &mut hw, &flags, &mut sink)
        .unwrap();
    assert_eq!(svc.telemetry().milliamp_seconds, 0);
    assert!(sink.contains(&LoadEvent::CountersCleared));
}

// ── Settings persistence ──────────────────────────────────────

#[test]
fn settings_survive_power_cycle() {
    let (mut svc, mut sink, flags) = make_service();
    let mut hw = MockHardware::stiff(12_000);
    for cmd in [
        LoadCommand::SetMode(Mode::Cw),
        LoadCommand::SetSetpoint {
            mode: Mode::Cw,
            value: 12_345,
        },
        LoadCommand::SetCurrentLimit(4_000),
        LoadCommand::SetCutoff {
            enabled: true,
            voltage_mv: 2_800,
        },
        LoadCommand::SetMaxPowerAction(MaxPowerAction::Fault),
        LoadCommand::SetBeeper(false),
        LoadCommand::Persist,
    ] {
        svc.handle_command(cmd, &mut hw, &flags, &mut sink).unwrap();
    }
    let saved = *svc.settings();

    let reborn = LoadService::new(svc.into_eeprom(), DutyCalibration::default());
    assert_eq!(reborn.settings_source(), SettingsSource::Stored);
    assert_eq!(*reborn.settings(), saved);
    assert_eq!(reborn.state(), LoadState::Disabled(DisableReason::User));
}

#[test]
fn persist_is_refused_while_running() {
    let (mut svc, mut sink, flags) = make_service();
    let mut hw = MockHardware::stiff(12_000);
    switch_on(&mut svc, &mut hw, &mut sink);

    let result = svc.handle_command(LoadCommand::Persist, &mut hw, &flags, &mut sink);
    assert!(matches!(result, Err(Error::Settings(_))));
    assert_eq!(svc.eeprom().physical_writes(), 0);
}

#[test]
fn broken_eeprom_defaults_and_reports_storage_error() {
    let mut svc = LoadService::new(BrokenEeprom, DutyCalibration::default());
    let mut sink = RecordingSink::new();
    svc.start(&mut sink);
    assert_eq!(svc.settings_source(), SettingsSource::Defaulted);
    assert!(sink.contains(&LoadEvent::SettingsDefaulted));

    let flags = IsrFlags::new();
    assert_eq!(
        svc.persist(&flags, &mut sink),
        Err(Error::Storage(StorageError::IoError))
    );
}

// ── Calibration ───────────────────────────────────────────────

#[test]
fn calibration_drives_raw_duty_and_leaves_enable_alone() {
    let (mut svc, mut sink, flags) = make_service();
    let mut hw = MockHardware::stiff(12_000);
    svc.handle_command(LoadCommand::EnterCalibration(100), &mut hw, &flags, &mut sink)
        .unwrap();
    svc.tick(&mut hw, &mut sink);
    assert_eq!(hw.last_duty(), Some(100));

    svc.handle_command(LoadCommand::SetCalibrationRaw(40_000), &mut hw, &flags, &mut sink)
        .unwrap();
    let calls_before = hw.calls.len();
    svc.tick(&mut hw, &mut sink);
    assert_eq!(hw.last_duty(), Some(40_000));
    assert_eq!(hw.calls.len(), calls_before + 1, "only the duty is written");
    assert!(svc.in_calibration());

    svc.handle_command(LoadCommand::ExitCalibration, &mut hw, &flags, &mut sink)
        .unwrap();
    svc.tick(&mut hw, &mut sink);
    assert!(!svc.in_calibration());
    assert_eq!(
        hw.last_duty(),
        Some(DutyCalibration::default().duty_for(svc.current_setpoint()))
    );
    assert!(sink.contains(&LoadEvent::CalibrationEntered { raw_value: 100 }));
    assert!(sink.contains(&LoadEvent::CalibrationExited));
}

// ── Log sink ──────────────────────────────────────────────────

#[test]
fn log_sink_renders_a_full_session() {
    use dcload::adapters::log_sink::LogEventSink;

    let mut svc = LoadService::new(EepromAdapter::simulated(64), DutyCalibration::default());
    let mut sink = LogEventSink::new();
    let flags = IsrFlags::new();
    let mut hw = MockHardware::stiff(12_000);
    svc.start(&mut sink);

    svc.enable();
    for _ in 0..TICK_HZ {
        svc.tick(&mut hw, &mut sink);
    }
    svc.raise_fault(LoadFault::Supply, &mut sink);
    svc.tick(&mut hw, &mut sink);
    svc.clear_error(&mut sink);
    svc.clear_counters(&mut sink);
    assert!(svc.persist(&flags, &mut sink).is_ok());
    assert_eq!(svc.state(), LoadState::Disabled(DisableReason::Error));
}
