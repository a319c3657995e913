//! Application service — the hexagonal core.
//!
//! [`LoadService`] owns the settings store and the regulator.  It exposes
//! a hardware-agnostic API for the main loop and for command-driven
//! collaborators.  All I/O flows through port traits injected at call
//! sites, making the entire service testable with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                 │      LoadService        │
//!  OutputPort ◀── │ Regulator · Settings    │ ◀─▶ EepromPort
//!                 └────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::{DutyCalibration, TELEMETRY_INTERVAL_TICKS};
use crate::control::Regulator;
use crate::error::{Error, LoadFault, Result};
use crate::events::IsrFlags;
use crate::settings::{Settings, SettingsSource, SettingsStore};
use crate::state::{DisableReason, LoadState};

use super::commands::LoadCommand;
use super::events::{LoadEvent, TelemetryData};
use super::ports::{EepromPort, EventSink, OutputPort, SensorPort};

// ───────────────────────────────────────────────────────────────
// LoadService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct LoadService<E> {
    store: SettingsStore<E>,
    regulator: Regulator,
    tick_count: u64,
    /// State and fault as last reported to the sink.
    reported_state: LoadState,
    reported_fault: Option<LoadFault>,
}

impl<E: EepromPort> LoadService<E> {
    /// Construct the service, loading settings from `eeprom`.
    ///
    /// Does **not** emit anything.  Call [`start`](Self::start) next.
    pub fn new(eeprom: E, duty_cal: DutyCalibration) -> Self {
        let store = SettingsStore::open(eeprom);
        let regulator = Regulator::new(duty_cal);
        let reported_state = regulator.state();
        Self {
            store,
            regulator,
            tick_count: 0,
            reported_state,
            reported_fault: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Announce the initial state.  The load always starts disabled.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        let state = self.regulator.state();
        sink.emit(&LoadEvent::Started(state));
        if self.store.source() == SettingsSource::Defaulted {
            sink.emit(&LoadEvent::SettingsDefaulted);
        }
        info!(
            "LoadService started in {state} (mode={:?})",
            self.store.settings().mode
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Drain the tick flags and run one control period if any elapsed.
    ///
    /// An overrun (a tick arrived before the previous one was consumed)
    /// latches [`LoadFault::Timing`].  Returns the number of periods
    /// that had elapsed.
    pub fn poll(
        &mut self,
        flags: &IsrFlags,
        hw: &mut (impl SensorPort + OutputPort),
        sink: &mut impl EventSink,
    ) -> u8 {
        let ticks = flags.take_ticks();
        if ticks == 0 {
            return 0;
        }
        if flags.take_tick_overflow() {
            warn!("Control tick overrun ({ticks} periods pending)");
            self.regulator.raise_fault(LoadFault::Timing);
        }
        self.tick(hw, sink);
        ticks
    }

    /// Run one control period: integrate energy, then regulate.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`OutputPort`]; this avoids a double mutable borrow while keeping
    /// the port boundary explicit.
    pub fn tick(&mut self, hw: &mut (impl SensorPort + OutputPort), sink: &mut impl EventSink) {
        self.tick_count += 1;
        self.regulator.tick(self.store.settings(), hw);
        self.report(sink);

        if self.tick_count % TELEMETRY_INTERVAL_TICKS == 0 {
            sink.emit(&LoadEvent::Telemetry(self.telemetry()));
        }
    }

    // ── Load control ──────────────────────────────────────────

    /// Request activation.  The load turns on at the next tick.
    pub fn enable(&mut self) {
        self.regulator.enable();
    }

    /// Switch the load off immediately and release the enable line.
    pub fn disable(
        &mut self,
        reason: DisableReason,
        out: &mut impl OutputPort,
        sink: &mut impl EventSink,
    ) {
        self.regulator.disable(reason, out);
        self.report(sink);
    }

    /// Latch a fault reported by an outside collaborator.  The load is
    /// disabled with reason ERROR on the next tick.
    pub fn raise_fault(&mut self, fault: LoadFault, sink: &mut impl EventSink) {
        self.regulator.raise_fault(fault);
        self.report(sink);
    }

    /// Acknowledge the latched fault.  The load stays disabled.
    pub fn clear_error(&mut self, sink: &mut impl EventSink) {
        if let Some(fault) = self.regulator.error() {
            self.regulator.clear_error();
            self.reported_fault = None;
            info!("Fault {} acknowledged", fault.display_code());
            sink.emit(&LoadEvent::FaultCleared(fault));
        }
    }

    /// Turn a CUTOFF or (acknowledged) ERROR stop back into a USER stop.
    pub fn acknowledge_stop(&mut self, sink: &mut impl EventSink) -> bool {
        let changed = self.regulator.acknowledge_stop();
        self.report(sink);
        changed
    }

    /// Zero the charge and energy accumulators.
    pub fn clear_counters(&mut self, sink: &mut impl EventSink) {
        self.regulator.clear_counters();
        sink.emit(&LoadEvent::CountersCleared);
    }

    // ── Settings ──────────────────────────────────────────────

    pub fn settings(&self) -> &Settings {
        self.store.settings()
    }

    /// Live settings.  Edits take effect on the next tick and are lost
    /// at power-off unless [`persist`](Self::persist) is called.
    pub fn settings_mut(&mut self) -> &mut Settings {
        self.store.settings_mut()
    }

    /// Where the settings came from at startup.
    pub fn settings_source(&self) -> SettingsSource {
        self.store.source()
    }

    /// Write the live settings to EEPROM.
    ///
    /// Refused while the load is active or about to become active: the
    /// write blocks the main loop for longer than a control period.
    /// Ticks that piled up during the write are discarded afterwards so
    /// they do not register as an overrun.
    pub fn persist(&mut self, flags: &IsrFlags, sink: &mut impl EventSink) -> Result<usize> {
        if self.regulator.is_active() || self.regulator.enable_pending() {
            return Err(Error::Settings("load must be disabled to persist"));
        }
        let written = self.store.persist();
        flags.clear_tick_flags();
        let bytes_written = written?;
        sink.emit(&LoadEvent::SettingsPersisted { bytes_written });
        Ok(bytes_written)
    }

    pub fn eeprom(&self) -> &E {
        self.store.eeprom()
    }

    /// Shut the service down and hand back the EEPROM.
    pub fn into_eeprom(self) -> E {
        self.store.into_eeprom()
    }

    // ── Calibration ───────────────────────────────────────────

    /// Engage raw duty pass-through.  The regulator and every protection
    /// are bypassed until [`exit_calibration`](Self::exit_calibration).
    pub fn enter_calibration(&mut self, raw_value: u16, sink: &mut impl EventSink) {
        self.regulator.calibration_mut().enter_current_duty(raw_value);
        sink.emit(&LoadEvent::CalibrationEntered { raw_value });
    }

    pub fn set_calibration_raw(&mut self, raw_value: u16) {
        self.regulator.calibration_mut().set_raw_value(raw_value);
    }

    pub fn exit_calibration(&mut self, sink: &mut impl EventSink) {
        if self.regulator.calibration().duty_override().is_some() {
            self.regulator.calibration_mut().exit();
            sink.emit(&LoadEvent::CalibrationExited);
        }
    }

    pub fn in_calibration(&self) -> bool {
        self.regulator.calibration().duty_override().is_some()
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (front panel, console, collaborators).
    pub fn handle_command(
        &mut self,
        cmd: LoadCommand,
        out: &mut impl OutputPort,
        flags: &IsrFlags,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        match cmd {
            LoadCommand::Enable => self.enable(),
            LoadCommand::Disable(reason) => self.disable(reason, out, sink),
            LoadCommand::Toggle => {
                if self.regulator.is_active() || self.regulator.enable_pending() {
                    self.disable(DisableReason::User, out, sink);
                } else {
                    self.acknowledge_stop(sink);
                    self.enable();
                }
            }
            LoadCommand::ClearError => self.clear_error(sink),
            LoadCommand::AcknowledgeStop => {
                self.acknowledge_stop(sink);
            }
            LoadCommand::ClearCounters => self.clear_counters(sink),
            LoadCommand::RaiseFault(fault) => self.raise_fault(fault, sink),
            LoadCommand::SetMode(mode) => self.settings_mut().mode = mode,
            LoadCommand::SetSetpoint { mode, value } => {
                self.settings_mut().setpoints[mode] = value;
            }
            LoadCommand::SetCurrentLimit(limit) => {
                let stored = self.settings_mut().set_current_limit(limit);
                if stored != limit {
                    warn!("Current limit {limit} mA out of range, stored {stored} mA");
                }
            }
            LoadCommand::SetCutoff {
                enabled,
                voltage_mv,
            } => {
                let s = self.settings_mut();
                s.cutoff_enabled = enabled;
                s.cutoff_voltage = voltage_mv;
            }
            LoadCommand::SetMaxPowerAction(action) => {
                self.settings_mut().max_power_action = action;
            }
            LoadCommand::SetBeeper(on) => self.settings_mut().beeper_enabled = on,
            LoadCommand::Persist => {
                self.persist(flags, sink)?;
            }
            LoadCommand::EnterCalibration(raw) => self.enter_calibration(raw, sink),
            LoadCommand::SetCalibrationRaw(raw) => self.set_calibration_raw(raw),
            LoadCommand::ExitCalibration => self.exit_calibration(sink),
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot from the current state.
    pub fn telemetry(&self) -> TelemetryData {
        let settings = self.store.settings();
        TelemetryData {
            state: self.regulator.state(),
            mode: settings.mode,
            setpoint: settings.active_setpoint(),
            current_ma: self.regulator.current_setpoint(),
            regulated: self.regulator.regulated(),
            fault_code: self.regulator.error().map_or(0, LoadFault::code),
            milliamp_seconds: self.regulator.milliamp_seconds(),
            milliwatt_seconds: self.regulator.milliwatt_seconds(),
        }
    }

    pub fn state(&self) -> LoadState {
        self.regulator.state()
    }

    pub fn is_active(&self) -> bool {
        self.regulator.is_active()
    }

    pub fn error(&self) -> Option<LoadFault> {
        self.regulator.error()
    }

    pub fn regulated(&self) -> bool {
        self.regulator.regulated()
    }

    /// Last committed current command (mA).
    pub fn current_setpoint(&self) -> u16 {
        self.regulator.current_setpoint()
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Internal ──────────────────────────────────────────────

    /// Emit events for any state or fault change since the last report.
    fn report(&mut self, sink: &mut impl EventSink) {
        let error = self.regulator.error();
        if error != self.reported_fault {
            if let Some(fault) = error {
                sink.emit(&LoadEvent::FaultRaised(fault));
            }
            self.reported_fault = error;
        }

        let state = self.regulator.state();
        if state != self.reported_state {
            sink.emit(&LoadEvent::StateChanged {
                from: self.reported_state,
                to: state,
            });
            self.reported_state = state;
        }
    }
}
