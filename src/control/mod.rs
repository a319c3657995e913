//! Regulation controller.
//!
//! [`Regulator`] owns the load state, the sticky fault, the committed
//! current setpoint, the CV search state, the energy accumulators, and the
//! calibration pass-through.  Settings are only borrowed, once per tick.
//!
//! One call to [`Regulator::tick`] is one control period:
//!
//! ```text
//!  read sensors ─▶ energy integrator ─▶ regulate
//!                                         │
//!   1 calibration override? ── yes ──▶ raw duty, done
//!   2 sticky fault?         ── yes ──▶ DISABLED(ERROR), done
//!   3 candidate from mode (CC / CV / CR / CW)
//!   4 clamp to [CUR_MIN, CUR_MAX]
//!   5 clamp to current limit (not CC)
//!   6 power ceiling at terminal voltage (CLAMP or FAULT)
//!   7 commit setpoint, write duty
//!   8 cutoff check ─▶ DISABLED(CUTOFF)
//!   9 refresh `regulated`
//!  10 assert enable line (low) if active and fault-free
//! ```
//!
//! The candidate is recomputed on every tick, even while disabled, so the
//! first command after an enable is already current.

pub mod calibration;
pub mod cv;
pub mod energy;

use log::error;

use crate::app::ports::{LineLevel, OutputPort, SensorPort, SensorSnapshot};
use crate::config::DutyCalibration;
use crate::error::LoadFault;
use crate::safety::{self, PowerCheck};
use crate::settings::{Mode, Settings};
use crate::state::{DisableReason, LoadState, LoadStateMachine};

use calibration::Calibration;
use cv::CvTracker;
use energy::EnergyIntegrator;

pub struct Regulator {
    state: LoadStateMachine,
    regulated: bool,
    current_setpoint: u16,
    error: Option<LoadFault>,
    cv: CvTracker,
    energy: EnergyIntegrator,
    calibration: Calibration,
    duty_cal: DutyCalibration,
}

impl Default for Regulator {
    fn default() -> Self {
        Self::new(DutyCalibration::default())
    }
}

impl Regulator {
    pub fn new(duty_cal: DutyCalibration) -> Self {
        Self {
            state: LoadStateMachine::new(),
            regulated: false,
            current_setpoint: 0,
            error: None,
            cv: CvTracker::new(),
            energy: EnergyIntegrator::new(),
            calibration: Calibration::new(),
            duty_cal,
        }
    }

    // ── Per-tick ──────────────────────────────────────────────

    /// Run one control period: integrate, then regulate.
    pub fn tick(&mut self, settings: &Settings, hw: &mut (impl SensorPort + OutputPort)) {
        let snap = hw.read_all();
        self.energy.tick(
            self.state.is_active(),
            self.regulated,
            self.current_setpoint,
            snap.sensed_mv,
        );
        self.regulate(settings, &snap, hw);
    }

    fn regulate(&mut self, settings: &Settings, snap: &SensorSnapshot, out: &mut impl OutputPort) {
        if let Some(duty) = self.calibration.duty_override() {
            out.set_duty(duty);
            return;
        }

        if self.error.is_some() {
            self.disable(DisableReason::Error, out);
            return;
        }

        let was_active = self.state.is_active();
        self.state.apply_pending();
        let active = self.state.is_active();

        let raw = self.candidate(settings, snap.sensed_mv, !was_active);
        let candidate = safety::clamp_absolute(raw);
        let candidate = safety::apply_current_limit(candidate, settings);
        let check = safety::check_power(
            candidate,
            snap.terminal_mv,
            active,
            settings.max_power_action,
        );
        if let PowerCheck::Overload(current) = check {
            error!(
                "LOAD | {current} mA at {} mV exceeds the power ceiling",
                snap.terminal_mv
            );
            self.raise_fault(LoadFault::Overload);
        }

        self.current_setpoint = check.current();
        out.set_duty(self.duty_cal.duty_for(self.current_setpoint));

        if active && safety::cutoff_tripped(settings, snap.sensed_mv) {
            self.disable(DisableReason::Cutoff, out);
        }

        self.regulated = self.state.is_active() && snap.regulated;

        if self.state.is_active() && self.error.is_none() {
            out.set_enable_line(LineLevel::Low);
        }
    }

    /// Raw candidate current (mA) for the configured mode, before any
    /// protection layer.  Division by a zero voltage or resistance yields
    /// `u32::MAX`, which the range clamp turns into `CUR_MAX_MA`.
    fn candidate(&mut self, settings: &Settings, sensed_mv: u16, reseed: bool) -> u32 {
        let setpoint = settings.active_setpoint();
        match settings.mode {
            Mode::Cc => u32::from(setpoint),
            Mode::Cv => {
                if reseed {
                    self.cv.reseed();
                }
                let update = self.cv.update(sensed_mv, setpoint);
                if update.invariant_violated {
                    error!(
                        "HARD FAULT | CV step has wrong sign (step={}, sensed={sensed_mv} mV, setpoint={setpoint} mV)",
                        self.cv.step()
                    );
                    self.raise_fault(LoadFault::Internal);
                }
                u32::from(update.current)
            }
            // mV * 100 / (10 mΩ) = mA
            Mode::Cr => match setpoint {
                0 => u32::MAX,
                r => u32::from(sensed_mv) * 100 / u32::from(r),
            },
            // mW * 1000 / mV = mA
            Mode::Cw => match sensed_mv {
                0 => u32::MAX,
                v => u32::from(setpoint) * 1000 / u32::from(v),
            },
        }
    }

    // ── Commands ──────────────────────────────────────────────

    /// Request activation.  Takes effect on the next tick.
    pub fn enable(&mut self) {
        self.state.request_enable();
    }

    /// Switch off immediately and release the enable line.
    pub fn disable(&mut self, reason: DisableReason, out: &mut impl OutputPort) {
        self.state.disable(reason);
        self.regulated = false;
        out.set_enable_line(LineLevel::High);
    }

    /// Latch a sticky fault.  The first fault wins until it is cleared.
    pub fn raise_fault(&mut self, fault: LoadFault) {
        match self.error {
            None => {
                error!("FAULT | {fault} ({})", fault.display_code());
                self.error = Some(fault);
            }
            Some(latched) if latched != fault => {
                error!("FAULT | {fault} while {latched} is latched");
            }
            Some(_) => {}
        }
    }

    /// Operator acknowledgement of the latched fault.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Operator acknowledgement of an automatic stop: a CUTOFF or ERROR
    /// disable reason is turned back into USER once no fault is latched.
    /// Returns `true` if the reason changed.
    pub fn acknowledge_stop(&mut self) -> bool {
        match self.state.state() {
            LoadState::Disabled(DisableReason::Cutoff) => {
                self.state.disable(DisableReason::User)
            }
            LoadState::Disabled(DisableReason::Error) if self.error.is_none() => {
                self.state.disable(DisableReason::User)
            }
            _ => false,
        }
    }

    /// Zero both energy accumulators.
    pub fn clear_counters(&mut self) {
        self.energy.clear();
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn calibration_mut(&mut self) -> &mut Calibration {
        &mut self.calibration
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> LoadState {
        self.state.state()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn enable_pending(&self) -> bool {
        self.state.enable_pending()
    }

    /// Reason for the last disable; `None` while active.
    pub fn disable_reason(&self) -> Option<DisableReason> {
        self.state.state().disable_reason()
    }

    /// Whether the loop tracked its setpoint on the last active tick.
    pub fn regulated(&self) -> bool {
        self.regulated
    }

    /// Last committed current command (mA).
    pub fn current_setpoint(&self) -> u16 {
        self.current_setpoint
    }

    pub fn error(&self) -> Option<LoadFault> {
        self.error
    }

    pub fn milliamp_seconds(&self) -> u32 {
        self.energy.milliamp_seconds()
    }

    pub fn milliwatt_seconds(&self) -> u32 {
        self.energy.milliwatt_seconds()
    }
}
