//! Factory calibration pass-through.
//!
//! While the step is [`CalibrationStep::CurrentDuty`] the regulator is
//! bypassed entirely and the raw value goes straight to the duty output.
//! No clamping and no protection applies.  The operator workflow must
//! leave this mode explicitly.

use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationStep {
    #[default]
    Off,
    /// Operator is editing the raw current duty.
    CurrentDuty,
}

#[derive(Debug, Clone, Default)]
pub struct Calibration {
    step: CalibrationStep,
    raw_value: u16,
}

impl Calibration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter raw duty editing, starting from `raw_value`.
    pub fn enter_current_duty(&mut self, raw_value: u16) {
        warn!("CAL | raw duty pass-through engaged, protections bypassed");
        self.step = CalibrationStep::CurrentDuty;
        self.raw_value = raw_value;
    }

    pub fn set_raw_value(&mut self, raw_value: u16) {
        self.raw_value = raw_value;
    }

    pub fn exit(&mut self) {
        if self.step != CalibrationStep::Off {
            info!("CAL | pass-through released");
        }
        self.step = CalibrationStep::Off;
    }

    pub fn step(&self) -> CalibrationStep {
        self.step
    }

    /// Duty that must override the regulator this tick, if any.
    pub fn duty_override(&self) -> Option<u16> {
        match self.step {
            CalibrationStep::CurrentDuty => Some(self.raw_value),
            CalibrationStep::Off => None,
        }
    }
}
