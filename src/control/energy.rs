//! Charge and energy integration.
//!
//! Every [`TICKS_PER_ENERGY_SAMPLE`] ticks of regulated operation the
//! integrator takes one sample of the commanded current and the sensed
//! voltage and adds `sample / ENERGY_SAMPLE_HZ` to each accumulator.  The
//! division remainder is carried into the next sample, so truncation error
//! never builds up: after any number of samples the totals are within one
//! unit of the exact integral.
//!
//! While the load is off or not regulating the true current is unknown;
//! the accumulators and the sample divider are frozen, not decayed.

use crate::config::{ENERGY_SAMPLE_HZ, TICKS_PER_ENERGY_SAMPLE};

#[derive(Debug, Clone, Default)]
pub struct EnergyIntegrator {
    milliamp_seconds: u32,
    milliwatt_seconds: u32,
    /// Ticks since the last sample.
    divider: u32,
    current_remainder: u32,
    power_remainder: u32,
}

impl EnergyIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one control tick.
    ///
    /// `current_ma` is the last committed setpoint, `sensed_mv` the sensed
    /// voltage.  Nothing happens unless `active && regulated`.
    pub fn tick(&mut self, active: bool, regulated: bool, current_ma: u16, sensed_mv: u16) {
        if !active || !regulated {
            return;
        }
        self.divider += 1;
        if self.divider < TICKS_PER_ENERGY_SAMPLE {
            return;
        }
        self.divider = 0;
        self.sample(current_ma, sensed_mv);
    }

    fn sample(&mut self, current_ma: u16, sensed_mv: u16) {
        let power_mw = u32::from(current_ma) * u32::from(sensed_mv) / 1000;
        let power = power_mw + self.power_remainder;
        self.power_remainder = power % ENERGY_SAMPLE_HZ;
        self.milliwatt_seconds = self
            .milliwatt_seconds
            .saturating_add(power / ENERGY_SAMPLE_HZ);

        let current = u32::from(current_ma) + self.current_remainder;
        self.current_remainder = current % ENERGY_SAMPLE_HZ;
        self.milliamp_seconds = self
            .milliamp_seconds
            .saturating_add(current / ENERGY_SAMPLE_HZ);
    }

    /// Accumulated charge (mA·s).
    pub fn milliamp_seconds(&self) -> u32 {
        self.milliamp_seconds
    }

    /// Accumulated energy (mW·s).
    pub fn milliwatt_seconds(&self) -> u32 {
        self.milliwatt_seconds
    }

    /// Zero both accumulators.  Carried remainders and the sample phase
    /// are discarded too, so the next full second counts exactly.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
