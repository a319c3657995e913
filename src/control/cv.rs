//! Constant-voltage hill climber.
//!
//! CV mode has no direct formula for the current, so it searches for it.
//! Each tick the current is nudged by `step / CV_STEP_DAMPING`:
//!
//! - sensed voltage below the setpoint: the load pulls too much current,
//!   so the step must be negative;
//! - otherwise the step must be positive.
//!
//! While the direction holds, the step magnitude grows by one per tick up
//! to [`CV_STEP_MAX`]; a direction change resets it to ±1.  The damping
//! divisor means small steps do not move the current at all, which keeps
//! the loop quiet around the operating point.
//!
//! The sign checks after each update can only fail if the update rules
//! above are broken.  They are kept as a hard-fault tripwire.

use crate::config::{CUR_MAX_MA, CUR_MIN_MA, CV_STEP_DAMPING, CV_STEP_MAX};

/// Result of one hill-climbing update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CvUpdate {
    /// New candidate current (mA).
    pub current: u16,
    /// The step ended up with the wrong sign for its branch.
    pub invariant_violated: bool,
}

#[derive(Debug, Clone)]
pub struct CvTracker {
    current: u16,
    step: i16,
}

impl Default for CvTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CvTracker {
    pub fn new() -> Self {
        Self {
            current: CUR_MIN_MA,
            step: CV_STEP_MAX / 2,
        }
    }

    /// Discard the previous search and start again from the minimum
    /// current with a large upward bias.
    pub fn reseed(&mut self) {
        *self = Self::new();
    }

    /// Run one update against the latest measurement.
    pub fn update(&mut self, sensed_mv: u16, setpoint_mv: u16) -> CvUpdate {
        let invariant_violated;
        let current = i32::from(self.current);

        let next = if sensed_mv < setpoint_mv {
            // Current too high.
            if self.step < 0 {
                if self.step > -CV_STEP_MAX {
                    self.step -= 1;
                }
            } else {
                self.step = -1;
            }
            invariant_violated = self.step > 0;
            (current + i32::from(self.step / CV_STEP_DAMPING)).max(i32::from(CUR_MIN_MA))
        } else {
            // Current too low.
            if self.step > 0 {
                if self.step < CV_STEP_MAX {
                    self.step += 1;
                }
            } else {
                self.step = 1;
            }
            invariant_violated = self.step < 0;
            (current + i32::from(self.step / CV_STEP_DAMPING)).min(i32::from(CUR_MAX_MA))
        };

        self.current = next as u16;
        CvUpdate {
            current: self.current,
            invariant_violated,
        }
    }

    /// Carried-forward candidate (mA).
    pub fn current(&self) -> u16 {
        self.current
    }

    /// Signed step before damping.
    pub fn step(&self) -> i16 {
        self.step
    }
}
