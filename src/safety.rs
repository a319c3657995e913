//! Protection layers applied to every candidate current.
//!
//! The regulator computes a raw candidate from the active mode, then
//! passes it through these layers in a fixed order:
//!
//! 1. **Absolute range**: `[CUR_MIN_MA, CUR_MAX_MA]`, all modes.
//! 2. **Current limit**: operator limit, every mode except CC (in CC the
//!    setpoint *is* the current).  A limit below `CUR_MIN_MA` acts as
//!    `CUR_MIN_MA`, so layer 1's range still holds.
//! 3. **Power ceiling**: `POWER_ABS_MAX_MW` at the *terminal* voltage,
//!    only while the load is active.  Depending on the overload policy the
//!    candidate is clamped or an overload fault is requested.
//!
//! Cutoff is evaluated separately after the command has been written.

use crate::config::{CUR_MAX_MA, CUR_MIN_MA, POWER_ABS_MAX_MW};
use crate::settings::{MaxPowerAction, Mode, Settings};

/// Outcome of the power-ceiling check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerCheck {
    /// Candidate is sustainable; keep it.
    Within(u16),
    /// Candidate reduced to the ceiling.
    Clamped(u16),
    /// Ceiling exceeded under the FAULT policy.  The candidate is returned
    /// unchanged; the caller latches the fault.
    Overload(u16),
}

impl PowerCheck {
    /// Current to commit this tick.
    pub fn current(self) -> u16 {
        match self {
            Self::Within(c) | Self::Clamped(c) | Self::Overload(c) => c,
        }
    }
}

/// Layer 1: clamp to the hardware current range.
pub fn clamp_absolute(candidate: u32) -> u16 {
    candidate.clamp(u32::from(CUR_MIN_MA), u32::from(CUR_MAX_MA)) as u16
}

/// Layer 2: enforce the operator current limit outside CC mode.
pub fn apply_current_limit(candidate: u16, settings: &Settings) -> u16 {
    if settings.mode == Mode::Cc {
        candidate
    } else {
        candidate.min(settings.current_limit.max(CUR_MIN_MA))
    }
}

/// Largest current (mA) the pass element can sink at `terminal_mv`
/// without exceeding the absolute power ceiling.
pub fn power_limited_current(terminal_mv: u16) -> u32 {
    if terminal_mv == 0 {
        return u32::MAX;
    }
    POWER_ABS_MAX_MW * 1000 / u32::from(terminal_mv)
}

/// Layer 3: power ceiling.
pub fn check_power(
    candidate: u16,
    terminal_mv: u16,
    active: bool,
    action: MaxPowerAction,
) -> PowerCheck {
    let limit = power_limited_current(terminal_mv);
    if !active || u32::from(candidate) <= limit {
        return PowerCheck::Within(candidate);
    }
    match action {
        // limit < candidate <= u16::MAX here
        MaxPowerAction::Clamp => PowerCheck::Clamped(limit as u16),
        MaxPowerAction::Fault => PowerCheck::Overload(candidate),
    }
}

/// Whether the under-voltage cutoff should trip at `sensed_mv`.
pub fn cutoff_tripped(settings: &Settings, sensed_mv: u16) -> bool {
    settings.cutoff_enabled && sensed_mv < settings.cutoff_voltage
}
