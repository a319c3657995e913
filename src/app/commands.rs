//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (front panel,
//! serial console, protection collaborators) that the
//! [`LoadService`](super::service::LoadService) interprets and acts upon.

use crate::error::LoadFault;
use crate::settings::{MaxPowerAction, Mode};
use crate::state::DisableReason;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadCommand {
    /// Request activation on the next tick.
    Enable,

    /// Switch the load off immediately.
    Disable(DisableReason),

    /// Run/stop toggle as on the front panel: enables a disabled load,
    /// disables an active one.
    Toggle,

    /// Acknowledge the latched fault.
    ClearError,

    /// Acknowledge an automatic stop (cutoff or cleared fault).
    AcknowledgeStop,

    /// Zero the charge and energy accumulators.
    ClearCounters,

    /// Report a fault detected outside the regulator.
    RaiseFault(LoadFault),

    // ── Settings edits (live, not persisted) ─────────────────
    SetMode(Mode),
    SetSetpoint { mode: Mode, value: u16 },
    SetCurrentLimit(u16),
    SetCutoff { enabled: bool, voltage_mv: u16 },
    SetMaxPowerAction(MaxPowerAction),
    SetBeeper(bool),

    /// Write the live settings to EEPROM.
    Persist,

    // ── Factory calibration ──────────────────────────────────
    EnterCalibration(u16),
    SetCalibrationRaw(u16),
    ExitCalibration,
}
