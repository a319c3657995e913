//! Outbound application events.
//!
//! The [`LoadService`](super::service::LoadService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, refresh the front
//! panel, stream to a host.

use crate::error::LoadFault;
use crate::settings::Mode;
use crate::state::LoadState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    /// The service has started (carries the initial state).
    Started(LoadState),

    /// The load state changed.
    StateChanged { from: LoadState, to: LoadState },

    /// A sticky fault was latched.
    FaultRaised(LoadFault),

    /// The operator acknowledged the latched fault.
    FaultCleared(LoadFault),

    /// Both energy accumulators were zeroed.
    CountersCleared,

    /// The stored settings image was unusable; defaults are live.
    SettingsDefaulted,

    /// Settings were written back to EEPROM.
    SettingsPersisted { bytes_written: usize },

    /// Raw duty pass-through engaged.
    CalibrationEntered { raw_value: u16 },

    /// Raw duty pass-through released.
    CalibrationExited,

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),
}

/// A point-in-time telemetry snapshot suitable for logging or display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryData {
    pub state: LoadState,
    pub mode: Mode,
    /// Setpoint of the active mode, in that mode's unit.
    pub setpoint: u16,
    /// Last committed current command (mA).
    pub current_ma: u16,
    pub regulated: bool,
    /// Latched fault code, 0 when none.
    pub fault_code: u8,
    pub milliamp_seconds: u32,
    pub milliwatt_seconds: u32,
}

impl TelemetryData {
    /// Accumulated charge in mAh, as shown on the display.
    pub fn milliamp_hours(&self) -> u32 {
        self.milliamp_seconds / 3600
    }

    /// Accumulated energy in mWh, as shown on the display.
    pub fn milliwatt_hours(&self) -> u32 {
        self.milliwatt_seconds / 3600
    }
}
