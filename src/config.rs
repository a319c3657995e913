//! Build-time configuration for the regulation engine.
//!
//! Everything here is fixed at compile time.  Operator-tunable values
//! (mode, setpoints, limits) live in [`crate::settings::Settings`] and are
//! persisted to EEPROM instead.
//!
//! Units used throughout the firmware:
//!
//! | Quantity    | Unit              |
//! |-------------|-------------------|
//! | Current     | mA                |
//! | Voltage     | mV                |
//! | Resistance  | 10 mΩ (centiohm)  |
//! | Power       | mW                |

// --- Timing ---

/// Base control tick rate (Hz).  The tick drives the energy integrator
/// and then the regulator, once each.
pub const TICK_HZ: u32 = 1000;

/// Energy sample rate (Hz).  The integrator accumulates this many times
/// per second.
pub const ENERGY_SAMPLE_HZ: u32 = 10;

/// Control ticks between two energy samples.
pub const TICKS_PER_ENERGY_SAMPLE: u32 = TICK_HZ / ENERGY_SAMPLE_HZ;

const _: () = assert!(
    TICK_HZ % ENERGY_SAMPLE_HZ == 0,
    "ENERGY_SAMPLE_HZ must be an integer divider of TICK_HZ"
);

/// Control ticks between two telemetry events (once per second).
pub const TELEMETRY_INTERVAL_TICKS: u64 = TICK_HZ as u64;

// --- Absolute limits ---

/// Lowest current the regulator will ever command (mA).
pub const CUR_MIN_MA: u16 = 10;
/// Highest current the hardware can sink (mA).
pub const CUR_MAX_MA: u16 = 10_000;
/// Absolute dissipation ceiling of the pass element (mW).
pub const POWER_ABS_MAX_MW: u32 = 60_000;

const _: () = assert!(CUR_MIN_MA < CUR_MAX_MA);

// --- Constant-voltage hill climber ---

/// Largest magnitude the CV step may grow to.
pub const CV_STEP_MAX: i16 = 200;
/// The accumulated step is divided by this before being applied.
pub const CV_STEP_DAMPING: i16 = 16;

// --- Settings defaults ---

pub const DEFAULT_SETPOINT_CC_MA: u16 = 1_000;
pub const DEFAULT_SETPOINT_CV_MV: u16 = 10_000;
pub const DEFAULT_SETPOINT_CR_CENTIOHM: u16 = 50_000;
pub const DEFAULT_SETPOINT_CW_MW: u16 = 30_000;
pub const DEFAULT_CUTOFF_MV: u16 = 3_300;

// --- Duty mapping ---

/// Two-point linear mapping from commanded current to PWM duty.
///
/// `duty = (current_ma * slope - offset) >> 16`, saturated to the 16-bit
/// duty range.  `slope` and `offset` are 16.16 fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCalibration {
    pub slope: u32,
    pub offset: u32,
}

impl DutyCalibration {
    /// Map a current (mA) onto the duty domain.
    pub fn duty_for(&self, current_ma: u16) -> u16 {
        let raw = u64::from(current_ma) * u64::from(self.slope);
        let raw = raw.saturating_sub(u64::from(self.offset)) >> 16;
        raw.min(u64::from(u16::MAX)) as u16
    }
}

impl Default for DutyCalibration {
    fn default() -> Self {
        Self {
            // Full scale (CUR_MAX_MA) lands just below 0xFFFF.
            slope: 429_490,
            // ~30 counts of op-amp input offset.
            offset: 2_000_000,
        }
    }
}
