//! GPIO / peripheral pin assignments for the DC load control board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Power stage
// ---------------------------------------------------------------------------

/// LEDC PWM output whose filtered duty sets the current reference.
pub const DUTY_PWM_GPIO: i32 = 1;
/// Digital output: load enable, **active LOW**.  Pulled up on the board so
/// the stage is off while the MCU is in reset.
pub const ENABLE_GPIO: i32 = 2;
/// Digital input: HIGH while the analog loop tracks the reference
/// (op-amp output not saturated).
pub const LOOP_STATUS_GPIO: i32 = 3;

// ---------------------------------------------------------------------------
// Voltage sensing — Analog (ADC1)
// ---------------------------------------------------------------------------

/// Sense-point voltage (remote sense when connected).
/// ADC1 channel 3 (GPIO 4 on ESP32-S3).
pub const SENSE_ADC_CHANNEL: u32 = 3;
/// Voltage at the load terminals.
/// ADC1 channel 4 (GPIO 5 on ESP32-S3).
pub const TERMINAL_ADC_CHANNEL: u32 = 4;
/// Input voltage that maps to a full-scale ADC reading (mV), i.e. the
/// 12 dB attenuation range times the 1:11 input divider.
pub const VOLTAGE_FULL_SCALE_MV: u32 = 34_100;

// ---------------------------------------------------------------------------
// Front panel (active-low with pull-ups)
// ---------------------------------------------------------------------------

/// Quadrature encoder phase A (interrupt on falling edge).
pub const ENCODER_A_GPIO: i32 = 6;
/// Quadrature encoder phase B (sampled in the phase A ISR).
pub const ENCODER_B_GPIO: i32 = 7;
/// Encoder push button.
pub const ENCODER_BUTTON_GPIO: i32 = 8;
/// Run / stop button.
pub const RUN_BUTTON_GPIO: i32 = 9;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC resolution for the duty output (bits).
pub const DUTY_PWM_RESOLUTION_BITS: u32 = 12;
/// LEDC frequency for the duty output.  Well above the reference
/// filter corner.
pub const DUTY_PWM_FREQ_HZ: u32 = 19_500;
