//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the two voltage channels, the loop-status input, the duty PWM,
//! and the enable output, exposing them through [`SensorPort`] and
//! [`OutputPort`].  Pins and PWM are taken as `embedded-hal` 1.0 traits,
//! so the same adapter runs on ESP-IDF peripherals and on test doubles.
//!
//! Pin errors cannot be surfaced through the ports.  They are logged, and
//! a failed status read counts as "not regulated".

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::app::ports::{LineLevel, OutputPort, SensorPort, SensorSnapshot};

/// One ADC channel already scaled to millivolts at the load terminals
/// (divider ratio and ADC reference applied).
pub trait VoltageChannel {
    fn read_mv(&mut self) -> u16;
}

/// Drive a freshly configured enable output High (load off) and hand it
/// back.  Call this before any other peripheral is set up: a new push-pull
/// output starts low, which asserts the active-low line.
pub fn released<L: OutputPin>(mut enable: L) -> Result<L, L::Error> {
    enable.set_high()?;
    Ok(enable)
}

/// Concrete adapter that combines all load hardware behind port traits.
pub struct HardwareAdapter<S, T, R, D, L> {
    sensed: S,
    terminal: T,
    status: R,
    duty: D,
    enable: L,
}

impl<S, T, R, D, L> HardwareAdapter<S, T, R, D, L>
where
    S: VoltageChannel,
    T: VoltageChannel,
    R: InputPin,
    D: SetDutyCycle,
    L: OutputPin,
{
    /// Build the adapter and immediately release the enable line so the
    /// load is off until the regulator asserts it.
    pub fn new(sensed: S, terminal: T, status: R, duty: D, enable: L) -> Self {
        let mut hw = Self {
            sensed,
            terminal,
            status,
            duty,
            enable,
        };
        hw.set_enable_line(LineLevel::High);
        hw
    }

    /// Give the peripherals back (used by tests to inspect doubles).
    pub fn release(self) -> (S, T, R, D, L) {
        (self.sensed, self.terminal, self.status, self.duty, self.enable)
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<S, T, R, D, L> SensorPort for HardwareAdapter<S, T, R, D, L>
where
    S: VoltageChannel,
    T: VoltageChannel,
    R: InputPin,
{
    fn read_all(&mut self) -> SensorSnapshot {
        let regulated = match self.status.is_high() {
            Ok(high) => high,
            Err(e) => {
                warn!("HW | loop status read failed: {e:?}");
                false
            }
        };
        SensorSnapshot {
            sensed_mv: self.sensed.read_mv(),
            terminal_mv: self.terminal.read_mv(),
            regulated,
        }
    }
}

// ── OutputPort implementation ─────────────────────────────────

impl<S, T, R, D, L> OutputPort for HardwareAdapter<S, T, R, D, L>
where
    D: SetDutyCycle,
    L: OutputPin,
{
    fn set_duty(&mut self, duty: u16) {
        // The 16-bit duty is full scale; the PWM may have fewer bits.
        if let Err(e) = self.duty.set_duty_cycle_fraction(duty, u16::MAX) {
            warn!("HW | duty write failed: {e:?}");
        }
    }

    fn set_enable_line(&mut self, level: LineLevel) {
        let result = match level {
            LineLevel::Low => self.enable.set_low(),
            LineLevel::High => self.enable.set_high(),
        };
        if let Err(e) = result {
            warn!("HW | enable line write failed: {e:?}");
        }
    }
}
