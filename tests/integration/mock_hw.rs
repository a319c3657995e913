//! Mock hardware for integration tests.
//!
//! [`MockHardware`] models a DC source with internal resistance feeding
//! the load.  The current it sinks is recovered from the duty command by
//! inverting the duty calibration, and only flows while the enable line
//! is driven low.  Every output call is recorded so tests can assert on
//! the full command history without touching real GPIO/PWM registers.

use dcload::app::events::LoadEvent;
use dcload::app::ports::{
    EepromPort, EventSink, LineLevel, OutputPort, SensorPort, SensorSnapshot, StorageError,
};
use dcload::config::DutyCalibration;

// ── Output call record ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCall {
    Duty(u16),
    Enable(LineLevel),
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    /// Open-circuit source voltage (mV).
    pub open_circuit_mv: u16,
    /// Source resistance in mV per A, i.e. mΩ.
    pub source_milliohm: u32,
    /// Extra drop between the terminals and the sense point (mV).
    pub sense_drop_mv: u16,
    /// Loop status input.
    pub regulated: bool,
    pub calls: Vec<OutputCall>,
    duty_cal: DutyCalibration,
    duty: u16,
    line: LineLevel,
}

#[allow(dead_code)]
impl MockHardware {
    /// Ideal source: no internal resistance.
    pub fn stiff(mv: u16) -> Self {
        Self::with_resistance(mv, 0)
    }

    pub fn with_resistance(open_circuit_mv: u16, source_milliohm: u32) -> Self {
        Self {
            open_circuit_mv,
            source_milliohm,
            sense_drop_mv: 0,
            regulated: true,
            calls: Vec::new(),
            duty_cal: DutyCalibration::default(),
            duty: 0,
            line: LineLevel::High,
        }
    }

    /// Current actually flowing (mA).
    pub fn flowing_ma(&self) -> u32 {
        if self.line == LineLevel::High {
            return 0;
        }
        let scaled = (u64::from(self.duty) << 16) + u64::from(self.duty_cal.offset);
        (scaled / u64::from(self.duty_cal.slope)) as u32
    }

    pub fn terminal_mv(&self) -> u16 {
        let drop = self.flowing_ma() * self.source_milliohm / 1000;
        u32::from(self.open_circuit_mv).saturating_sub(drop) as u16
    }

    pub fn enable_line(&self) -> LineLevel {
        self.line
    }

    pub fn last_duty(&self) -> Option<u16> {
        self.calls.iter().rev().find_map(|c| match c {
            OutputCall::Duty(d) => Some(*d),
            OutputCall::Enable(_) => None,
        })
    }
}

impl SensorPort for MockHardware {
    fn read_all(&mut self) -> SensorSnapshot {
        let terminal_mv = self.terminal_mv();
        SensorSnapshot {
            sensed_mv: terminal_mv.saturating_sub(self.sense_drop_mv),
            terminal_mv,
            regulated: self.regulated,
        }
    }
}

impl OutputPort for MockHardware {
    fn set_duty(&mut self, duty: u16) {
        self.duty = duty;
        self.calls.push(OutputCall::Duty(duty));
    }

    fn set_enable_line(&mut self, level: LineLevel) {
        self.line = level;
        self.calls.push(OutputCall::Enable(level));
    }
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<LoadEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, event: &LoadEvent) -> bool {
        self.events.contains(event)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &LoadEvent) {
        self.events.push(event.clone());
    }
}

// ── Failing EEPROM ────────────────────────────────────────────

/// EEPROM whose writes always fail, for error-path tests.
pub struct BrokenEeprom;

impl EepromPort for BrokenEeprom {
    fn capacity(&self) -> usize {
        64
    }

    fn read_byte(&self, _addr: usize) -> Result<u8, StorageError> {
        Err(StorageError::IoError)
    }

    fn write_byte(&mut self, _addr: usize, _value: u8) -> Result<(), StorageError> {
        Err(StorageError::IoError)
    }
}
