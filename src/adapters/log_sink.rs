//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured load events to the
//! ESP-IDF logger (which goes to UART / USB-CDC in production).
//! A front-panel or host-link adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::LoadEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`LoadEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &LoadEvent) {
        match event {
            LoadEvent::Telemetry(t) => {
                info!(
                    "TELEM | {} | {:?} set={} | I={}mA | reg={} | err={} | \
                     {}mAh {}mWh",
                    t.state,
                    t.mode,
                    t.setpoint,
                    t.current_ma,
                    if t.regulated { "yes" } else { "no" },
                    t.fault_code,
                    t.milliamp_hours(),
                    t.milliwatt_hours(),
                );
            }
            LoadEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from, to);
            }
            LoadEvent::FaultRaised(fault) => {
                warn!("FAULT | {} ({})", fault.display_code(), fault);
            }
            LoadEvent::FaultCleared(fault) => {
                info!("FAULT | {} cleared", fault.display_code());
            }
            LoadEvent::CountersCleared => {
                info!("COUNT | accumulators cleared");
            }
            LoadEvent::SettingsDefaulted => {
                warn!("SETTINGS | stored image unusable, defaults active");
            }
            LoadEvent::SettingsPersisted { bytes_written } => {
                info!("SETTINGS | saved ({} bytes written)", bytes_written);
            }
            LoadEvent::CalibrationEntered { raw_value } => {
                warn!("CAL | entered, raw duty={}", raw_value);
            }
            LoadEvent::CalibrationExited => {
                info!("CAL | exited");
            }
            LoadEvent::Started(state) => {
                info!("START | initial_state={}", state);
            }
        }
    }
}
