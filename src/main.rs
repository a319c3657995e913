//! DC Load Firmware — Main Entry Point
//!
//! Hexagonal architecture with a tick-driven main loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter        LogEventSink        EepromAdapter      │
//! │  (Sensor+Output)        (EventSink)         (EepromPort)       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              LoadService (pure logic)                  │    │
//! │  │  Regulator · Energy · Settings · Calibration           │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Systick timer + GPIO ISRs ──▶ ISR_FLAGS ──▶ main loop          │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::gpio::PinDriver;
use esp_idf_hal::ledc::config::TimerConfig;
use esp_idf_hal::ledc::{LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use log::{error, info, warn};

use dcload::adapters::eeprom::EepromAdapter;
use dcload::adapters::hardware::{self, HardwareAdapter};
use dcload::adapters::log_sink::LogEventSink;
use dcload::app::commands::LoadCommand;
use dcload::app::service::LoadService;
use dcload::config::DutyCalibration;
use dcload::drivers::hw_init::{self, AdcVoltageChannel};
use dcload::drivers::{hw_timer, watchdog::TickWatchdog};
use dcload::events::{ISR_FLAGS, buttons};
use dcload::pins;
use dcload::settings::{Mode, SETTINGS_IMAGE_LEN};

/// Bytes reserved for the emulated EEPROM region.
const EEPROM_CAPACITY: usize = 64;

const _: () = assert!(SETTINGS_IMAGE_LEN < EEPROM_CAPACITY);

/// Setpoint change per encoder detent, in the unit of each mode.
fn detent_step(mode: Mode) -> u16 {
    match mode {
        Mode::Cc => 10,
        Mode::Cv => 10,
        Mode::Cr => 1,
        Mode::Cw => 100,
    }
}

fn nudge(value: u16, detents: i8, step: u16) -> u16 {
    let change = u16::from(detents.unsigned_abs()).saturating_mul(step);
    if detents < 0 {
        value.saturating_sub(change)
    } else {
        value.saturating_add(change)
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  DC Load v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Power stage: enable line first, released ───────────
    let p = Peripherals::take()?;
    let enable = hardware::released(PinDriver::output(p.pins.gpio2)?)
        .map_err(|e| anyhow::anyhow!("enable line release failed: {e:?}"))?;
    let status = PinDriver::input(p.pins.gpio3)?;
    let timer = LedcTimerDriver::new(
        p.ledc.timer0,
        &TimerConfig::new()
            .frequency(Hertz(pins::DUTY_PWM_FREQ_HZ))
            .resolution(Resolution::Bits12),
    )?;
    let duty = LedcDriver::new(p.ledc.channel0, &timer, p.pins.gpio1)?;
    info!(
        "Pins: duty=GPIO{} ({} bit) enable=GPIO{} status=GPIO{}",
        pins::DUTY_PWM_GPIO,
        pins::DUTY_PWM_RESOLUTION_BITS,
        pins::ENABLE_GPIO,
        pins::LOOP_STATUS_GPIO
    );

    let mut hw = HardwareAdapter::new(
        AdcVoltageChannel::new(pins::SENSE_ADC_CHANNEL),
        AdcVoltageChannel::new(pins::TERMINAL_ADC_CHANNEL),
        status,
        duty,
        enable,
    );

    // ── 3. Remaining peripherals ──────────────────────────────
    hw_init::init_peripherals()?;
    if let Err(e) = hw_init::init_isr_service() {
        error!("ISR service init failed: {}, front panel inactive", e);
    }

    // ── 4. Settings (EEPROM emulated in NVS) ──────────────────
    let eeprom = match EepromAdapter::open_nvs(EEPROM_CAPACITY) {
        Ok(e) => e,
        Err(e) => {
            warn!("NVS init failed ({}), settings will not survive a reboot", e);
            EepromAdapter::simulated(EEPROM_CAPACITY)
        }
    };

    let mut log_sink = LogEventSink::new();
    let mut service = LoadService::new(eeprom, DutyCalibration::default());
    service.start(&mut log_sink);

    // ── 5. Tick source + watchdog ─────────────────────────────
    if !hw_timer::start_systick() {
        anyhow::bail!("systick unavailable, refusing to run the load");
    }
    let mut watchdog = TickWatchdog::arm();

    info!("System ready. Entering main loop.");

    // ── 6. Main loop ──────────────────────────────────────────
    loop {
        if service.poll(&ISR_FLAGS, &mut hw, &mut log_sink) == 0 {
            core::hint::spin_loop();
        }

        let edges = ISR_FLAGS.take_button_edges();
        if edges & buttons::RUN != 0 {
            service.handle_command(LoadCommand::Toggle, &mut hw, &ISR_FLAGS, &mut log_sink)?;
        }
        if edges & buttons::ENCODER != 0 {
            if let Err(e) =
                service.handle_command(LoadCommand::Persist, &mut hw, &ISR_FLAGS, &mut log_sink)
            {
                warn!("Save rejected: {}", e);
            }
        }

        let detents = ISR_FLAGS.take_encoder_delta();
        if detents != 0 {
            let mode = service.settings().mode;
            let value = nudge(service.settings().setpoints[mode], detents, detent_step(mode));
            service.handle_command(
                LoadCommand::SetSetpoint { mode, value },
                &mut hw,
                &ISR_FLAGS,
                &mut log_sink,
            )?;
        }

        watchdog.service(service.tick_count());
    }
}
