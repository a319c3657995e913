//! One-shot hardware peripheral initialization.
//!
//! Configures the ADC channels and the front-panel GPIO interrupts using
//! raw ESP-IDF sys calls.  Called once from `main()` before the event loop
//! starts.  The power-stage pins (enable, loop status, duty PWM) are owned
//! by `esp-idf-hal` drivers and handed to the
//! [`HardwareAdapter`](crate::adapters::hardware::HardwareAdapter).

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::adapters::hardware::VoltageChannel;
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
        }
    }
}

impl core::error::Error for HwInitError {}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before event loop; single-threaded.
    unsafe {
        init_adc()?;
        init_gpio_inputs()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

/// Full-scale raw reading at 12-bit width.
const ADC_RAW_MAX: u32 = 4095;

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the single-threaded init path or the
/// main-loop ADC read path.  No concurrent access is possible because
/// `init_adc()` completes before the event loop starts.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };

    for channel in [pins::SENSE_ADC_CHANNEL, pins::TERMINAL_ADC_CHANNEL] {
        let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), channel, &chan_cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    info!(
        "hw_init: ADC1 configured (CH{}=sense, CH{}=terminal)",
        pins::SENSE_ADC_CHANNEL,
        pins::TERMINAL_ADC_CHANNEL
    );
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> u16 {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract — single-threaded main-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return 0;
    }
    raw.max(0) as u16
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(_channel: u32) -> u16 {
    0
}

/// Convert a raw 12-bit reading into millivolts at the input divider.
pub fn raw_to_mv(raw: u16, full_scale_mv: u32) -> u16 {
    let raw = u32::from(raw).min(ADC_RAW_MAX);
    (raw * full_scale_mv / ADC_RAW_MAX).min(u32::from(u16::MAX)) as u16
}

/// An ADC1 channel behind the input divider.
pub struct AdcVoltageChannel {
    channel: u32,
    full_scale_mv: u32,
}

impl AdcVoltageChannel {
    pub fn new(channel: u32) -> Self {
        Self {
            channel,
            full_scale_mv: pins::VOLTAGE_FULL_SCALE_MV,
        }
    }
}

impl VoltageChannel for AdcVoltageChannel {
    fn read_mv(&mut self) -> u16 {
        raw_to_mv(adc1_read(self.channel), self.full_scale_mv)
    }
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    let falling_edge = [
        pins::ENCODER_A_GPIO,
        pins::ENCODER_BUTTON_GPIO,
        pins::RUN_BUTTON_GPIO,
    ];

    for &pin in &falling_edge {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_NEGEDGE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
    }

    let phase_b = gpio_config_t {
        pin_bit_mask: 1u64 << pins::ENCODER_B_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&phase_b) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }

    info!("hw_init: front-panel GPIO inputs configured");
    Ok(())
}

// ── GPIO ISR Service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
use crate::events::{ISR_FLAGS, buttons};

#[cfg(target_os = "espidf")]
unsafe extern "C" fn encoder_isr(_arg: *mut core::ffi::c_void) {
    // Phase B leads phase A when turning clockwise.
    // SAFETY: gpio_get_level is a register read; safe in ISR context.
    let b_high = unsafe { gpio_get_level(pins::ENCODER_B_GPIO) } != 0;
    ISR_FLAGS.on_encoder_step(if b_high { 1 } else { -1 });
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn encoder_button_isr(_arg: *mut core::ffi::c_void) {
    ISR_FLAGS.on_button_edges(buttons::ENCODER);
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn run_button_isr(_arg: *mut core::ffi::c_void) {
    ISR_FLAGS.on_button_edges(buttons::RUN);
}

/// Install per-pin GPIO ISR service and register interrupt handlers.
/// Call after init_peripherals() and before the event loop.
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed (acceptable). Handlers registered
    // below only touch the atomics in `ISR_FLAGS`.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        gpio_isr_handler_add(pins::ENCODER_A_GPIO, Some(encoder_isr), core::ptr::null_mut());
        gpio_intr_enable(pins::ENCODER_A_GPIO);

        gpio_isr_handler_add(
            pins::ENCODER_BUTTON_GPIO,
            Some(encoder_button_isr),
            core::ptr::null_mut(),
        );
        gpio_intr_enable(pins::ENCODER_BUTTON_GPIO);

        gpio_isr_handler_add(pins::RUN_BUTTON_GPIO, Some(run_button_isr), core::ptr::null_mut());
        gpio_intr_enable(pins::RUN_BUTTON_GPIO);

        info!("hw_init: ISR service installed (encoder, encoder button, run button)");
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}
