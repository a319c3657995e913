//! Control tick timer using ESP-IDF's esp_timer API.
//!
//! One periodic timer at [`TICK_HZ`] marks a control period in
//! [`ISR_FLAGS`](crate::events::ISR_FLAGS).  The callback runs in the ESP
//! timer task context (not ISR) and only touches atomics.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::config::TICK_HZ;

/// Tick period in microseconds.
pub const TICK_PERIOD_US: u64 = 1_000_000 / TICK_HZ as u64;

#[cfg(target_os = "espidf")]
static mut SYSTICK_TIMER: esp_timer_handle_t = core::ptr::null_mut();

/// SAFETY: SYSTICK_TIMER is written once in `start_systick()` before any
/// timer callbacks fire.  Only called from the single main task.
#[cfg(target_os = "espidf")]
unsafe fn systick_timer() -> esp_timer_handle_t {
    unsafe { SYSTICK_TIMER }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn systick_cb(_arg: *mut core::ffi::c_void) {
    crate::events::ISR_FLAGS.on_systick();
}

/// Start the control tick timer.  Returns `false` if the timer could not
/// be created or started; the caller must not enable the load then.
#[cfg(target_os = "espidf")]
pub fn start_systick() -> bool {
    // SAFETY: SYSTICK_TIMER is written here once at boot from the single
    // main-task context before any timer callbacks fire.
    unsafe {
        let args = esp_timer_create_args_t {
            callback: Some(systick_cb),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: c"systick".as_ptr(),
            // Missed periods must stay visible as an overrun.
            skip_unhandled_events: false,
        };
        let ret = esp_timer_create(&args, &raw mut SYSTICK_TIMER);
        if ret != ESP_OK {
            log::error!("hw_timer: systick create failed (rc={})", ret);
            return false;
        }
        let ret = esp_timer_start_periodic(systick_timer(), TICK_PERIOD_US);
        if ret != ESP_OK {
            log::error!("hw_timer: systick start failed (rc={})", ret);
            return false;
        }
        info!("hw_timer: systick@{}Hz started", TICK_HZ);
    }
    true
}

#[cfg(not(target_os = "espidf"))]
pub fn start_systick() -> bool {
    log::info!("hw_timer(sim): systick not started (ticks injected by caller)");
    true
}
