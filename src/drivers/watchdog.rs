//! Tick-supervised task watchdog.
//!
//! The TWDT is fed only when the control tick counter has moved since
//! the previous feed.  A stalled main loop and a dead systick timer both
//! starve it, and the resulting reset leaves the enable line released.

use log::info;

/// Time without a control tick that triggers a reset.
pub const WATCHDOG_TIMEOUT_MS: u32 = 500;

/// Opens once per advance of the tick counter.
#[derive(Debug, Default)]
pub struct TickGate {
    last_tick: Option<u64>,
}

impl TickGate {
    /// `true` if `tick_count` differs from the value seen last time.
    pub fn advanced(&mut self, tick_count: u64) -> bool {
        if self.last_tick == Some(tick_count) {
            return false;
        }
        self.last_tick = Some(tick_count);
        true
    }
}

pub struct TickWatchdog {
    gate: TickGate,
    armed: bool,
}

impl TickWatchdog {
    /// Subscribe the calling task to the TWDT.  On host, or if the
    /// subscription fails, the watchdog stays unarmed and `service` only
    /// tracks ticks.
    pub fn arm() -> Self {
        Self {
            gate: TickGate::default(),
            armed: subscribe_current_task(WATCHDOG_TIMEOUT_MS),
        }
    }

    /// Feed the TWDT if a control tick ran since the last call.  Returns
    /// whether it was fed.
    pub fn service(&mut self, tick_count: u64) -> bool {
        if !self.gate.advanced(tick_count) {
            return false;
        }
        if self.armed {
            reset_task_wdt();
        }
        true
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

#[cfg(target_os = "espidf")]
fn subscribe_current_task(timeout_ms: u32) -> bool {
    use esp_idf_svc::sys::{ESP_OK, esp_task_wdt_add, esp_task_wdt_config_t, esp_task_wdt_reconfigure};

    let cfg = esp_task_wdt_config_t {
        timeout_ms,
        idle_core_mask: 0,
        trigger_panic: true,
    };
    // SAFETY: called once from the main task at boot.
    let rc = unsafe { esp_task_wdt_reconfigure(&cfg) };
    if rc != ESP_OK {
        log::warn!("WDT | reconfigure rc={rc}, keeping the boot configuration");
    }
    // SAFETY: a null handle subscribes the calling task.
    let rc = unsafe { esp_task_wdt_add(core::ptr::null_mut()) };
    if rc != ESP_OK {
        log::warn!("WDT | subscribe failed rc={rc}, running unsupervised");
        return false;
    }
    info!("WDT | armed: {timeout_ms} ms without a control tick resets");
    true
}

#[cfg(not(target_os = "espidf"))]
fn subscribe_current_task(timeout_ms: u32) -> bool {
    info!("WDT(sim) | {timeout_ms} ms timeout, not armed");
    false
}

#[cfg(target_os = "espidf")]
fn reset_task_wdt() {
    // SAFETY: only reached from the subscribed main task.
    unsafe {
        esp_idf_svc::sys::esp_task_wdt_reset();
    }
}

#[cfg(not(target_os = "espidf"))]
fn reset_task_wdt() {}
