//! Interrupt-shared flags and counters.
//!
//! Producers are the systick ISR, the quadrature-encoder ISR, and the
//! button ISR.  The consumer is the main loop.  The discipline is strict:
//!
//! - ISRs only **set** bits or **increment** counters;
//! - the main loop only **reads and clears**, atomically, via `take_*`.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │ Systick ISR │────▶│ tick_pending     │     │              │
//! │ Encoder ISR │────▶│ encoder_delta    │────▶│  Main Loop   │
//! │ Button ISR  │────▶│ button_edges     │     │  (consumer)  │
//! └─────────────┘     └──────────────────┘     └──────────────┘
//! ```
//!
//! Every value is a single byte so each access is one atomic operation on
//! any target.  The firmware uses the [`ISR_FLAGS`] static; tests build
//! their own [`IsrFlags`].

use core::sync::atomic::{AtomicBool, AtomicI8, AtomicU8, Ordering};

/// Button edge bits reported by [`IsrFlags::take_button_edges`].
pub mod buttons {
    /// Encoder push button pressed.
    pub const ENCODER: u8 = 0b0000_0001;
    /// Run/stop button pressed.
    pub const RUN: u8 = 0b0000_0010;
}

/// The flags shared between ISRs and the main loop.
pub static ISR_FLAGS: IsrFlags = IsrFlags::new();

pub struct IsrFlags {
    tick_pending: AtomicU8,
    tick_overflow: AtomicBool,
    encoder_delta: AtomicI8,
    button_edges: AtomicU8,
}

impl Default for IsrFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl IsrFlags {
    pub const fn new() -> Self {
        Self {
            tick_pending: AtomicU8::new(0),
            tick_overflow: AtomicBool::new(false),
            encoder_delta: AtomicI8::new(0),
            button_edges: AtomicU8::new(0),
        }
    }

    // ── Producers (ISR context) ───────────────────────────────

    /// Systick ISR: one more control period has elapsed.
    ///
    /// If the previous tick has not been consumed yet the main loop is
    /// overrunning; the overflow flag records that.
    pub fn on_systick(&self) {
        let previous = self.tick_pending.fetch_add(1, Ordering::AcqRel);
        if previous > 0 {
            self.tick_overflow.store(true, Ordering::Release);
        }
        if previous == u8::MAX {
            // Keep the count from wrapping back to "no tick".
            self.tick_pending.store(u8::MAX, Ordering::Release);
        }
    }

    /// Encoder ISR: one detent clockwise (`+1`) or counter-clockwise (`-1`).
    pub fn on_encoder_step(&self, direction: i8) {
        // Saturate if the main loop falls far behind.
        let _ = self
            .encoder_delta
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| {
                Some(d.saturating_add(direction))
            });
    }

    /// Button ISR: latch falling edges (`buttons::*` bits).
    pub fn on_button_edges(&self, bits: u8) {
        self.button_edges.fetch_or(bits, Ordering::AcqRel);
    }

    // ── Consumers (main loop) ─────────────────────────────────

    /// Take all pending ticks.  Returns how many periods elapsed since
    /// the last call (saturating at 255).
    pub fn take_ticks(&self) -> u8 {
        self.tick_pending.swap(0, Ordering::AcqRel)
    }

    /// Read and clear the overrun flag.
    pub fn take_tick_overflow(&self) -> bool {
        self.tick_overflow.swap(false, Ordering::AcqRel)
    }

    /// Discard pending ticks and the overrun flag.
    ///
    /// Call after a deliberately slow operation (EEPROM persist) so the
    /// delay it introduced is not reported as a timing fault.
    pub fn clear_tick_flags(&self) {
        self.tick_pending.store(0, Ordering::Release);
        self.tick_overflow.store(false, Ordering::Release);
    }

    /// Read and clear the accumulated encoder movement.
    pub fn take_encoder_delta(&self) -> i8 {
        self.encoder_delta.swap(0, Ordering::AcqRel)
    }

    /// Read and clear the latched button edges.
    pub fn take_button_edges(&self) -> u8 {
        self.button_edges.swap(0, Ordering::AcqRel)
    }
}
