//! DC load firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod pins;
pub mod safety;
pub mod settings;
pub mod state;

// The ESP-IDF-only parts are guarded by cfg attributes inside, so these
// compile (as simulation stubs) on the host too.
pub mod adapters;
pub mod drivers;
