//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the orchestration of the DC load: the service
//! that ties settings, regulation, and fault handling together, plus the
//! commands it accepts and the events it emits.  All interaction with
//! hardware happens through **port traits** defined in [`ports`], keeping
//! this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
