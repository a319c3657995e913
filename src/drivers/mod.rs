//! Hardware initialisation, tick timer, and watchdog.

pub mod hw_init;
pub mod hw_timer;
pub mod watchdog;
