//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                  |
//! |----------------|--------------------|------------------------------|
//! | `eeprom`       | EepromPort         | NVS blob / in-memory bytes   |
//! | `hardware`     | SensorPort         | ADC channels, status GPIO    |
//! |                | OutputPort         | LEDC duty PWM, enable GPIO   |
//! | `log_sink`     | EventSink          | Serial log output            |

pub mod eeprom;
pub mod hardware;
pub mod log_sink;
