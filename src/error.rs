//! Unified error types for the DC load firmware.
//!
//! Two families live here:
//!
//! - [`LoadFault`]: the *sticky* fault taxonomy held in the load state.
//!   A fault disables the load on the next tick and stays latched until
//!   the operator acknowledges it.
//! - [`Error`]: ordinary fallible-operation errors (storage, settings,
//!   peripheral init).  These never touch the load state directly.

use core::fmt;

use crate::app::ports::StorageError;

// ---------------------------------------------------------------------------
// Sticky load faults
// ---------------------------------------------------------------------------

/// Sticky fault kinds.  "No fault" is expressed as `Option::<LoadFault>::None`.
///
/// The regulator itself raises only [`Overload`](Self::Overload) and
/// [`Internal`](Self::Internal); the other kinds are reported by external
/// collaborators (polarity detection, thermal sensing, supervisor, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LoadFault {
    /// Source connected with reversed polarity.
    Polarity = 1,
    /// Input voltage above the rated maximum.
    OverVoltage = 2,
    /// Power ceiling exceeded under the FAULT overload policy.
    Overload = 3,
    /// Generic power-stage failure.
    Power = 4,
    /// Heatsink over temperature.
    Temperature = 5,
    /// Auxiliary supply out of range.
    Supply = 6,
    /// Control tick overran its period.
    Timing = 7,
    /// Control-law invariant violated.  Indicates a firmware bug.
    Internal = 8,
    /// Malformed or out-of-range command from a collaborator.
    Command = 9,
}

impl LoadFault {
    /// Stable numeric code (matches the front-panel error numbering).
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Four-character code shown on the segment display.
    pub const fn display_code(self) -> &'static str {
        match self {
            Self::Polarity => "POL ",
            Self::OverVoltage => "OVP ",
            Self::Overload => "OVLD",
            Self::Power => "PWR ",
            Self::Temperature => "TEMP",
            Self::Supply => "SUP ",
            Self::Timing => "TIME",
            Self::Internal => "INT ",
            Self::Command => "CMD ",
        }
    }
}

impl fmt::Display for LoadFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Polarity => write!(f, "reverse polarity"),
            Self::OverVoltage => write!(f, "over voltage"),
            Self::Overload => write!(f, "power overload"),
            Self::Power => write!(f, "power stage failure"),
            Self::Temperature => write!(f, "over temperature"),
            Self::Supply => write!(f, "supply out of range"),
            Self::Timing => write!(f, "control tick overrun"),
            Self::Internal => write!(f, "internal control error"),
            Self::Command => write!(f, "invalid command"),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible non-control operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The EEPROM backend failed.
    Storage(StorageError),
    /// A settings operation was rejected.
    Settings(&'static str),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Settings(msg) => write!(f, "settings: {msg}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_FAULTS: [LoadFault; 9] = [
        LoadFault::Polarity,
        LoadFault::OverVoltage,
        LoadFault::Overload,
        LoadFault::Power,
        LoadFault::Temperature,
        LoadFault::Supply,
        LoadFault::Timing,
        LoadFault::Internal,
        LoadFault::Command,
    ];

    #[test]
    fn fault_codes_are_stable() {
        for (i, fault) in ALL_FAULTS.iter().enumerate() {
            assert_eq!(usize::from(fault.code()), i + 1, "{fault:?}");
        }
    }

    #[test]
    fn display_codes_are_four_chars() {
        for fault in ALL_FAULTS {
            assert_eq!(fault.display_code().len(), 4, "{fault:?}");
        }
    }

    #[test]
    fn storage_error_converts() {
        let e: Error = StorageError::IoError.into();
        assert_eq!(e, Error::Storage(StorageError::IoError));
        assert_eq!(e.to_string(), "storage: I/O error");
    }
}
