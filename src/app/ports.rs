//! Port traits — the hexagonal boundary between the regulation engine and
//! the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ LoadService (domain)
//! ```
//!
//! Driven adapters (voltage sensing, duty/enable outputs, EEPROM, event
//! sinks) implement these traits.  The [`LoadService`](super::service::LoadService)
//! consumes them via generics, so the control core never touches hardware
//! directly and can be driven by fakes in tests.

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// A point-in-time reading of every input the regulator consumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorSnapshot {
    /// Voltage at the sense point (mV).  Used for regulation and cutoff.
    pub sensed_mv: u16,
    /// Voltage at the load terminals (mV).  Used only for power limiting,
    /// because dissipation in the pass element depends on what actually
    /// reaches the terminals, not on the remote sense point.
    pub terminal_mv: u16,
    /// Loop-tracking status input: `true` while the analog loop follows
    /// the commanded current instead of sitting against a rail.
    pub regulated: bool,
}

/// Read-side port: the domain calls this once per tick.
pub trait SensorPort {
    fn read_all(&mut self) -> SensorSnapshot;
}

// ───────────────────────────────────────────────────────────────
// Output port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Electrical level of a digital output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineLevel {
    Low,
    High,
}

/// Write-side port: duty command and enable line.
///
/// The enable line is **active-low**: the regulator drives
/// [`LineLevel::Low`] to let current flow and [`LineLevel::High`] to
/// switch the load off.  Implementations must pass the level through
/// unchanged.
pub trait OutputPort {
    /// Apply the 16-bit duty value that sets the current reference.
    fn set_duty(&mut self, duty: u16);

    /// Drive the enable line to `level`.
    fn set_enable_line(&mut self, level: LineLevel);
}

// ───────────────────────────────────────────────────────────────
// EEPROM port (driven adapter: domain ↔ non-volatile bytes)
// ───────────────────────────────────────────────────────────────

/// Byte-addressable non-volatile memory used by the settings store.
///
/// Writes may be slow (tens of milliseconds for a full image).  They must
/// never be issued from interrupt context.
pub trait EepromPort {
    /// Number of addressable bytes.
    fn capacity(&self) -> usize;

    /// Read one byte.
    fn read_byte(&self, addr: usize) -> Result<u8, StorageError>;

    /// Write one byte.  Callers are expected to skip unchanged bytes.
    fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), StorageError>;

    /// Flush any buffered writes.  Backends that write through can
    /// rely on the default.
    fn commit(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`LoadEvent`](super::events::LoadEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::LoadEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`EepromPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Address outside the EEPROM.
    OutOfRange,
    /// Backend could not complete the access.
    IoError,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "address out of range"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
