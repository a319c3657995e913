//! Durable operator settings and their EEPROM store.
//!
//! The settings image is the postcard encoding of [`Settings`] with all
//! integers in fixed-width little-endian form, so the image length never
//! depends on the values stored.  One checksum byte follows the image:
//!
//! ```text
//!  addr 0                              IMAGE_LEN
//!  ┌──────────────────────────────────┬──────────┐
//!  │ postcard(Settings), fixed width  │ checksum │
//!  └──────────────────────────────────┴──────────┘
//! ```
//!
//! If the layout ever grows, the checksum lands on a different address
//! and the old image is rejected automatically.

use core::ops::{Index, IndexMut};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::EepromPort;
use crate::config::{
    CUR_MAX_MA, CUR_MIN_MA, DEFAULT_CUTOFF_MV, DEFAULT_SETPOINT_CC_MA, DEFAULT_SETPOINT_CR_CENTIOHM,
    DEFAULT_SETPOINT_CV_MV, DEFAULT_SETPOINT_CW_MW,
};
use crate::error::{Error, Result};

/// Encoded length of [`Settings`] in bytes (checksum excluded).
pub const SETTINGS_IMAGE_LEN: usize = 16;

/// Seed of the XOR-fold checksum.
const CHECKSUM_SEED: u8 = 0x55;

// ---------------------------------------------------------------------------
// Settings model
// ---------------------------------------------------------------------------

/// Regulation law.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Constant current (setpoint in mA).
    Cc,
    /// Constant voltage (setpoint in mV).
    Cv,
    /// Constant resistance (setpoint in 10 mΩ).
    Cr,
    /// Constant power (setpoint in mW).
    Cw,
}

/// What to do when the commanded current would exceed the power ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxPowerAction {
    /// Reduce the current to the largest value the ceiling allows.
    Clamp,
    /// Latch [`LoadFault::Overload`](crate::error::LoadFault::Overload).
    Fault,
}

/// One independent setpoint per mode, each in that mode's unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setpoints {
    #[serde(with = "postcard::fixint::le")]
    pub cc: u16,
    #[serde(with = "postcard::fixint::le")]
    pub cv: u16,
    #[serde(with = "postcard::fixint::le")]
    pub cr: u16,
    #[serde(with = "postcard::fixint::le")]
    pub cw: u16,
}

impl Index<Mode> for Setpoints {
    type Output = u16;

    fn index(&self, mode: Mode) -> &u16 {
        match mode {
            Mode::Cc => &self.cc,
            Mode::Cv => &self.cv,
            Mode::Cr => &self.cr,
            Mode::Cw => &self.cw,
        }
    }
}

impl IndexMut<Mode> for Setpoints {
    fn index_mut(&mut self, mode: Mode) -> &mut u16 {
        match mode {
            Mode::Cc => &mut self.cc,
            Mode::Cv => &mut self.cv,
            Mode::Cr => &mut self.cr,
            Mode::Cw => &mut self.cw,
        }
    }
}

/// Operator settings persisted across power cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Active regulation law.
    pub mode: Mode,
    pub setpoints: Setpoints,
    /// Upper bound on the commanded current in every mode except CC (mA).
    #[serde(with = "postcard::fixint::le")]
    pub current_limit: u16,
    /// Whether the under-voltage cutoff is armed.
    pub cutoff_enabled: bool,
    /// Under-voltage cutoff threshold (mV).
    #[serde(with = "postcard::fixint::le")]
    pub cutoff_voltage: u16,
    pub max_power_action: MaxPowerAction,
    /// Audible alerts; consumed by the front panel only.
    pub beeper_enabled: bool,
}

impl Settings {
    /// Setpoint of the currently selected mode.
    pub fn active_setpoint(&self) -> u16 {
        self.setpoints[self.mode]
    }

    /// Store a new current limit, pulled into `[CUR_MIN_MA, CUR_MAX_MA]`.
    /// Returns the value actually stored.
    pub fn set_current_limit(&mut self, limit_ma: u16) -> u16 {
        self.current_limit = limit_ma.clamp(CUR_MIN_MA, CUR_MAX_MA);
        self.current_limit
    }

    fn current_limit_in_range(&self) -> bool {
        (CUR_MIN_MA..=CUR_MAX_MA).contains(&self.current_limit)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: Mode::Cc,
            setpoints: Setpoints {
                cc: DEFAULT_SETPOINT_CC_MA,
                cv: DEFAULT_SETPOINT_CV_MV,
                cr: DEFAULT_SETPOINT_CR_CENTIOHM,
                cw: DEFAULT_SETPOINT_CW_MW,
            },
            current_limit: CUR_MAX_MA,
            cutoff_enabled: false,
            cutoff_voltage: DEFAULT_CUTOFF_MV,
            max_power_action: MaxPowerAction::Clamp,
            beeper_enabled: true,
        }
    }
}

/// XOR-fold checksum over `data`, seeded with `0x55`.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(CHECKSUM_SEED, |acc, b| acc ^ b)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Where the live settings came from at the last [`SettingsStore::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSource {
    /// A valid image was read from EEPROM.
    Stored,
    /// The image was missing or corrupt; hard-coded defaults are in use.
    Defaulted,
}

/// Owns the EEPROM and the in-memory copy of the settings.
pub struct SettingsStore<E> {
    eeprom: E,
    settings: Settings,
    source: SettingsSource,
}

impl<E: EepromPort> SettingsStore<E> {
    /// Take ownership of `eeprom` and load the settings from it.
    pub fn open(eeprom: E) -> Self {
        let mut store = Self {
            eeprom,
            settings: Settings::default(),
            source: SettingsSource::Defaulted,
        };
        store.load();
        store
    }

    /// Re-read the image from EEPROM.
    ///
    /// Never fails: an unreadable, corrupt, or undecodable image is
    /// replaced in memory by [`Settings::default`].  The EEPROM itself is
    /// not touched until the next [`persist`](Self::persist).
    pub fn load(&mut self) -> SettingsSource {
        self.source = match self.read_image() {
            Ok(settings) => {
                self.settings = settings;
                info!("Settings: loaded from EEPROM (mode={:?})", settings.mode);
                SettingsSource::Stored
            }
            Err(reason) => {
                warn!("Settings: {reason}, using defaults");
                self.settings = Settings::default();
                SettingsSource::Defaulted
            }
        };
        self.source
    }

    /// Write the in-memory settings back to EEPROM.
    ///
    /// Bytes whose stored value already matches are skipped to limit
    /// EEPROM wear.  Returns the number of bytes physically written.
    ///
    /// This blocks for as long as the EEPROM needs.  Only call it while
    /// the load is disabled, and discard any tick flags that piled up
    /// meanwhile.
    pub fn persist(&mut self) -> Result<usize> {
        let mut buf = [0u8; SETTINGS_IMAGE_LEN];
        let used = postcard::to_slice(&self.settings, &mut buf)
            .map_err(|_| Error::Settings("encode failed"))?
            .len();
        if used != SETTINGS_IMAGE_LEN {
            return Err(Error::Settings("unexpected image length"));
        }
        // Fail before the first write rather than leave a torn image.
        if self.eeprom.capacity() <= SETTINGS_IMAGE_LEN {
            return Err(Error::Settings("EEPROM smaller than the settings image"));
        }

        let mut written = 0;
        for (addr, &byte) in buf.iter().enumerate() {
            written += self.write_if_changed(addr, byte)?;
        }
        written += self.write_if_changed(SETTINGS_IMAGE_LEN, checksum(&buf))?;
        self.eeprom.commit()?;

        info!("Settings: persisted ({written} bytes written)");
        Ok(written)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Outcome of the most recent [`load`](Self::load).
    pub fn source(&self) -> SettingsSource {
        self.source
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn eeprom(&self) -> &E {
        &self.eeprom
    }

    pub fn eeprom_mut(&mut self) -> &mut E {
        &mut self.eeprom
    }

    /// Give the EEPROM back, dropping the in-memory settings.
    pub fn into_eeprom(self) -> E {
        self.eeprom
    }

    // ── Internal ──────────────────────────────────────────────────

    fn read_image(&self) -> core::result::Result<Settings, &'static str> {
        let mut image = [0u8; SETTINGS_IMAGE_LEN];
        for (addr, slot) in image.iter_mut().enumerate() {
            *slot = self
                .eeprom
                .read_byte(addr)
                .map_err(|_| "EEPROM read failed")?;
        }
        let stored = self
            .eeprom
            .read_byte(SETTINGS_IMAGE_LEN)
            .map_err(|_| "EEPROM read failed")?;

        if stored != checksum(&image) {
            return Err("checksum mismatch");
        }
        let settings: Settings =
            postcard::from_bytes(&image).map_err(|_| "image does not decode")?;
        if !settings.current_limit_in_range() {
            return Err("current limit out of range");
        }
        Ok(settings)
    }

    fn write_if_changed(&mut self, addr: usize, value: u8) -> Result<usize> {
        if self.eeprom.read_byte(addr).ok() == Some(value) {
            return Ok(0);
        }
        self.eeprom.write_byte(addr, value)?;
        Ok(1)
    }
}
