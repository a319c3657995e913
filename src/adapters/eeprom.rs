//! EEPROM adapter.
//!
//! Implements [`EepromPort`] for the settings store.
//!
//! - Simulation backend: a RAM buffer initialised to the erased state
//!   (`0xFF`).  Counts physical writes so wear behaviour can be tested.
//! - ESP-IDF backend: the byte region is emulated with a single NVS blob.
//!   Reads and writes hit a RAM shadow; [`EepromPort::commit`] flushes the
//!   shadow with one atomic `nvs_set_blob` + `nvs_commit`.

use crate::app::ports::{EepromPort, StorageError};
use log::info;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::warn;

/// Value of a never-written EEPROM cell.
pub const ERASED: u8 = 0xFF;

#[cfg(target_os = "espidf")]
const NVS_NAMESPACE: &[u8] = b"dcload\0";
#[cfg(target_os = "espidf")]
const NVS_KEY: &[u8] = b"eeprom\0";

pub struct EepromAdapter {
    shadow: Vec<u8>,
    /// Bytes physically written since construction.
    writes: usize,
    #[cfg(target_os = "espidf")]
    nvs_backed: bool,
    #[cfg(target_os = "espidf")]
    dirty: bool,
}

impl EepromAdapter {
    /// RAM-only EEPROM of `capacity` erased bytes.
    pub fn simulated(capacity: usize) -> Self {
        info!("EepromAdapter: simulation backend ({capacity} bytes)");
        Self {
            shadow: vec![ERASED; capacity],
            writes: 0,
            #[cfg(target_os = "espidf")]
            nvs_backed: false,
            #[cfg(target_os = "espidf")]
            dirty: false,
        }
    }

    /// Open the NVS-backed region, initialising NVS flash if needed.
    ///
    /// A missing blob is not an error: the region reads as erased and the
    /// settings store falls back to defaults.
    #[cfg(target_os = "espidf")]
    pub fn open_nvs(capacity: usize) -> Result<Self, StorageError> {
        // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
        // single main-task context before any other NVS access.
        let ret = unsafe { nvs_flash_init() };
        if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
            warn!("EepromAdapter: erasing and re-initialising NVS partition");
            if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                return Err(StorageError::IoError);
            }
        } else if ret != ESP_OK {
            return Err(StorageError::IoError);
        }

        let mut shadow = vec![ERASED; capacity];
        let ret = Self::with_nvs_handle(false, |handle| {
            let mut size = capacity;
            // SAFETY: `shadow` is `capacity` bytes long and outlives the call.
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    NVS_KEY.as_ptr().cast(),
                    shadow.as_mut_ptr().cast(),
                    &mut size,
                )
            };
            if ret == ESP_OK { Ok(()) } else { Err(ret) }
        });
        match ret {
            Ok(()) => info!("EepromAdapter: NVS region loaded ({capacity} bytes)"),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => {
                info!("EepromAdapter: no stored region, starting erased");
            }
            Err(e) => {
                warn!("EepromAdapter: NVS read error {e}, starting erased");
                shadow.fill(ERASED);
            }
        }

        Ok(Self {
            shadow,
            writes: 0,
            nvs_backed: true,
            dirty: false,
        })
    }

    /// Bytes physically written since construction.
    pub fn physical_writes(&self) -> usize {
        self.writes
    }

    /// Open the namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        // SAFETY: namespace is a NUL-terminated static string.
        let ret = unsafe { nvs_open(NVS_NAMESPACE.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        // SAFETY: handle was opened above and is closed exactly once.
        unsafe { nvs_close(handle) };
        result
    }
}

impl EepromPort for EepromAdapter {
    fn capacity(&self) -> usize {
        self.shadow.len()
    }

    fn read_byte(&self, addr: usize) -> Result<u8, StorageError> {
        self.shadow.get(addr).copied().ok_or(StorageError::OutOfRange)
    }

    fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), StorageError> {
        let cell = self.shadow.get_mut(addr).ok_or(StorageError::OutOfRange)?;
        *cell = value;
        self.writes += 1;
        #[cfg(target_os = "espidf")]
        {
            self.dirty = true;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        #[cfg(target_os = "espidf")]
        {
            if !self.nvs_backed || !self.dirty {
                return Ok(());
            }
            let shadow = &self.shadow;
            Self::with_nvs_handle(true, |handle| {
                // SAFETY: `shadow` is a live slice for the duration of the call.
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        NVS_KEY.as_ptr().cast(),
                        shadow.as_ptr().cast(),
                        shadow.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret == ESP_OK { Ok(()) } else { Err(ret) }
            })
            .map_err(|e| {
                warn!("EepromAdapter: NVS commit failed ({e})");
                StorageError::IoError
            })?;
            self.dirty = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_erased() {
        let e = EepromAdapter::simulated(8);
        assert_eq!(e.capacity(), 8);
        for addr in 0..8 {
            assert_eq!(e.read_byte(addr), Ok(ERASED));
        }
    }

    #[test]
    fn out_of_range_is_typed() {
        let mut e = EepromAdapter::simulated(2);
        assert_eq!(e.read_byte(2), Err(StorageError::OutOfRange));
        assert_eq!(e.write_byte(5, 0), Err(StorageError::OutOfRange));
        assert_eq!(e.physical_writes(), 0);
    }

    #[test]
    fn counts_writes() {
        let mut e = EepromAdapter::simulated(4);
        e.write_byte(0, 1).unwrap();
        e.write_byte(0, 1).unwrap();
        assert_eq!(e.physical_writes(), 2);
        assert_eq!(e.read_byte(0), Ok(1));
        assert!(e.commit().is_ok());
    }
}
