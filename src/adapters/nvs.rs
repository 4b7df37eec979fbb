//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the irrigator.
//!
//! - Records are `postcard` blobs under the `irrigator` namespace:
//!   `ctrlcfg` (controller config), `rem0`..`rem5` (per-pot remanent
//!   state) and `notify` (notification LED state).
//! - Writes are delta-aware: a record equal to the stored bytes is not
//!   rewritten, bounding flash wear.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//!   The simulation backend is an in-memory map.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::{ControllerConfig, RemanentState};
use log::{debug, info};

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const NAMESPACE: &str = "irrigator";
const CONFIG_KEY: &str = "ctrlcfg";
const NOTIFY_KEY: &str = "notify";

/// Upper bound for one encoded record.
const MAX_BLOB_SIZE: usize = 128;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
    writes: u32,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably.  On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
            writes: 0,
        })
    }

    /// Physical writes issued since construction.
    pub fn write_count(&self) -> u32 {
        self.writes
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    fn remanent_key(pot: usize) -> String {
        format!("rem{}", pot)
    }

    /// Decode the record under `key`.  `Ok(None)` if absent.
    fn load_record<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        match self.read(NAMESPACE, key, &mut buf) {
            Ok(len) => postcard::from_bytes(&buf[..len])
                .map(Some)
                .map_err(|_| ConfigError::Corrupted),
            Err(StorageError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Encode and store `value` unless the stored bytes already match.
    /// Returns whether a write happened.
    fn store_record<T: Serialize>(&mut self, key: &str, value: &T) -> Result<bool, ConfigError> {
        let mut enc = [0u8; MAX_BLOB_SIZE];
        let bytes = postcard::to_slice(value, &mut enc).map_err(|_| ConfigError::IoError)?;

        let mut current = [0u8; MAX_BLOB_SIZE];
        if let Ok(len) = self.read(NAMESPACE, key, &mut current)
            && current[..len] == *bytes
        {
            debug!("NvsAdapter: {} unchanged", key);
            return Ok(false);
        }

        self.write(NAMESPACE, key, bytes)?;
        Ok(true)
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns_buf = Self::c_name(namespace);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    /// NUL-terminated copy of an NVS name (max 15 characters).
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let b = name.as_bytes();
        let len = b.len().min(15);
        buf[..len].copy_from_slice(&b[..len]);
        buf
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<ControllerConfig, ConfigError> {
        match self.load_record::<ControllerConfig>(CONFIG_KEY)? {
            Some(cfg) => {
                info!("NvsAdapter: loaded controller config");
                Ok(cfg)
            }
            None => Err(ConfigError::NotFound),
        }
    }

    fn save_if_changed(&mut self, config: &ControllerConfig) -> Result<bool, ConfigError> {
        config.validate()?;
        let written = self.store_record(CONFIG_KEY, config)?;
        if written {
            info!("NvsAdapter: controller config saved");
        }
        Ok(written)
    }

    fn load_remanent(&self, pot: usize) -> Result<RemanentState, ConfigError> {
        Ok(self
            .load_record(&Self::remanent_key(pot))?
            .unwrap_or_default())
    }

    fn save_remanent(&mut self, pot: usize, state: &RemanentState) -> Result<(), ConfigError> {
        self.store_record(&Self::remanent_key(pot), state).map(|_| ())
    }

    fn load_notify_led(&self) -> Result<bool, ConfigError> {
        Ok(self.load_record(NOTIFY_KEY)?.unwrap_or(false))
    }

    fn save_notify_led(&mut self, on: bool) -> Result<(), ConfigError> {
        self.store_record(NOTIFY_KEY, &on).map(|_| ())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            match self.store.borrow().get(&composite) {
                Some(data) if data.len() > buf.len() => Err(StorageError::TooLarge),
                Some(data) => {
                    buf[..data.len()].copy_from_slice(data);
                    Ok(data.len())
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH => Err(StorageError::TooLarge),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.writes = self.writes.wrapping_add(1);

        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        data.as_ptr() as *const _,
                        data.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|e| {
                warn!("NvsAdapter: NVS write error {}", e);
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().remove(&composite);
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe { nvs_erase_key(handle, key_buf.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|_| StorageError::IoError)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow().contains_key(&composite)
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let ret = unsafe {
                    nvs_find_key(handle, key_buf.as_ptr() as *const _, core::ptr::null_mut())
                };
                Ok(ret == ESP_OK)
            });
            result.unwrap_or(false)
        }
    }
}

impl Default for NvsAdapter {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
            writes: 0,
        })
    }
}
