//! Controller configuration.
//!
//! Everything the host can tune: per-pot thresholds, activity windows and
//! logging flags, plus the global enable and sensor calibration bounds.
//! Persisted by the [`ConfigPort`](crate::app::ports::ConfigPort) adapter
//! and exportable as JSON for host-side tooling.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::datetime::TimeOfDayRange;

/// Number of independently controlled pots.
pub const POT_COUNT: usize = 6;

/// Full-scale raw ADC value (10 bit).
pub const SENSOR_MAX: u16 = 0x3FF;

// --- Pot flags ---
pub const POT_ENABLED: u8 = 0x01;
pub const POT_LOG: u8 = 0x02;
pub const POT_LOG_VERBOSE: u8 = 0x04;

// --- Global flags ---
pub const GLOBAL_ENABLE: u8 = 0x01;

// --- Remanent flags ---
/// Watering watchdog fired; automatic operation latched off.
pub const REM_WATCHDOG_TRIGGERED: u8 = 0x01;

/// Per-pot configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotConfig {
    pub flags: u8,
    /// Start watering below this scaled value.
    pub min_threshold: u8,
    /// Stop watering at or above this scaled value.
    pub max_threshold: u8,
    pub active_range: TimeOfDayRange,
    /// Bit 0 = Monday … bit 6 = Sunday.
    pub dow_on_mask: u8,
}

impl PotConfig {
    pub fn is_enabled(&self) -> bool {
        self.flags & POT_ENABLED != 0
    }

    pub fn logs(&self) -> bool {
        self.flags & POT_LOG != 0
    }

    pub fn logs_verbose(&self) -> bool {
        self.logs() && self.flags & POT_LOG_VERBOSE != 0
    }
}

impl Default for PotConfig {
    fn default() -> Self {
        Self {
            flags: 0,
            min_threshold: 85,
            max_threshold: 170,
            active_range: TimeOfDayRange::ALWAYS,
            dow_on_mask: 0x7F,
        }
    }
}

/// Settings shared by all pots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub flags: u8,
    /// Raw reading mapped to scaled 0.
    pub sensor_lowest_value: u16,
    /// Raw reading mapped to scaled 255.
    pub sensor_highest_value: u16,
}

impl GlobalConfig {
    pub fn is_enabled(&self) -> bool {
        self.flags & GLOBAL_ENABLE != 0
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            flags: GLOBAL_ENABLE,
            sensor_lowest_value: 0,
            sensor_highest_value: SENSOR_MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub pots: [PotConfig; POT_COUNT],
    pub global: GlobalConfig,
}

impl ControllerConfig {
    /// Range-check every field.  Invalid configurations are rejected,
    /// never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.global;
        if g.sensor_highest_value > SENSOR_MAX {
            return Err(ConfigError::ValidationFailed(
                "sensor_highest_value exceeds ADC full scale",
            ));
        }
        if g.sensor_lowest_value > g.sensor_highest_value {
            return Err(ConfigError::ValidationFailed(
                "sensor_lowest_value must be <= sensor_highest_value",
            ));
        }
        for pot in &self.pots {
            if pot.min_threshold >= pot.max_threshold {
                return Err(ConfigError::ValidationFailed(
                    "min_threshold must be < max_threshold",
                ));
            }
        }
        Ok(())
    }

    /// Single-line JSON rendering, dumped to the debug log at boot.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string(self).map_err(|_| ConfigError::IoError)
    }
}

/// Per-pot state that survives power loss, stored separately from
/// [`ControllerConfig`] because it changes at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemanentState {
    pub flags: u8,
}

impl RemanentState {
    pub fn watchdog_triggered(&self) -> bool {
        self.flags & REM_WATCHDOG_TRIGGERED != 0
    }
}
