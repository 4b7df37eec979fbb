//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller / SensorEngine / CommLink
//! ```
//!
//! Driven adapters (excitation lines, ADC, valve outputs, RTC, UART,
//! persistent store) implement these traits.  The domain core is generic
//! over them (or takes `dyn` references where several pots share one
//! port), so it never touches hardware directly and runs unchanged
//! against the recording mocks in `tests/integration/`.

use crate::config::{ControllerConfig, RemanentState};
use crate::datetime::RtcTime;
use crate::error::{ActuatorError, RtcError, SensorError};

// ───────────────────────────────────────────────────────────────
// Sensor ports
// ───────────────────────────────────────────────────────────────

/// Direction of the excitation current through a resistive sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Polarity {
    /// Supply A low, supply B high.
    Normal = 0,
    /// Supply A high, supply B low.
    Reversed = 1,
}

/// Per-channel sensor supply switching.
pub trait SensorExcitation {
    /// Number of channels this bank drives.
    fn channel_count(&self) -> usize;

    /// Power channel `nr` with the given polarity.
    fn enable(&mut self, nr: usize, polarity: Polarity) -> Result<(), SensorError>;

    /// Remove power from channel `nr` (both supply terminals low).
    fn disable(&mut self, nr: usize) -> Result<(), SensorError>;
}

/// The single shared analog-to-digital converter.
pub trait AdcPort {
    /// Begin one conversion.
    fn start(&mut self) -> Result<(), SensorError>;

    /// `true` once the conversion started by [`start`](Self::start) finished.
    fn is_done(&mut self) -> bool;

    /// Result of the last conversion, 10-bit.
    fn read(&mut self) -> Result<u16, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Valve port (domain → output latch)
// ───────────────────────────────────────────────────────────────

/// Bit-addressable latched outputs.  Writes are staged by
/// [`set_bit`](Self::set_bit) and reach the hardware on
/// [`commit`](Self::commit).
pub trait ValvePort {
    /// Stage valve `index` as open (`true`) or closed.
    fn set_bit(&mut self, index: usize, open: bool);

    fn commit(&mut self) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Real-time clock
// ───────────────────────────────────────────────────────────────

pub trait RtcPort {
    fn read_time(&mut self) -> Result<RtcTime, RtcError>;
    fn write_time(&mut self, time: &RtcTime) -> Result<(), RtcError>;
}

// ───────────────────────────────────────────────────────────────
// Notification output
// ───────────────────────────────────────────────────────────────

/// Operator attention indicator (blinking LED).
pub trait NotifyPort {
    fn set_notify(&mut self, on: bool);
    fn is_notifying(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Serial line (host link)
// ───────────────────────────────────────────────────────────────

/// Byte-level UART access used by the frame transport.
pub trait SerialPort {
    /// Next received byte, if any.
    fn read_byte(&mut self) -> Option<u8>;

    /// Transmit holding register can take a byte.
    fn tx_ready(&self) -> bool;

    fn write_byte(&mut self, byte: u8);

    /// Enable or disable the "transmitter ready" interrupt.
    fn set_tx_interrupt(&mut self, enabled: bool);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists controller configuration and remanent state.
///
/// Implementations MUST validate before persisting and SHOULD skip the
/// physical write when the stored record already matches, to bound flash
/// wear.
pub trait ConfigPort {
    /// Returns [`ControllerConfig::default()`] if nothing is stored.
    fn load(&self) -> Result<ControllerConfig, ConfigError>;

    /// Persist `config` if it differs from the stored record.
    /// Returns whether a write happened.
    fn save_if_changed(&mut self, config: &ControllerConfig) -> Result<bool, ConfigError>;

    /// Returns the default (cleared) state if nothing is stored.
    fn load_remanent(&self, pot: usize) -> Result<RemanentState, ConfigError>;

    fn save_remanent(&mut self, pot: usize, state: &RemanentState) -> Result<(), ConfigError>;

    fn load_notify_led(&self) -> Result<bool, ConfigError>;

    fn save_notify_led(&mut self, on: bool) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage underneath the [`ConfigPort`] adapter.
///
/// Keys are namespaced to prevent collisions between subsystems.
/// Write operations MUST be atomic — no partial writes on power loss.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
    /// Stored value does not fit the caller's buffer.
    TooLarge,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::TooLarge => write!(f, "value too large"),
        }
    }
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => Self::NotFound,
            StorageError::Full => Self::StorageFull,
            StorageError::IoError => Self::IoError,
            StorageError::TooLarge => Self::Corrupted,
        }
    }
}
