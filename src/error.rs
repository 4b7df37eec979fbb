//! Unified error types for the irrigation controller.
//!
//! Every subsystem error converts into [`Error`], so the boot path and the
//! superloop handle failures uniformly.  All variants are `Copy`: they are
//! passed around by value on the hot path without allocation.

use core::fmt;

use crate::app::ports::{ConfigError, StorageError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Sensor excitation or ADC failure.
    Sensor(SensorError),
    /// Valve output could not be driven.
    Actuator(ActuatorError),
    /// Host link or message decoding failure.
    Comm(CommError),
    /// Real-time clock access failed.
    Rtc(RtcError),
    /// Configuration rejected or unreadable.
    Config(ConfigError),
    /// Persistent store failure.
    Storage(StorageError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Internal bookkeeping is inconsistent; only a restart recovers.
    Fault(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Comm(e) => write!(f, "comm: {e}"),
            Self::Rtc(e) => write!(f, "rtc: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Fault(msg) => write!(f, "fault: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Channel index has no excitation line.
    NoSuchChannel(usize),
    /// Excitation GPIO write failed.
    GpioWriteFailed,
    /// ADC conversion failed.
    AdcReadFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchChannel(nr) => write!(f, "no sensor channel {nr}"),
            Self::GpioWriteFailed => write!(f, "excitation GPIO write failed"),
            Self::AdcReadFailed => write!(f, "ADC read failed"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Output latch GPIO write failed.
    GpioWriteFailed,
    /// Bit index outside the output bank.
    NoSuchOutput(usize),
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::NoSuchOutput(i) => write!(f, "no output {i}"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Communication errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommError {
    /// Leading message id is not part of the protocol.
    UnknownMessage(u8),
    /// Pot number out of range.
    InvalidPot(u8),
    /// A field carried a value outside its domain.
    InvalidField(&'static str),
    /// Nothing to report (empty event log).
    NoData,
    /// UART driver failure.
    Uart(i32),
}

impl fmt::Display for CommError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMessage(id) => write!(f, "unknown message id {id}"),
            Self::InvalidPot(nr) => write!(f, "invalid pot {nr}"),
            Self::InvalidField(name) => write!(f, "invalid field: {name}"),
            Self::NoData => write!(f, "no data"),
            Self::Uart(rc) => write!(f, "UART error (rc={rc})"),
        }
    }
}

impl From<CommError> for Error {
    fn from(e: CommError) -> Self {
        Self::Comm(e)
    }
}

// ---------------------------------------------------------------------------
// RTC errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcError {
    /// The clock chip / system call did not answer.
    Unavailable,
    /// The clock holds (or was given) an out-of-range time.
    InvalidTime,
}

impl fmt::Display for RtcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "clock unavailable"),
            Self::InvalidTime => write!(f, "invalid time"),
        }
    }
}

impl From<RtcError> for Error {
    fn from(e: RtcError) -> Self {
        Self::Rtc(e)
    }
}

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
