//! Irrigator firmware library.
//!
//! Exposes the controller core, the host protocol and the adapters for
//! integration testing and host tooling.  All ESP-IDF-specific code is
//! guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod clock;
pub mod comm;
pub mod config;
pub mod controller;
pub mod datetime;
pub mod error;
pub mod eventlog;
pub mod fsm;
pub mod irq;
pub mod pins;
pub mod sensors;

pub mod adapters;
pub mod drivers;

#[cfg(target_os = "espidf")]
mod esp_link_shims;

pub use error::{Error, Result};
