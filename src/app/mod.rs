//! Application core.
//!
//! [`ports`] defines the hexagonal boundary every adapter implements.
//! [`service`] wires the controller, sensor engine, event log and host
//! link into the superloop and answers host requests.

pub mod ports;
pub mod service;
