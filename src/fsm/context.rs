//! Borrowed context threaded through every pot state handler.
//!
//! [`ControllerIo`] bundles the shared collaborators of one scheduling
//! tick (time, ports, event log).  [`PotCycle`] narrows it to one pot:
//! handlers read the pot's configuration, mutate its runtime state and
//! reach hardware only through the `io` ports.

use crate::app::ports::{ConfigPort, NotifyPort, ValvePort};
use crate::clock::Jiffies;
use crate::config::{GlobalConfig, PotConfig};
use crate::controller::pot::Pot;
use crate::datetime::RtcTime;
use crate::eventlog::EventLog;
use crate::sensors::Acquisition;

/// Shared I/O for one controller call.
pub struct ControllerIo<'a> {
    pub now: Jiffies,
    /// Cached wall-clock time.
    pub rtc: RtcTime,
    pub sensor: &'a mut dyn Acquisition,
    pub valves: &'a mut dyn ValvePort,
    pub store: &'a mut dyn ConfigPort,
    pub notify: &'a mut dyn NotifyPort,
    pub log: &'a mut EventLog,
}

/// One pot plus everything its handlers may touch.
pub struct PotCycle<'a, 'io> {
    pub nr: u8,
    pub pot: &'a mut Pot,
    pub config: &'a PotConfig,
    pub global: &'a GlobalConfig,
    pub io: &'a mut ControllerIo<'io>,
}
