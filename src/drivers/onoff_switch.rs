//! Debounced hardware on/off switch.
//!
//! ## Hardware
//!
//! Active-low toggle switch with pull-up: a low level means "on".
//!
//! ## Debounce
//!
//! The pin is sampled at most once per [`SAMPLE_INTERVAL_MS`].  Between
//! samples the last stable level is reported unchanged; a sample that
//! differs from the previous one is reported once as an edge.
//!
//! | Previous | Sample | Reported      |
//! |----------|--------|---------------|
//! | off      | on     | `SwitchedOn`  |
//! | on       | off    | `SwitchedOff` |
//! | on       | on     | `IsOn`        |
//! | off      | off    | `IsOff`       |

use embedded_hal::digital::InputPin;
use log::warn;

use crate::clock::{Jiffies, msec_to_jiffies, time_before};

pub const SAMPLE_INTERVAL_MS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    SwitchedOn,
    SwitchedOff,
    IsOn,
    IsOff,
}

impl SwitchState {
    pub fn is_on(self) -> bool {
        matches!(self, Self::SwitchedOn | Self::IsOn)
    }
}

pub struct OnOffSwitch<P: InputPin> {
    pin: P,
    on: bool,
    next_check: Jiffies,
    sampled: bool,
}

impl<P: InputPin> OnOffSwitch<P> {
    /// Starts in the "off" state; the first sample decides.
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            on: false,
            next_check: 0,
            sampled: false,
        }
    }

    fn steady(&self) -> SwitchState {
        if self.on {
            SwitchState::IsOn
        } else {
            SwitchState::IsOff
        }
    }

    /// Call once per main-loop pass.
    pub fn tick(&mut self, now: Jiffies) -> SwitchState {
        if self.sampled && time_before(now, self.next_check) {
            return self.steady();
        }
        self.sampled = true;
        self.next_check = now.wrapping_add(msec_to_jiffies(SAMPLE_INTERVAL_MS));

        let on = match self.pin.is_low() {
            Ok(low) => low,
            Err(_) => {
                warn!("onoff switch: read failed, keeping previous state");
                return self.steady();
            }
        };

        let was_on = core::mem::replace(&mut self.on, on);
        match (was_on, on) {
            (false, true) => SwitchState::SwitchedOn,
            (true, false) => SwitchState::SwitchedOff,
            _ => self.steady(),
        }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}
