//! Notification LED sequencer.
//!
//! Signals that an operator should look at the controller (for example
//! after a watering watchdog fired).  While active the LED repeats:
//!
//! ```text
//!   ┌┐ ┌┐
//!  ─┘└─┘└────────── 3 s ──────────┌┐ ┌┐ ...
//!   4 toggles, 50 ms apart, then off
//! ```
//!
//! The on/off state is persisted by the caller through
//! [`ConfigPort::save_notify_led`](crate::app::ports::ConfigPort::save_notify_led).

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::NotifyPort;
use crate::clock::{Jiffies, msec_to_jiffies, time_before};

pub const PULSE_MS: u32 = 50;
pub const PAUSE_MS: u32 = 3_000;
/// Pin toggles per blink burst.
pub const TOGGLES: u8 = 4;

pub struct NotifyLed<P: OutputPin> {
    pin: P,
    active: bool,
    lit: bool,
    step: u8,
    timer: Jiffies,
    /// Time of the last [`tick`](Self::tick); used to arm the first pulse.
    now: Jiffies,
}

impl<P: OutputPin> NotifyLed<P> {
    pub fn new(pin: P) -> Self {
        let mut led = Self {
            pin,
            active: false,
            lit: false,
            step: 0,
            timer: 0,
            now: 0,
        };
        led.drive(false);
        led
    }

    fn drive(&mut self, on: bool) {
        self.lit = on;
        let res = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if res.is_err() {
            warn!("notify led: pin write failed");
        }
    }

    /// Advance the blink sequence.
    pub fn tick(&mut self, now: Jiffies) {
        self.now = now;
        if !self.active || time_before(now, self.timer) {
            return;
        }
        if self.step < TOGGLES {
            self.step += 1;
            self.timer = now.wrapping_add(msec_to_jiffies(PULSE_MS));
            self.drive(!self.lit);
        } else {
            self.step = 0;
            self.timer = now.wrapping_add(msec_to_jiffies(PAUSE_MS));
            self.drive(false);
        }
    }

    /// Current pin level.
    pub fn is_lit(&self) -> bool {
        self.lit
    }
}

impl<P: OutputPin> NotifyPort for NotifyLed<P> {
    fn set_notify(&mut self, on: bool) {
        if self.active == on {
            return;
        }
        self.active = on;
        self.step = 0;
        self.timer = self.now.wrapping_add(msec_to_jiffies(PULSE_MS));
        self.drive(on);
    }

    fn is_notifying(&self) -> bool {
        self.active
    }
}
