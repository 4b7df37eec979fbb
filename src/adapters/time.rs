//! System tick counter.
//!
//! The 200 Hz hardware timer calls [`timer_tick`]; the superloop reads
//! [`jiffies`].  The counter lives in an `embassy_sync` blocking mutex
//! over the `critical-section` raw mutex, so a read never observes a
//! torn update from the timer context.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::clock::Jiffies;

static JIFFIES: Mutex<CriticalSectionRawMutex, Cell<Jiffies>> = Mutex::new(Cell::new(0));

/// Advance the counter by one tick.  Timer context only.
pub fn timer_tick() {
    JIFFIES.lock(|j| j.set(j.get().wrapping_add(1)));
}

/// Current tick count.
pub fn jiffies() -> Jiffies {
    JIFFIES.lock(Cell::get)
}

/// Clock handle for code that wants an object rather than a free function.
#[derive(Debug, Default, Clone, Copy)]
pub struct JiffiesClock;

impl JiffiesClock {
    pub fn now(&self) -> Jiffies {
        jiffies()
    }
}
