//! Multi-sample, polarity-reversing moisture acquisition.
//!
//! ```text
//!  start(nr)
//!     │
//!     ▼
//!  WARMUP_POL0 ──50ms──▶ WARMUP_POL1 ──50ms──▶ CONVERTING
//!     ▲                                            │
//!     │                                   sample stored, excitation off
//!     │                                            │
//!     └──────────500ms────── WAIT ◀──[< 3 samples]─┤
//!                                                  │
//!                             IDLE ◀──[3 samples: median]
//! ```
//!
//! There is one converter and one shared "B" supply terminal, so only one
//! sensor may be measured at a time.  [`SensorEngine::start`] is ignored
//! while a measurement runs; pots wait for [`Acquisition::is_idle`].

use core::hint::spin_loop;

use heapless::Vec;
use log::{debug, warn};

use crate::app::ports::{AdcPort, Polarity, SensorExcitation};
use crate::clock::{Jiffies, msec_to_jiffies, time_before};

/// Excitation time per polarity before converting.
pub const WARMUP_MS: u32 = 50;
/// Sensor off time between two samples of one measurement.
pub const WAIT_MS: u32 = 500;
/// Samples per measurement.
pub const SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Wait,
    WarmupPol0,
    WarmupPol1,
    Converting,
}

/// A finished measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorResult {
    pub nr: u8,
    /// Median raw reading.
    pub value: u16,
}

/// What the pot controller needs from the measurement engine.
pub trait Acquisition {
    /// Begin measuring sensor `nr`.  No-op unless idle and `nr` is valid.
    fn start(&mut self, nr: u8, now: Jiffies);

    /// Advance by at most one phase.  Returns the result when done.
    fn poll(&mut self, now: Jiffies) -> Option<SensorResult>;

    /// Abort the running measurement.  Waits for an in-flight conversion.
    fn cancel(&mut self);

    fn is_idle(&self) -> bool;
}

pub struct SensorEngine<X: SensorExcitation, A: AdcPort> {
    excitation: X,
    adc: A,
    phase: Phase,
    timer: Jiffies,
    nr: u8,
    samples: Vec<u16, SAMPLES>,
}

impl<X: SensorExcitation, A: AdcPort> SensorEngine<X, A> {
    pub fn new(excitation: X, adc: A) -> Self {
        Self {
            excitation,
            adc,
            phase: Phase::Idle,
            timer: 0,
            nr: 0,
            samples: Vec::new(),
        }
    }

    /// Switch every sensor off and discard one conversion: the first
    /// result after power-up is imprecise.
    pub fn init(&mut self) {
        for nr in 0..self.excitation.channel_count() {
            if let Err(e) = self.excitation.disable(nr) {
                warn!("sensor {}: disable failed: {}", nr, e);
            }
        }
        match self.adc.start() {
            Ok(()) => {
                while !self.adc.is_done() {
                    spin_loop();
                }
                let _ = self.adc.read();
            }
            Err(e) => warn!("sensor: initial conversion failed: {}", e),
        }
        self.phase = Phase::Idle;
        self.samples.clear();
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Sensor being measured, if any.
    pub fn active_sensor(&self) -> Option<u8> {
        (self.phase != Phase::Idle).then_some(self.nr)
    }

    pub fn excitation(&self) -> &X {
        &self.excitation
    }

    pub fn adc_mut(&mut self) -> &mut A {
        &mut self.adc
    }

    fn excite(&mut self, polarity: Polarity) {
        if let Err(e) = self.excitation.enable(self.nr as usize, polarity) {
            warn!("sensor {}: excitation failed: {}", self.nr, e);
        }
    }

    fn switch_off(&mut self) {
        if let Err(e) = self.excitation.disable(self.nr as usize) {
            warn!("sensor {}: disable failed: {}", self.nr, e);
        }
    }

    fn begin_warmup(&mut self, now: Jiffies) {
        self.timer = now.wrapping_add(msec_to_jiffies(WARMUP_MS));
        self.phase = Phase::WarmupPol0;
        self.excite(Polarity::Normal);
    }

    fn store_sample(&mut self, value: u16, now: Jiffies) -> Option<SensorResult> {
        self.switch_off();
        let _ = self.samples.push(value);
        if self.samples.len() < SAMPLES {
            self.timer = now.wrapping_add(msec_to_jiffies(WAIT_MS));
            self.phase = Phase::Wait;
            return None;
        }

        let value = median3(self.samples[0], self.samples[1], self.samples[2]);
        self.phase = Phase::Idle;
        debug!("sensor {}: {:?} -> {}", self.nr, self.samples, value);
        Some(SensorResult { nr: self.nr, value })
    }
}

impl<X: SensorExcitation, A: AdcPort> Acquisition for SensorEngine<X, A> {
    fn start(&mut self, nr: u8, now: Jiffies) {
        if self.phase != Phase::Idle || nr as usize >= self.excitation.channel_count() {
            return;
        }
        self.nr = nr;
        self.samples.clear();
        self.begin_warmup(now);
    }

    fn poll(&mut self, now: Jiffies) -> Option<SensorResult> {
        match self.phase {
            Phase::Idle => None,
            Phase::Wait => {
                if !time_before(now, self.timer) {
                    self.begin_warmup(now);
                }
                None
            }
            Phase::WarmupPol0 => {
                if !time_before(now, self.timer) {
                    self.excite(Polarity::Reversed);
                    self.timer = now.wrapping_add(msec_to_jiffies(WARMUP_MS));
                    self.phase = Phase::WarmupPol1;
                }
                None
            }
            Phase::WarmupPol1 => {
                if time_before(now, self.timer) {
                    return None;
                }
                match self.adc.start() {
                    Ok(()) => {
                        self.phase = Phase::Converting;
                        None
                    }
                    Err(e) => {
                        // A zero sample is rejected as implausible upstream.
                        warn!("sensor {}: {}", self.nr, e);
                        self.store_sample(0, now)
                    }
                }
            }
            Phase::Converting => {
                if !self.adc.is_done() {
                    return None;
                }
                let value = self.adc.read().unwrap_or_else(|e| {
                    warn!("sensor {}: {}", self.nr, e);
                    0
                });
                self.store_sample(value, now)
            }
        }
    }

    fn cancel(&mut self) {
        if self.phase == Phase::Idle {
            return;
        }
        if self.phase == Phase::Converting {
            while !self.adc.is_done() {
                spin_loop();
            }
        }
        self.switch_off();
        self.phase = Phase::Idle;
        debug!("sensor {}: measurement cancelled", self.nr);
    }

    fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }
}

/// Median of three.
pub fn median3(a: u16, b: u16, c: u16) -> u16 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    c.clamp(lo, hi)
}
