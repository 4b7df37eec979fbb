//! GPIO excitation bank for resistive moisture sensors.
//!
//! Every sensor has its own "A" supply line; the "B" terminal is shared.
//! Reversing which terminal is high on alternate warm-up phases keeps
//! the electrodes from polarising.
//!
//! | Polarity   | A    | B    |
//! |------------|------|------|
//! | `Normal`   | low  | high |
//! | `Reversed` | high | low  |
//! | disabled   | low  | low  |

use embedded_hal::digital::OutputPin;

use crate::app::ports::{Polarity, SensorExcitation};
use crate::error::SensorError;

pub struct PinExcitation<P: OutputPin, const N: usize> {
    supply_a: [P; N],
    supply_b: P,
}

impl<P: OutputPin, const N: usize> PinExcitation<P, N> {
    pub fn new(supply_a: [P; N], supply_b: P) -> Self {
        Self { supply_a, supply_b }
    }

    fn line_a(&mut self, nr: usize) -> Result<&mut P, SensorError> {
        self.supply_a
            .get_mut(nr)
            .ok_or(SensorError::NoSuchChannel(nr))
    }
}

fn drive<P: OutputPin>(pin: &mut P, high: bool) -> Result<(), SensorError> {
    let res = if high { pin.set_high() } else { pin.set_low() };
    res.map_err(|_| SensorError::GpioWriteFailed)
}

impl<P: OutputPin, const N: usize> SensorExcitation for PinExcitation<P, N> {
    fn channel_count(&self) -> usize {
        N
    }

    fn enable(&mut self, nr: usize, polarity: Polarity) -> Result<(), SensorError> {
        let a_high = polarity == Polarity::Reversed;
        // Break before make: drop the high side first.
        if a_high {
            drive(&mut self.supply_b, false)?;
            drive(self.line_a(nr)?, true)
        } else {
            drive(self.line_a(nr)?, false)?;
            drive(&mut self.supply_b, true)
        }
    }

    fn disable(&mut self, nr: usize) -> Result<(), SensorError> {
        drive(self.line_a(nr)?, false)?;
        drive(&mut self.supply_b, false)
    }
}
