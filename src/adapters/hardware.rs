//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! | Type           | Implements                  | Connects to             |
//! |----------------|-----------------------------|-------------------------|
//! | `GpioPin`      | `OutputPin`, `InputPin`     | ESP32 GPIO              |
//! | `OutputLatch`  | [`ValvePort`]               | valve relay outputs     |
//! | `OneshotAdc`   | [`AdcPort`]                 | ADC1 oneshot unit       |
//! | `HostUart`     | [`SerialPort`]              | UART driver (host link) |
//!
//! On non-espidf targets the GPIO and ADC paths go through the
//! simulation stubs in [`hw_init`](crate::drivers::hw_init) and
//! [`SimSerial`] stands in for the UART.

use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin};
use log::debug;

use crate::app::ports::{AdcPort, SerialPort, ValvePort};
use crate::drivers::hw_init;
use crate::error::{ActuatorError, SensorError};

// ── GPIO ──────────────────────────────────────────────────────

/// One already-configured GPIO.
#[derive(Debug)]
pub struct GpioPin {
    gpio: i32,
    level: bool,
}

impl GpioPin {
    pub fn new(gpio: i32) -> Self {
        Self { gpio, level: false }
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    fn write(&mut self, high: bool) -> Result<(), ErrorKind> {
        hw_init::gpio_write(self.gpio, high).map_err(|_| ErrorKind::Other)?;
        self.level = high;
        Ok(())
    }
}

impl ErrorType for GpioPin {
    type Error = ErrorKind;
}

impl OutputPin for GpioPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}

impl InputPin for GpioPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(hw_init::gpio_read(self.gpio))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|h| !h)
    }
}

// ── Valve output latch ────────────────────────────────────────

/// Staged bank of valve outputs.  [`ValvePort::commit`] writes only the
/// outputs whose level changed since the previous commit.
pub struct OutputLatch<P: OutputPin, const N: usize> {
    pins: [P; N],
    staged: u16,
    /// Last written state, `None` before the first commit.
    committed: Option<u16>,
    active_low: bool,
}

impl<P: OutputPin, const N: usize> OutputLatch<P, N> {
    pub fn new(pins: [P; N], active_low: bool) -> Self {
        Self {
            pins,
            staged: 0,
            committed: None,
            active_low,
        }
    }

    /// Logical (open = 1) state of the last commit.
    pub fn committed(&self) -> u16 {
        self.committed.unwrap_or(0)
    }

    pub fn pins(&self) -> &[P; N] {
        &self.pins
    }
}

impl<P: OutputPin, const N: usize> ValvePort for OutputLatch<P, N> {
    fn set_bit(&mut self, index: usize, open: bool) {
        if index >= N {
            debug!("valve latch: index {} out of range", index);
            return;
        }
        if open {
            self.staged |= 1 << index;
        } else {
            self.staged &= !(1 << index);
        }
    }

    fn commit(&mut self) -> Result<(), ActuatorError> {
        let changed = match self.committed {
            Some(old) => old ^ self.staged,
            None => u16::MAX,
        };
        for (i, pin) in self.pins.iter_mut().enumerate() {
            if changed & (1 << i) == 0 {
                continue;
            }
            let open = self.staged & (1 << i) != 0;
            let high = open != self.active_low;
            let res = if high { pin.set_high() } else { pin.set_low() };
            res.map_err(|_| ActuatorError::GpioWriteFailed)?;
        }
        self.committed = Some(self.staged);
        Ok(())
    }
}

// ── ADC ───────────────────────────────────────────────────────

/// ADC1 oneshot conversion scaled to 10 bit.  The oneshot driver blocks
/// for the conversion, so `start()` converts and `is_done()` is
/// immediately true.
pub struct OneshotAdc {
    channel: u32,
    value: Option<u16>,
}

impl OneshotAdc {
    pub fn new(channel: u32) -> Self {
        Self {
            channel,
            value: None,
        }
    }
}

impl AdcPort for OneshotAdc {
    fn start(&mut self) -> Result<(), SensorError> {
        let raw = hw_init::adc1_read(self.channel).map_err(|_| SensorError::AdcReadFailed)?;
        // 12-bit hardware, 10-bit domain.
        self.value = Some(raw >> 2);
        Ok(())
    }

    fn is_done(&mut self) -> bool {
        true
    }

    fn read(&mut self) -> Result<u16, SensorError> {
        self.value.take().ok_or(SensorError::AdcReadFailed)
    }
}

// ── UART ──────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp_uart::HostUart;

#[cfg(target_os = "espidf")]
mod esp_uart {
    use super::SerialPort;
    use esp_idf_svc::sys::*;

    /// Host link on an installed ESP-IDF UART driver.  The driver owns the
    /// interrupts and ring buffers; the superloop polls this adapter
    /// through the comm link's interrupt entry points.
    pub struct HostUart {
        port: uart_port_t,
    }

    impl HostUart {
        pub fn new(port: i32) -> Self {
            Self {
                port: port as uart_port_t,
            }
        }
    }

    impl SerialPort for HostUart {
        fn read_byte(&mut self) -> Option<u8> {
            let mut b = 0u8;
            // SAFETY: one-byte buffer, zero timeout.
            let n = unsafe { uart_read_bytes(self.port, (&raw mut b).cast(), 1, 0) };
            (n == 1).then_some(b)
        }

        fn tx_ready(&self) -> bool {
            let mut free: usize = 0;
            // SAFETY: out-pointer to a local.
            let ret = unsafe { uart_get_tx_buffer_free_size(self.port, &mut free) };
            ret == ESP_OK && free > 0
        }

        fn write_byte(&mut self, byte: u8) {
            // SAFETY: one-byte buffer.
            unsafe { uart_write_bytes(self.port, (&raw const byte).cast(), 1) };
        }

        fn set_tx_interrupt(&mut self, _enabled: bool) {}
    }
}

/// Loopback-free serial double for host builds.
#[derive(Debug, Default)]
pub struct SimSerial {
    pub rx: std::collections::VecDeque<u8>,
    pub tx: Vec<u8>,
    pub tx_blocked: bool,
    pub tx_irq: bool,
}

impl SerialPort for SimSerial {
    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn tx_ready(&self) -> bool {
        !self.tx_blocked
    }

    fn write_byte(&mut self, byte: u8) {
        self.tx.push(byte);
    }

    fn set_tx_interrupt(&mut self, enabled: bool) {
        self.tx_irq = enabled;
    }
}
