//! Irrigator Firmware — Main Entry Point
//!
//! Single cooperative superloop over hexagonal adapters.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  PinExcitation+OneshotAdc   OutputLatch   NvsAdapter           │
//! │  (SensorEngine)             (ValvePort)   (ConfigPort)         │
//! │  SystemRtc   HostUart   GpioPin (LED, switch)                  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  AppService: Controller · EventLog · CommLink          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  jiffies esp_timer (200 Hz) · TWDT                             │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use log::{info, warn};

use irrigator::adapters::hardware::{GpioPin, HostUart, OneshotAdc, OutputLatch};
use irrigator::adapters::nvs::NvsAdapter;
use irrigator::adapters::rtc::SystemRtc;
use irrigator::adapters::time::jiffies;
use irrigator::app::service::{AppService, Board, Parts};
use irrigator::comm::FRAME_LEN;
use irrigator::config::POT_COUNT;
use irrigator::drivers::{hw_init, hw_timer, watchdog::Watchdog};
use irrigator::irq::CriticalSectionIrq;
use irrigator::pins;
use irrigator::sensors::{PinExcitation, SensorEngine};

struct EspBoard;

impl Board for EspBoard {
    type Sensor = SensorEngine<PinExcitation<GpioPin, POT_COUNT>, OneshotAdc>;
    type Valves = OutputLatch<GpioPin, POT_COUNT>;
    type Store = NvsAdapter;
    type Rtc = SystemRtc;
    type LedPin = GpioPin;
    type SwitchPin = GpioPin;
    type Serial = HostUart;
    type Irq = CriticalSectionIrq;
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Irrigator v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Peripherals and system tick ────────────────────────
    hw_init::init_peripherals().map_err(irrigator::Error::from)?;
    hw_timer::start_timers();
    let mut watchdog = Watchdog::new();

    // ── 3. Adapters ───────────────────────────────────────────
    let excitation = PinExcitation::new(
        pins::SENSOR_SUPPLY_A_GPIOS.map(GpioPin::new),
        GpioPin::new(pins::SENSOR_SUPPLY_B_GPIO),
    );
    let mut sensor = SensorEngine::new(excitation, OneshotAdc::new(pins::SENSOR_ADC_CHANNEL));
    sensor.init();

    let store = NvsAdapter::new().unwrap_or_else(|e| {
        warn!("NVS init failed ({}), running without persistence", e);
        NvsAdapter::default()
    });

    let parts = Parts::<EspBoard> {
        sensor,
        valves: OutputLatch::new(pins::VALVE_GPIOS.map(GpioPin::new), pins::VALVES_ACTIVE_LOW),
        store,
        rtc: SystemRtc::new(),
        led_pin: GpioPin::new(pins::NOTIFY_LED_GPIO),
        switch_pin: GpioPin::new(pins::ONOFF_SWITCH_GPIO),
        serial: HostUart::new(pins::HOST_UART_NUM),
        irq: CriticalSectionIrq::new(),
    };

    // ── 4. Application ────────────────────────────────────────
    let mut app = AppService::new(parts);
    app.init(jiffies());

    info!("System ready. Entering superloop.");

    // ── 5. Superloop ──────────────────────────────────────────
    loop {
        // The UART driver owns the interrupts; poll its buffers.
        app.on_uart_rx();
        // Feeds the TWDT, or restarts the chip on a controller fault.
        app.run_supervised(jiffies(), &mut watchdog);
        for _ in 0..FRAME_LEN {
            app.on_uart_tx();
        }

        FreeRtos::delay_ms(5);
    }
}
