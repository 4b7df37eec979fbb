//! Mock hardware for integration tests.
//!
//! Records sensor starts and valve commits so tests can assert on the
//! full command history without touching real GPIO/ADC registers.  The
//! persistent store and the front-panel pins are shared handles, so a
//! test can "reboot" by building a second service over the same store.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use irrigator::adapters::hardware::SimSerial;
use irrigator::adapters::nvs::NvsAdapter;
use irrigator::adapters::rtc::SimRtc;
use irrigator::app::ports::{ConfigError, ConfigPort, ValvePort};
use irrigator::app::service::{AppService, Board, Parts};
use irrigator::clock::{Jiffies, msec_to_jiffies};
use irrigator::comm::frame::{FC_REQ_ACK, LOCAL_ADDRESS};
use irrigator::comm::{ErrorCode, FRAME_LEN, Frame, Message};
use irrigator::config::{ControllerConfig, POT_COUNT, PotConfig, RemanentState};
use irrigator::controller::PotState;
use irrigator::error::ActuatorError;
use irrigator::eventlog::LogItem;
use irrigator::irq::FlagIrq;
use irrigator::sensors::{Acquisition, SensorResult};

// ── Sensor ────────────────────────────────────────────────────

/// Scripted measurement engine.  A started measurement completes after
/// `latency` jiffies with the raw value currently set for that pot.
#[derive(Debug)]
pub struct MockSensor {
    pub raw: [u16; POT_COUNT],
    pub latency: Jiffies,
    pub starts: Vec<(u8, Jiffies)>,
    pub cancels: u32,
    busy: Option<(u8, Jiffies)>,
}

impl Default for MockSensor {
    fn default() -> Self {
        Self {
            // Mid-scale: plausible and inside the default thresholds.
            raw: [512; POT_COUNT],
            latency: 2,
            starts: Vec::new(),
            cancels: 0,
            busy: None,
        }
    }
}

impl MockSensor {
    pub fn starts_for(&self, nr: u8) -> Vec<Jiffies> {
        self.starts
            .iter()
            .filter(|(n, _)| *n == nr)
            .map(|(_, t)| *t)
            .collect()
    }
}

impl Acquisition for MockSensor {
    fn start(&mut self, nr: u8, now: Jiffies) {
        if self.busy.is_some() || usize::from(nr) >= POT_COUNT {
            return;
        }
        self.busy = Some((nr, now.wrapping_add(self.latency)));
        self.starts.push((nr, now));
    }

    fn poll(&mut self, now: Jiffies) -> Option<SensorResult> {
        let (nr, due) = self.busy?;
        if now.wrapping_sub(due) as i32 >= 0 {
            self.busy = None;
            return Some(SensorResult {
                nr,
                value: self.raw[usize::from(nr)],
            });
        }
        None
    }

    fn cancel(&mut self) {
        if self.busy.take().is_some() {
            self.cancels += 1;
        }
    }

    fn is_idle(&self) -> bool {
        self.busy.is_none()
    }
}

// ── Valves ────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingValves {
    staged: u16,
    /// Every committed state, oldest first.
    pub commits: Vec<u16>,
}

impl RecordingValves {
    pub fn state(&self) -> u16 {
        self.commits.last().copied().unwrap_or(0)
    }

    pub fn is_open(&self, nr: usize) -> bool {
        self.state() & (1 << nr) != 0
    }

    /// How often valve `nr` went from closed to open.
    pub fn openings(&self, nr: usize) -> usize {
        let bit = 1u16 << nr;
        let mut prev = 0u16;
        let mut n = 0;
        for &s in &self.commits {
            if s & bit != 0 && prev & bit == 0 {
                n += 1;
            }
            prev = s;
        }
        n
    }
}

impl ValvePort for RecordingValves {
    fn set_bit(&mut self, index: usize, open: bool) {
        if open {
            self.staged |= 1 << index;
        } else {
            self.staged &= !(1 << index);
        }
    }

    fn commit(&mut self) -> Result<(), ActuatorError> {
        self.commits.push(self.staged);
        Ok(())
    }
}

// ── Store ─────────────────────────────────────────────────────

/// [`NvsAdapter`] behind a shared handle.
#[derive(Clone, Default)]
pub struct SharedStore(pub Rc<RefCell<NvsAdapter>>);

impl SharedStore {
    pub fn writes(&self) -> u32 {
        self.0.borrow().write_count()
    }
}

impl ConfigPort for SharedStore {
    fn load(&self) -> Result<ControllerConfig, ConfigError> {
        self.0.borrow().load()
    }

    fn save_if_changed(&mut self, config: &ControllerConfig) -> Result<bool, ConfigError> {
        self.0.borrow_mut().save_if_changed(config)
    }

    fn load_remanent(&self, pot: usize) -> Result<RemanentState, ConfigError> {
        self.0.borrow().load_remanent(pot)
    }

    fn save_remanent(&mut self, pot: usize, state: &RemanentState) -> Result<(), ConfigError> {
        self.0.borrow_mut().save_remanent(pot, state)
    }

    fn load_notify_led(&self) -> Result<bool, ConfigError> {
        self.0.borrow().load_notify_led()
    }

    fn save_notify_led(&mut self, on: bool) -> Result<(), ConfigError> {
        self.0.borrow_mut().save_notify_led(on)
    }
}

// ── Pins ──────────────────────────────────────────────────────

/// A GPIO level shared with the test.
#[derive(Clone, Default)]
pub struct MockPin(pub Rc<Cell<bool>>);

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.set(true);
        Ok(())
    }
}

impl InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }
}

// ── Board + rig ───────────────────────────────────────────────

pub struct TestBoard;

impl Board for TestBoard {
    type Sensor = MockSensor;
    type Valves = RecordingValves;
    type Store = SharedStore;
    type Rtc = SimRtc;
    type LedPin = MockPin;
    type SwitchPin = MockPin;
    type Serial = SimSerial;
    type Irq = FlagIrq;
}

/// A running service plus the handles a test pokes at.
pub struct Rig {
    pub app: AppService<TestBoard>,
    pub now: Jiffies,
    pub store: SharedStore,
    pub led: Rc<Cell<bool>>,
    /// Switch input level: low means "on".
    pub switch: Rc<Cell<bool>>,
}

impl Rig {
    /// Boot with the switch on and a fresh store.
    pub fn new() -> Self {
        Self::boot(SharedStore::default(), 0)
    }

    pub fn boot(store: SharedStore, now: Jiffies) -> Self {
        let led = Rc::new(Cell::new(false));
        let switch = Rc::new(Cell::new(false));
        let mut app = AppService::new(Parts::<TestBoard> {
            sensor: MockSensor::default(),
            valves: RecordingValves::default(),
            store: store.clone(),
            rtc: SimRtc::default(),
            led_pin: MockPin(led.clone()),
            switch_pin: MockPin(switch.clone()),
            serial: SimSerial::default(),
            irq: FlagIrq::default(),
        });
        app.init(now);
        Self {
            app,
            now,
            store,
            led,
            switch,
        }
    }

    pub fn set_switch(&mut self, on: bool) {
        self.switch.set(!on);
    }

    /// One superloop pass per jiffy.
    pub fn run(&mut self, jiffies: Jiffies) {
        for _ in 0..jiffies {
            self.now = self.now.wrapping_add(1);
            self.app.on_uart_rx();
            self.app.run_once(self.now).expect("controller fault");
        }
    }

    pub fn run_ms(&mut self, ms: u32) {
        self.run(msec_to_jiffies(ms));
    }

    /// Run until `cond` holds or `limit_ms` elapsed.  Returns whether it held.
    pub fn run_until(&mut self, limit_ms: u32, mut cond: impl FnMut(&Self) -> bool) -> bool {
        for _ in 0..msec_to_jiffies(limit_ms) {
            if cond(self) {
                return true;
            }
            self.run(1);
        }
        cond(self)
    }

    pub fn sensor(&mut self) -> &mut MockSensor {
        self.app.sensor_mut()
    }

    pub fn valves(&self) -> &RecordingValves {
        self.app.valves()
    }

    /// Put raw bytes on the wire towards the controller.
    pub fn inject(&mut self, bytes: &[u8]) {
        self.app.comm_mut().serial_mut().rx.extend(bytes.iter().copied());
        self.app.on_uart_rx();
    }

    /// Everything the controller transmitted since the last call.
    pub fn take_tx(&mut self) -> Vec<u8> {
        self.app.comm_mut().drain_tx();
        std::mem::take(&mut self.app.comm_mut().serial_mut().tx)
    }

    /// Send `msg` with REQ_ACK from host address 1 and return the reply.
    pub fn request(&mut self, msg: Message) -> Frame {
        self.inject(&host_frame(&msg, FC_REQ_ACK).to_bytes());
        self.run(1);
        let tx = self.take_tx();
        assert_eq!(tx.len(), FRAME_LEN, "expected exactly one reply frame");
        Frame::decode(&tx).expect("reply frame")
    }

    /// Request and decode the reply body; `None` on an error reply.
    pub fn query(&mut self, msg: Message) -> Option<Message> {
        let reply = self.request(msg);
        if reply.error_code() != ErrorCode::Ok {
            return None;
        }
        Some(Message::decode(&reply.payload).expect("reply payload"))
    }

    /// Configure pot `nr` over the link and check it was accepted.
    pub fn configure_pot(&mut self, nr: u8, config: PotConfig) {
        let reply = self.request(Message::PotConf { pot: nr, config });
        assert_eq!(reply.error_code(), ErrorCode::Ok);
    }

    /// Pop the whole event log over the link.
    pub fn fetch_log(&mut self) -> Vec<LogItem> {
        let mut items = Vec::new();
        while let Some(msg) = self.query(Message::LogFetch) {
            match msg {
                Message::Log(item) => items.push(item),
                other => panic!("unexpected reply {:?}", other),
            }
        }
        items
    }

    pub fn pot(&self, nr: usize) -> PotState {
        self.app.controller().pot_state(nr).expect("pot number")
    }

    pub fn remanent(&self, nr: usize) -> RemanentState {
        self.app.controller().remanent_state(nr).expect("pot number")
    }
}

/// An enabled pot with logging and the default 85..170 thresholds.
pub fn logging_pot() -> PotConfig {
    PotConfig {
        flags: irrigator::config::POT_ENABLED | irrigator::config::POT_LOG,
        ..PotConfig::default()
    }
}

/// Raw readings that scale below / above the default thresholds with the
/// default 0..=1023 calibration.
pub const RAW_DRY: u16 = 321;
pub const RAW_WET: u16 = 722;

/// A host request frame addressed to the controller.
pub fn host_frame(msg: &Message, fc: u8) -> Frame {
    let mut f = Frame::with_payload(msg.encode());
    f.fc = fc;
    f.set_src(1);
    f.set_dst(LOCAL_ADDRESS);
    f.seal();
    f
}
