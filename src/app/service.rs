//! Application service: the superloop body and the host message
//! dispatcher.
//!
//! [`AppService`] owns every piece of runtime state.  Its ISR entry points
//! (`on_uart_rx`, `on_uart_tx`) and [`run_once`](AppService::run_once)
//! are the only ways in.
//!
//! ```text
//!  run_once(now)
//!    ├─ comm.work()          one host request ──▶ Core::handle
//!    ├─ comm tick            every 10 ms (partial-frame timeout)
//!    ├─ RTC refresh          every 1000 ms
//!    ├─ switch.tick()        debounced on/off switch
//!    ├─ controller.work()    one pot
//!    ├─ led.tick()           notification blink sequencer
//!    └─ check_invariants()   Err ──▶ run_supervised forces a reset
//! ```

use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, info, warn};

use crate::clock::{Jiffies, msec_to_jiffies, time_before};
use crate::comm::frame::FC_ACK;
use crate::comm::messages::{MANFLG_FREEZE_ENABLE, MANFLG_NOTIFY_ENABLE};
use crate::comm::{CommLink, Frame, ManualMode, Message, MessageHandler, PAYLOAD_LEN};
use crate::config::{ControllerConfig, POT_COUNT};
use crate::controller::Controller;
use crate::datetime::RtcTime;
use crate::drivers::notify_led::NotifyLed;
use crate::drivers::onoff_switch::OnOffSwitch;
use crate::drivers::watchdog::Watchdog;
use crate::error::{CommError, Error, Result};
use crate::eventlog::EventLog;
use crate::fsm::ControllerIo;
use crate::irq::IrqControl;
use crate::sensors::Acquisition;

use super::ports::{ConfigPort, NotifyPort, RtcPort, SerialPort, ValvePort};

/// Host link timer period.
pub const COMM_TICK_MS: u32 = 10;
/// Wall-clock cache refresh period.
pub const RTC_FETCH_INTERVAL_MS: u32 = 1_000;

// ───────────────────────────────────────────────────────────────
// Board description
// ───────────────────────────────────────────────────────────────

/// The concrete adapters of one hardware (or simulated) build.
pub trait Board {
    type Sensor: Acquisition;
    type Valves: ValvePort;
    type Store: ConfigPort;
    type Rtc: RtcPort;
    type LedPin: OutputPin;
    type SwitchPin: InputPin;
    type Serial: SerialPort;
    type Irq: IrqControl;
}

/// Constructed adapters handed to [`AppService::new`].
pub struct Parts<B: Board> {
    pub sensor: B::Sensor,
    pub valves: B::Valves,
    pub store: B::Store,
    pub rtc: B::Rtc,
    pub led_pin: B::LedPin,
    pub switch_pin: B::SwitchPin,
    pub serial: B::Serial,
    pub irq: B::Irq,
}

// ───────────────────────────────────────────────────────────────
// Core: everything but the link
// ───────────────────────────────────────────────────────────────

struct Core<B: Board> {
    controller: Controller,
    log: EventLog,
    sensor: B::Sensor,
    valves: B::Valves,
    store: B::Store,
    rtc: B::Rtc,
    /// Last successful RTC read.
    time: RtcTime,
    led: NotifyLed<B::LedPin>,
    switch: OnOffSwitch<B::SwitchPin>,
    now: Jiffies,
}

impl<B: Board> Core<B> {
    /// Borrow the controller alongside the I/O bundle it works on.
    fn split(&mut self) -> (&mut Controller, ControllerIo<'_>) {
        let io = ControllerIo {
            now: self.now,
            rtc: self.time,
            sensor: &mut self.sensor,
            valves: &mut self.valves,
            store: &mut self.store,
            notify: &mut self.led,
            log: &mut self.log,
        };
        (&mut self.controller, io)
    }

    fn refresh_time(&mut self) {
        match self.rtc.read_time() {
            Ok(t) => self.time = t,
            Err(e) => warn!("rtc: read failed ({}), keeping {:?}", e, self.time),
        }
    }

    fn set_notify(&mut self, on: bool) {
        self.led.set_notify(on);
        if let Err(e) = self.store.save_notify_led(on) {
            warn!("notify led: save failed: {}", e);
        }
    }

    fn update_config(&mut self, config: &ControllerConfig) -> Result<()> {
        let (controller, mut io) = self.split();
        controller.update_config(&mut io, config)?;
        Ok(())
    }

    /// Execute one decoded request.  `Ok(None)` acknowledges without a
    /// reply body.
    fn dispatch(&mut self, msg: Message) -> Result<Option<Message>> {
        let reply = match msg {
            Message::LogFetch => Some(Message::Log(self.log.pop().ok_or(CommError::NoData)?)),
            Message::Rtc(time) => {
                self.rtc.write_time(&time)?;
                self.time = time;
                info!("rtc: set to {:?}", time);
                None
            }
            Message::RtcFetch => Some(Message::Rtc(self.time)),
            Message::ContrConf(global) => {
                let mut config = *self.controller.config();
                config.global = global;
                self.update_config(&config)?;
                None
            }
            Message::ContrConfFetch => Some(Message::ContrConf(self.controller.config().global)),
            Message::PotConf { pot, config: pot_config } => {
                let mut config = *self.controller.config();
                config.pots[usize::from(pot)] = pot_config;
                self.update_config(&config)?;
                None
            }
            Message::PotConfFetch { pot } => Some(Message::PotConf {
                pot,
                config: self.controller.config().pots[usize::from(pot)],
            }),
            Message::PotStateFetch { pot } => Some(Message::PotState {
                pot,
                state: self
                    .controller
                    .pot_state(usize::from(pot))
                    .ok_or(CommError::InvalidPot(pot))?,
            }),
            Message::PotRemState { pot, rem } => {
                let (controller, mut io) = self.split();
                controller
                    .update_remanent_state(&mut io, usize::from(pot), rem)
                    .ok_or(CommError::InvalidPot(pot))?;
                None
            }
            Message::PotRemStateFetch { pot } => Some(Message::PotRemState {
                pot,
                rem: self
                    .controller
                    .remanent_state(usize::from(pot))
                    .ok_or(CommError::InvalidPot(pot))?,
            }),
            Message::ManMode(m) => {
                let now = self.now;
                let (controller, mut io) = self.split();
                controller.manual_mode(
                    &mut io,
                    m.force_stop_mask,
                    m.manual_mask,
                    m.manual_state,
                    m.force_start_mask,
                );
                if let Some(on) = m.freeze() {
                    controller.freeze(now, on);
                }
                if let Some(on) = m.notify() {
                    self.set_notify(on);
                }
                None
            }
            Message::ManModeFetch => {
                let (manual_mask, manual_state) = self.controller.manual_masks();
                let mut flags = 0;
                if self.controller.is_frozen() {
                    flags |= MANFLG_FREEZE_ENABLE;
                }
                if self.led.is_notifying() {
                    flags |= MANFLG_NOTIFY_ENABLE;
                }
                Some(Message::ManMode(ManualMode {
                    manual_mask,
                    manual_state,
                    flags,
                    ..Default::default()
                }))
            }
            Message::Log(_) | Message::PotState { .. } => {
                return Err(CommError::UnknownMessage(msg.id() as u8).into());
            }
        };
        Ok(reply)
    }
}

impl<B: Board> MessageHandler for Core<B> {
    fn handle(&mut self, request: &Frame, reply: &mut [u8; PAYLOAD_LEN]) -> bool {
        if request.has(FC_ACK) {
            // An acknowledgement of something we sent.
            return true;
        }
        let result = Message::decode(&request.payload)
            .map_err(Error::from)
            .and_then(|msg| self.dispatch(msg));
        match result {
            Ok(Some(msg)) => {
                *reply = msg.encode();
                true
            }
            Ok(None) => true,
            Err(e) => {
                debug!("host request {} failed: {}", request.payload[0], e);
                false
            }
        }
    }
}

fn log_config(config: &ControllerConfig) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    match config.to_json() {
        Ok(text) => debug!("app: active config {}", text),
        Err(e) => warn!("app: config dump failed: {}", e),
    }
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService<B: Board> {
    comm: CommLink<B::Serial, B::Irq>,
    core: Core<B>,
    next_comm_tick: Jiffies,
    next_rtc_fetch: Jiffies,
}

impl<B: Board> AppService<B> {
    pub fn new(parts: Parts<B>) -> Self {
        Self {
            comm: CommLink::new(parts.serial, parts.irq),
            core: Core {
                controller: Controller::new(),
                log: EventLog::new(),
                sensor: parts.sensor,
                valves: parts.valves,
                store: parts.store,
                rtc: parts.rtc,
                time: RtcTime::default(),
                led: NotifyLed::new(parts.led_pin),
                switch: OnOffSwitch::new(parts.switch_pin),
                now: 0,
            },
            next_comm_tick: 0,
            next_rtc_fetch: 0,
        }
    }

    /// Restore persisted state and bring every pot to a known state.
    pub fn init(&mut self, now: Jiffies) {
        let core = &mut self.core;
        core.now = now;
        core.refresh_time();

        match core.store.load_notify_led() {
            Ok(on) => core.led.set_notify(on),
            Err(e) => warn!("notify led: load failed: {}", e),
        }

        let (controller, mut io) = core.split();
        controller.init(&mut io);
        log_config(controller.config());

        self.next_comm_tick = now.wrapping_add(msec_to_jiffies(COMM_TICK_MS));
        self.next_rtc_fetch = now.wrapping_add(msec_to_jiffies(RTC_FETCH_INTERVAL_MS));
        info!("app: {} pots ready", POT_COUNT);
    }

    /// One superloop pass.  An error means the controller state is no
    /// longer trustworthy.
    pub fn run_once(&mut self, now: Jiffies) -> Result<()> {
        self.core.now = now;

        self.comm.work(&mut self.core);

        if !time_before(now, self.next_comm_tick) {
            self.next_comm_tick = now.wrapping_add(msec_to_jiffies(COMM_TICK_MS));
            self.comm.centisecond_tick();
        }

        if !time_before(now, self.next_rtc_fetch) {
            self.next_rtc_fetch = now.wrapping_add(msec_to_jiffies(RTC_FETCH_INTERVAL_MS));
            self.core.refresh_time();
        }

        let switch = self.core.switch.tick(now);
        let (controller, mut io) = self.core.split();
        controller.work(&mut io, switch);

        self.core.led.tick(now);
        self.core.controller.check_invariants()
    }

    /// [`run_once`](Self::run_once) under the hardware watchdog: fed after
    /// a clean pass, forced to reset on a fault.
    pub fn run_supervised(&mut self, now: Jiffies, watchdog: &mut Watchdog) {
        match self.run_once(now) {
            Ok(()) => watchdog.feed(),
            Err(e) => watchdog.force_reset(&e.to_string()),
        }
    }

    // ── ISR entry points ──────────────────────────────────────

    pub fn on_uart_rx(&mut self) {
        self.comm.on_rx_interrupt();
    }

    pub fn on_uart_tx(&mut self) {
        self.comm.on_tx_interrupt();
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn controller(&self) -> &Controller {
        &self.core.controller
    }

    pub fn comm(&self) -> &CommLink<B::Serial, B::Irq> {
        &self.comm
    }

    pub fn comm_mut(&mut self) -> &mut CommLink<B::Serial, B::Irq> {
        &mut self.comm
    }

    pub fn event_log(&self) -> &EventLog {
        &self.core.log
    }

    pub fn time(&self) -> RtcTime {
        self.core.time
    }

    pub fn is_notifying(&self) -> bool {
        self.core.led.is_notifying()
    }

    pub fn store(&self) -> &B::Store {
        &self.core.store
    }

    pub fn valves(&self) -> &B::Valves {
        &self.core.valves
    }

    pub fn rtc_mut(&mut self) -> &mut B::Rtc {
        &mut self.core.rtc
    }

    pub fn sensor_mut(&mut self) -> &mut B::Sensor {
        &mut self.core.sensor
    }
}
