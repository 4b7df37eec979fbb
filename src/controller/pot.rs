//! Per-pot runtime state and the actions the state handlers share.

use log::{info, warn};

use crate::clock::{Jiffies, msec_to_jiffies, sec_to_jiffies, time_before};
use crate::config::{REM_WATCHDOG_TRIGGERED, RemanentState};
use crate::eventlog::{ErrorCode, InfoCode, LogItem};
use crate::fsm::{PotCycle, PotStateId, transition};

// ── Timing ────────────────────────────────────────────────────

/// Idle time between two measurements of a pot.
pub const MEASUREMENT_INTERVAL_S: u32 = 60;
/// Delay before the first measurement after a reset.
pub const FIRST_INTERVAL_S: u32 = 10;
/// Valve open time per watering round.
pub const VALVE_OPEN_MS: u32 = 3_000;
/// Settle time after closing before re-measuring.
pub const VALVE_CLOSE_MS: u32 = 30_000;

// ── Watering watchdog ─────────────────────────────────────────

/// Watering may not go this long without measurable progress.
pub const WATCHDOG_TIMEOUT_S: u32 = 600;
/// Required progress, percent of `max - min`.
pub const WATCHDOG_THRESHOLD_PCT: u32 = 15;

/// Runtime state of one pot.
#[derive(Debug, Clone)]
pub struct Pot {
    pub state: PotStateId,
    pub is_watering: bool,
    pub last_raw: u16,
    pub last_value: u8,
    pub rem: RemanentState,
    pub next_measurement: Jiffies,
    pub valve_timer: Jiffies,
    pub valve_auto_open: bool,
    pub valve_manual_en: bool,
    pub valve_manual_open: bool,
    pub wd_threshold: u8,
    pub wd_deadline: Jiffies,
}

impl Default for Pot {
    fn default() -> Self {
        Self {
            state: PotStateId::Idle,
            is_watering: false,
            last_raw: 0,
            last_value: 0,
            rem: RemanentState::default(),
            next_measurement: 0,
            valve_timer: 0,
            valve_auto_open: false,
            valve_manual_en: false,
            valve_manual_open: false,
            wd_threshold: 0,
            wd_deadline: 0,
        }
    }
}

impl Pot {
    /// Host-visible snapshot.
    pub fn snapshot(&self) -> PotState {
        PotState {
            state_id: self.state,
            is_watering: self.is_watering,
            last_raw: self.last_raw,
            last_value: self.last_value,
        }
    }

    /// Level the valve output should have right now.
    pub fn valve_open(&self) -> bool {
        if self.valve_manual_en {
            self.valve_manual_open
        } else {
            self.valve_auto_open
        }
    }
}

/// Read-only view of a pot as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PotState {
    pub state_id: PotStateId,
    pub is_watering: bool,
    pub last_raw: u16,
    pub last_value: u8,
}

/// Map a raw reading onto 0..=255 between the calibration bounds.
pub fn scale(raw: u16, lo: u16, hi: u16) -> u8 {
    if hi <= lo {
        return 0;
    }
    let v = u32::from(raw.clamp(lo, hi) - lo);
    let span = u32::from(hi - lo);
    // Rounded division; the result never exceeds 255.
    ((255 * v + span / 2) / span) as u8
}

// ── Actions ───────────────────────────────────────────────────

impl PotCycle<'_, '_> {
    fn emit(&mut self, item: LogItem) {
        self.io.log.append(item);
    }

    pub fn info(&mut self, code: InfoCode, data: u8) {
        if self.config.logs() {
            let ts = self.io.rtc.timestamp();
            self.emit(LogItem::info(code, data, ts));
        }
    }

    pub fn info_verbose(&mut self, code: InfoCode, data: u8) {
        if self.config.logs_verbose() {
            let ts = self.io.rtc.timestamp();
            self.emit(LogItem::info(code, data, ts));
        }
    }

    pub fn error(&mut self, code: ErrorCode, data: u8) {
        if self.config.logs() {
            let ts = self.io.rtc.timestamp();
            self.emit(LogItem::error(code, data, ts));
        }
    }

    /// Push the effective valve level to the output latch.
    pub fn commit_valve(&mut self) {
        let open = self.pot.valve_open();
        self.io.valves.set_bit(self.nr as usize, open);
        if let Err(e) = self.io.valves.commit() {
            warn!("pot {}: valve commit failed: {}", self.nr, e);
        }
    }

    /// Open the valve and arm the open timer.
    pub fn open_valve(&mut self) {
        self.pot.valve_auto_open = true;
        self.commit_valve();
        self.pot.valve_timer = self.io.now.wrapping_add(msec_to_jiffies(VALVE_OPEN_MS));
    }

    pub fn close_valve(&mut self) {
        self.pot.valve_auto_open = false;
        self.commit_valve();
    }

    /// Schedule the next measurement and rest.
    pub fn go_idle(&mut self) {
        self.pot.next_measurement = self
            .io
            .now
            .wrapping_add(sec_to_jiffies(MEASUREMENT_INTERVAL_S));
        transition(self, PotStateId::Idle);
    }

    pub fn start_watering(&mut self) {
        info!("pot {}: watering on", self.nr);
        self.info(InfoCode::WateringChange, self.nr | 0x80);
        self.rearm_watchdog();
        self.pot.is_watering = true;
        transition(self, PotStateId::WaitingForValve);
    }

    pub fn stop_watering(&mut self) {
        if self.pot.is_watering {
            info!("pot {}: watering off", self.nr);
            self.info(InfoCode::WateringChange, self.nr);
            self.pot.is_watering = false;
        }
        self.close_valve();
        self.go_idle();
    }

    pub fn rearm_watchdog(&mut self) {
        let range = u32::from(self.config.max_threshold.saturating_sub(self.config.min_threshold));
        let thr = (range * WATCHDOG_THRESHOLD_PCT / 100).max(1);
        let thr = u8::try_from(thr).unwrap_or(u8::MAX);
        self.pot.wd_threshold = self.pot.last_value.saturating_add(thr);
        self.pot.wd_deadline = self.io.now.wrapping_add(sec_to_jiffies(WATCHDOG_TIMEOUT_S));
    }

    /// Returns `true` when the watchdog fired and watering was aborted.
    pub fn check_watchdog(&mut self) -> bool {
        if self.pot.last_value >= self.pot.wd_threshold {
            self.rearm_watchdog();
            return false;
        }
        if time_before(self.io.now, self.pot.wd_deadline) {
            return false;
        }

        warn!("pot {}: watering watchdog fired", self.nr);
        self.io.notify.set_notify(true);
        if let Err(e) = self.io.store.save_notify_led(true) {
            warn!("notify led: save failed: {}", e);
        }
        self.error(ErrorCode::Watchdog, self.nr);
        self.stop_watering();
        self.pot.rem.flags |= REM_WATCHDOG_TRIGGERED;
        self.commit_remanent();
        true
    }

    pub fn commit_remanent(&mut self) {
        let rem = self.pot.rem;
        if let Err(e) = self.io.store.save_remanent(self.nr as usize, &rem) {
            warn!("pot {}: remanent save failed: {}", self.nr, e);
        }
    }

    /// Back to IDLE with the valve closed and manual override cleared.
    /// The watchdog latch is left alone.
    pub fn reset(&mut self, clear_measured: bool) {
        // Leaving MEASURING cancels the sensor engine.
        transition(self, PotStateId::Idle);
        self.pot.is_watering = false;
        if clear_measured {
            self.pot.last_raw = 0;
            self.pot.last_value = 0;
        }
        self.pot.next_measurement = self.io.now.wrapping_add(sec_to_jiffies(FIRST_INTERVAL_S));
        self.pot.valve_manual_en = false;
        self.pot.valve_manual_open = false;
        self.close_valve();
    }

    /// Clear a latched watchdog and restart the pot.
    pub fn clear_watchdog(&mut self) {
        if !self.pot.rem.watchdog_triggered() {
            return;
        }
        info!("pot {}: watchdog latch cleared", self.nr);
        self.pot.rem.flags &= !REM_WATCHDOG_TRIGGERED;
        self.reset(true);
        self.commit_remanent();
    }
}
