//! Pot state handlers and the static table.
//!
//! ```text
//!  IDLE ──[enabled, in window, interval elapsed]──▶ START_MEASUREMENT
//!    ▲                                                    │
//!    │                                           [sensor engine idle]
//!    │                                                    ▼
//!    ├────────[dry enough / implausible / wd fired]── MEASURING
//!    │                                                    │
//!    │                                   [start / continue watering]
//!    │                                                    ▼
//!    │                       START_MEASUREMENT ◀──── WAITING_FOR_VALVE
//!    │                         [open 3 s, then closed 30 s]
//!    └── reset (any state)
//! ```

use super::context::PotCycle;
use super::{PotStateId, StateDescriptor};
use crate::clock::{msec_to_jiffies, time_before};
use crate::config::{POT_LOG_VERBOSE, SENSOR_MAX};
use crate::controller::pot::{VALVE_CLOSE_MS, scale};
use crate::eventlog::{ErrorCode, LogItem};

/// Raw readings this close to either rail indicate a short or a broken wire.
pub const PLAUSIBILITY_MARGIN: u16 = 16;

pub fn is_plausible(raw: u16) -> bool {
    (PLAUSIBILITY_MARGIN..=SENSOR_MAX - PLAUSIBILITY_MARGIN).contains(&raw)
}

// ═══════════════════════════════════════════════════════════════════════════
//  Table
// ═══════════════════════════════════════════════════════════════════════════

pub static POT_STATES: [StateDescriptor; PotStateId::COUNT] = [
    StateDescriptor {
        id: PotStateId::Idle,
        name: "Idle",
        on_enter: None,
        on_exit: None,
        on_update: idle_update,
    },
    StateDescriptor {
        id: PotStateId::StartMeasurement,
        name: "StartMeasurement",
        on_enter: None,
        on_exit: None,
        on_update: start_update,
    },
    StateDescriptor {
        id: PotStateId::Measuring,
        name: "Measuring",
        on_enter: Some(measuring_enter),
        on_exit: Some(measuring_exit),
        on_update: measuring_update,
    },
    StateDescriptor {
        id: PotStateId::WaitingForValve,
        name: "WaitingForValve",
        on_enter: Some(waiting_enter),
        on_exit: None,
        on_update: waiting_update,
    },
];

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_update(cy: &mut PotCycle<'_, '_>) -> Option<PotStateId> {
    if !cy.config.is_enabled() || cy.pot.rem.watchdog_triggered() {
        return None;
    }
    let rtc = cy.io.rtc;
    if cy.config.dow_on_mask & rtc.weekday_bit() == 0 {
        return None;
    }
    if !cy.config.active_range.contains(rtc.time_of_day()) {
        return None;
    }
    if time_before(cy.io.now, cy.pot.next_measurement) {
        return None;
    }
    Some(PotStateId::StartMeasurement)
}

// ═══════════════════════════════════════════════════════════════════════════
//  START_MEASUREMENT
// ═══════════════════════════════════════════════════════════════════════════

fn start_update(cy: &mut PotCycle<'_, '_>) -> Option<PotStateId> {
    // Another pot may still own the sensor engine.
    cy.io.sensor.is_idle().then_some(PotStateId::Measuring)
}

// ═══════════════════════════════════════════════════════════════════════════
//  MEASURING
// ═══════════════════════════════════════════════════════════════════════════

fn measuring_enter(cy: &mut PotCycle<'_, '_>) {
    let now = cy.io.now;
    cy.io.sensor.start(cy.nr, now);
}

fn measuring_exit(cy: &mut PotCycle<'_, '_>) {
    cy.io.sensor.cancel();
}

fn measuring_update(cy: &mut PotCycle<'_, '_>) -> Option<PotStateId> {
    let now = cy.io.now;
    let result = cy.io.sensor.poll(now)?;
    if result.nr != cy.nr {
        return None;
    }

    if cy.config.flags & POT_LOG_VERBOSE != 0 {
        let ts = cy.io.rtc.timestamp();
        cy.io.log.append(LogItem::sensor(result.nr, result.value, ts));
    }

    let value = scale(
        result.value,
        cy.global.sensor_lowest_value,
        cy.global.sensor_highest_value,
    );
    cy.pot.last_raw = result.value;
    cy.pot.last_value = value;

    if !is_plausible(result.value) {
        cy.error(ErrorCode::Sensor, cy.nr);
        cy.stop_watering();
        return None;
    }

    if cy.pot.is_watering {
        if value >= cy.config.max_threshold {
            cy.stop_watering();
        } else if !cy.check_watchdog() {
            // Still too dry: another open/settle round.
            return Some(PotStateId::WaitingForValve);
        }
    } else if value < cy.config.min_threshold {
        cy.start_watering();
    } else {
        cy.go_idle();
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  WAITING_FOR_VALVE
// ═══════════════════════════════════════════════════════════════════════════

fn waiting_enter(cy: &mut PotCycle<'_, '_>) {
    cy.open_valve();
}

fn waiting_update(cy: &mut PotCycle<'_, '_>) -> Option<PotStateId> {
    let now = cy.io.now;
    if time_before(now, cy.pot.valve_timer) {
        return None;
    }
    if cy.pot.valve_auto_open {
        cy.close_valve();
        cy.pot.valve_timer = now.wrapping_add(msec_to_jiffies(VALVE_CLOSE_MS));
        None
    } else {
        Some(PotStateId::StartMeasurement)
    }
}
