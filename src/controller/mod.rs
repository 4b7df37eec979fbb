//! Controller orchestrator.
//!
//! ```text
//!  work(io, switch)
//!    │
//!    ├─ 1. deferred config write (3 s after the last change)
//!    ├─ 2. freeze window (host pause, expires after 5 s)
//!    ├─ 3. on/off switch edges (reset all / clear watchdog latches)
//!    ├─ 4. global enable
//!    └─ 5. fsm::tick() for exactly one pot, round-robin
//! ```
//!
//! After every step [`Controller::check_invariants`] verifies the per-pot
//! bookkeeping; a violation is a [`Fault`](Error::Fault) that the
//! superloop answers with a watchdog reset.
//!
//! The controller owns the configuration and the per-pot runtime state.
//! Everything else (sensor engine, valves, store, notification, event log)
//! is borrowed per call through [`ControllerIo`].

pub mod pot;

pub use pot::{Pot, PotState, scale};

use log::{debug, info, warn};

use crate::app::ports::ConfigError;
use crate::clock::{Jiffies, msec_to_jiffies, sec_to_jiffies, time_before};
use crate::config::{ControllerConfig, POT_COUNT, RemanentState};
use crate::drivers::onoff_switch::SwitchState;
use crate::error::Error;
use crate::eventlog::{ErrorCode, InfoCode, LogItem};
use crate::fsm::{self, ControllerIo, PotCycle, PotStateId};

/// Debounce between a config change and its write to the store.
pub const SAVE_DELAY_MS: u32 = 3_000;
/// A freeze lapses unless renewed within this time.
pub const FREEZE_TIMEOUT_S: u32 = 5;
/// Consecutive failed config writes after which the store counts as wedged.
pub const SAVE_RETRY_LIMIT: u8 = 20;

pub struct Controller {
    config: ControllerConfig,
    pots: [Pot; POT_COUNT],
    current: usize,
    save_due: Option<Jiffies>,
    save_failures: u8,
    frozen: bool,
    freeze_deadline: Jiffies,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrow pot `nr` together with its configuration and the shared I/O.
fn cycle<'a, 'io>(
    pots: &'a mut [Pot; POT_COUNT],
    config: &'a ControllerConfig,
    io: &'a mut ControllerIo<'io>,
    nr: usize,
) -> PotCycle<'a, 'io> {
    PotCycle {
        nr: nr as u8,
        pot: &mut pots[nr],
        config: &config.pots[nr],
        global: &config.global,
        io,
    }
}

impl Controller {
    pub fn new() -> Self {
        Self {
            config: ControllerConfig::default(),
            pots: core::array::from_fn(|_| Pot::default()),
            current: 0,
            save_due: None,
            save_failures: 0,
            frozen: false,
            freeze_deadline: 0,
        }
    }

    /// Load persisted configuration and remanent state, reset every pot.
    pub fn init(&mut self, io: &mut ControllerIo<'_>) {
        self.config = match io.store.load() {
            Ok(cfg) => match cfg.validate() {
                Ok(()) => cfg,
                Err(e) => {
                    warn!("stored config rejected ({}), using defaults", e);
                    ControllerConfig::default()
                }
            },
            Err(ConfigError::NotFound) => {
                info!("no stored config, using defaults");
                ControllerConfig::default()
            }
            Err(e) => {
                warn!("config load failed ({}), using defaults", e);
                ControllerConfig::default()
            }
        };

        for nr in 0..POT_COUNT {
            self.pots[nr].rem = io.store.load_remanent(nr).unwrap_or_else(|e| {
                warn!("pot {}: remanent load failed: {}", nr, e);
                RemanentState::default()
            });
            cycle(&mut self.pots, &self.config, io, nr).reset(true);
        }
        self.current = 0;
        info!("controller: {} pots initialised", POT_COUNT);
    }

    /// One orchestrator step.
    pub fn work(&mut self, io: &mut ControllerIo<'_>, switch: SwitchState) {
        let now = io.now;
        let ts = io.rtc.timestamp();

        if let Some(due) = self.save_due
            && !time_before(now, due)
        {
            match io.store.save_if_changed(&self.config) {
                Ok(written) => {
                    self.save_due = None;
                    self.save_failures = 0;
                    if written {
                        info!("controller: config saved");
                    }
                }
                Err(e) => {
                    warn!("controller: config save failed: {}", e);
                    self.save_failures = self.save_failures.saturating_add(1);
                    self.save_due = Some(now.wrapping_add(msec_to_jiffies(SAVE_DELAY_MS)));
                }
            }
        }

        if self.frozen {
            if time_before(now, self.freeze_deadline) {
                return;
            }
            self.frozen = false;
            warn!("controller: freeze timed out");
            log_event(io, LogItem::error(ErrorCode::FreezeTimeout, 0, ts));
        }

        match switch {
            SwitchState::SwitchedOff => {
                info!("controller: switched off");
                log_event(io, LogItem::info(InfoCode::OnOffSwitch, 0, ts));
                self.reset_all(io);
                return;
            }
            SwitchState::IsOff => return,
            SwitchState::SwitchedOn => {
                info!("controller: switched on");
                log_event(io, LogItem::info(InfoCode::OnOffSwitch, 1, ts));
                self.clear_watchdogs(io);
            }
            SwitchState::IsOn => {}
        }

        if !self.config.global.is_enabled() {
            return;
        }

        let nr = self.current;
        self.current = (nr + 1) % POT_COUNT;
        fsm::tick(&mut cycle(&mut self.pots, &self.config, io, nr));
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Replace the configuration, resetting whatever it affects.
    /// Persistence follows after [`SAVE_DELAY_MS`].
    pub fn update_config(
        &mut self,
        io: &mut ControllerIo<'_>,
        new: &ControllerConfig,
    ) -> Result<(), ConfigError> {
        new.validate()?;

        if new.global != self.config.global {
            debug!("controller: global config changed");
            self.reset_all(io);
        } else {
            for nr in 0..POT_COUNT {
                if new.pots[nr] != self.config.pots[nr] {
                    debug!("pot {}: config changed", nr);
                    let clear = !new.pots[nr].is_enabled();
                    cycle(&mut self.pots, &self.config, io, nr).reset(clear);
                }
            }
        }

        self.config = *new;
        self.save_due = Some(io.now.wrapping_add(msec_to_jiffies(SAVE_DELAY_MS)));
        Ok(())
    }

    pub fn pot_state(&self, nr: usize) -> Option<PotState> {
        self.pots.get(nr).map(Pot::snapshot)
    }

    pub fn remanent_state(&self, nr: usize) -> Option<RemanentState> {
        self.pots.get(nr).map(|p| p.rem)
    }

    /// Store `rem` for pot `nr`.  A change is persisted and restarts the pot.
    pub fn update_remanent_state(
        &mut self,
        io: &mut ControllerIo<'_>,
        nr: usize,
        rem: RemanentState,
    ) -> Option<()> {
        let pot = self.pots.get_mut(nr)?;
        if pot.rem == rem {
            return Some(());
        }
        pot.rem = rem;
        let mut cy = cycle(&mut self.pots, &self.config, io, nr);
        cy.commit_remanent();
        cy.reset(false);
        Some(())
    }

    /// Host override.  Bit `n` of each mask addresses pot `n`.
    pub fn manual_mode(
        &mut self,
        io: &mut ControllerIo<'_>,
        force_stop_mask: u8,
        manual_mask: u8,
        manual_state: u8,
        force_start_mask: u8,
    ) {
        for nr in 0..POT_COUNT {
            let bit = 1u8 << nr;
            let mut cy = cycle(&mut self.pots, &self.config, io, nr);

            if force_stop_mask & bit != 0 && cy.pot.is_watering {
                cy.stop_watering();
            }

            cy.pot.valve_manual_en = manual_mask & bit != 0;
            cy.pot.valve_manual_open = manual_state & bit != 0;
            cy.commit_valve();

            if force_start_mask & bit != 0
                && cy.pot.state == PotStateId::Idle
                && cy.config.is_enabled()
                && !cy.pot.rem.watchdog_triggered()
            {
                fsm::transition(&mut cy, PotStateId::StartMeasurement);
            }
        }
    }

    /// Current `(manual_mask, manual_state)` bitmasks.
    pub fn manual_masks(&self) -> (u8, u8) {
        self.pots
            .iter()
            .enumerate()
            .fold((0, 0), |(en, open), (nr, pot)| {
                let bit = 1u8 << nr;
                (
                    if pot.valve_manual_en { en | bit } else { en },
                    if pot.valve_manual_open { open | bit } else { open },
                )
            })
    }

    pub fn freeze(&mut self, now: Jiffies, on: bool) {
        if on != self.frozen {
            info!("controller: freeze {}", if on { "on" } else { "off" });
        }
        self.frozen = on;
        self.freeze_deadline = now.wrapping_add(sec_to_jiffies(FREEZE_TIMEOUT_S));
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Reset every pot and restart the round-robin at pot 0.
    pub fn reset_all(&mut self, io: &mut ControllerIo<'_>) {
        for nr in 0..POT_COUNT {
            cycle(&mut self.pots, &self.config, io, nr).reset(true);
        }
        self.current = 0;
    }

    /// Clear every latched watering watchdog.
    pub fn clear_watchdogs(&mut self, io: &mut ControllerIo<'_>) {
        for nr in 0..POT_COUNT {
            cycle(&mut self.pots, &self.config, io, nr).clear_watchdog();
        }
    }

    /// Cross-check the per-pot bookkeeping the state handlers maintain.
    pub fn check_invariants(&self) -> crate::error::Result<()> {
        if self.current >= POT_COUNT {
            return Err(Error::Fault("round-robin index out of range"));
        }
        let mut measuring = 0;
        for pot in &self.pots {
            match pot.state {
                PotStateId::Idle if pot.is_watering => {
                    return Err(Error::Fault("idle pot is watering"));
                }
                PotStateId::WaitingForValve => {}
                _ if pot.valve_auto_open => {
                    return Err(Error::Fault("valve open outside a watering round"));
                }
                PotStateId::Measuring => measuring += 1,
                _ => {}
            }
        }
        if measuring > 1 {
            return Err(Error::Fault("several pots own the sensor engine"));
        }
        if self.save_failures >= SAVE_RETRY_LIMIT {
            return Err(Error::Fault("config store wedged"));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn pot_mut(&mut self, nr: usize) -> &mut Pot {
        &mut self.pots[nr]
    }

    /// A config write is waiting for its debounce to elapse.
    pub fn save_pending(&self) -> bool {
        self.save_due.is_some()
    }
}

fn log_event(io: &mut ControllerIo<'_>, item: LogItem) {
    io.log.append(item);
}
