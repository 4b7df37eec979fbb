//! Watering cycles driven through the full superloop: host requests in,
//! sensor readings and valve commits out.

use irrigator::app::ports::ConfigPort;
use irrigator::clock::{msec_to_jiffies, sec_to_jiffies};
use irrigator::comm::messages::{MANFLG_FREEZE_CHANGE, MANFLG_FREEZE_ENABLE};
use irrigator::comm::{ErrorCode, ManualMode, Message};
use irrigator::config::{GlobalConfig, PotConfig};
use irrigator::eventlog::{self, InfoCode, LogKind};
use irrigator::fsm::PotStateId;

use super::mock_hw::{RAW_DRY, RAW_WET, Rig, SharedStore, logging_pot};

/// Configure pot 0 dry and run until its valve opens.
fn watering_rig_with(store: SharedStore) -> Rig {
    let mut rig = Rig::boot(store, 0);
    rig.sensor().raw[0] = RAW_DRY;
    rig.configure_pot(0, logging_pot());
    assert!(
        rig.run_until(15_000, |r| r.valves().is_open(0)),
        "dry pot never started watering"
    );
    rig
}

fn watering_rig() -> Rig {
    watering_rig_with(SharedStore::default())
}

// ── Measurement cycle ─────────────────────────────────────────

#[test]
fn first_measurement_waits_for_initial_interval() {
    let mut rig = Rig::new();
    rig.configure_pot(0, logging_pot());
    let configured = rig.now;

    rig.run(sec_to_jiffies(9));
    assert!(rig.sensor().starts_for(0).is_empty());

    rig.run(sec_to_jiffies(2));
    let starts = rig.sensor().starts_for(0);
    assert_eq!(starts.len(), 1);
    assert!(starts[0] >= configured + sec_to_jiffies(10));
    assert!(starts[0] <= configured + sec_to_jiffies(10) + 20);
}

#[test]
fn disabled_pots_are_never_measured() {
    let mut rig = Rig::new();
    rig.run_ms(120_000);
    assert!(rig.sensor().starts.is_empty());
    assert_eq!(rig.valves().state(), 0);
}

#[test]
fn moist_pot_is_measured_once_per_interval() {
    let mut rig = Rig::new();
    rig.configure_pot(0, logging_pot());
    rig.run_ms(11_000);
    assert_eq!(rig.sensor().starts_for(0).len(), 1);
    assert_eq!(rig.pot(0).state_id, PotStateId::Idle);
    assert_eq!(rig.pot(0).last_raw, 512);

    rig.run_ms(58_000);
    assert_eq!(rig.sensor().starts_for(0).len(), 1);
    rig.run_ms(3_000);
    assert_eq!(rig.sensor().starts_for(0).len(), 2);
    assert_eq!(rig.valves().openings(0), 0);
}

#[test]
fn dry_pot_is_watered_until_wet() {
    let mut rig = watering_rig();
    let state = rig.pot(0);
    assert!(state.is_watering);
    assert_eq!(state.state_id, PotStateId::WaitingForValve);
    assert_eq!(state.last_raw, RAW_DRY);
    assert_eq!(state.last_value, 80);

    // Valve open 3 s, then closed to settle.
    rig.run_ms(3_100);
    assert!(!rig.valves().is_open(0));
    assert!(rig.pot(0).is_watering);

    rig.sensor().raw[0] = RAW_WET;
    assert!(rig.run_until(40_000, |r| !r.pot(0).is_watering));
    let stopped = rig.now;
    assert!(!rig.valves().is_open(0));
    assert_eq!(rig.valves().openings(0), 1);
    assert_eq!(rig.pot(0).state_id, PotStateId::Idle);
    assert_eq!(rig.pot(0).last_value, 180);

    // Back to the regular interval.
    let before = rig.sensor().starts_for(0).len();
    rig.run_ms(59_000);
    assert_eq!(rig.sensor().starts_for(0).len(), before);
    rig.run_ms(2_000);
    let starts = rig.sensor().starts_for(0);
    assert_eq!(starts.len(), before + 1);
    assert!(starts[before] >= stopped + sec_to_jiffies(60));
    assert!(starts[before] <= stopped + sec_to_jiffies(60) + 20);
}

#[test]
fn still_dry_pot_gets_another_round() {
    let mut rig = watering_rig();
    // 3 s open + 30 s settle + measurement.
    rig.run_ms(34_000);
    assert!(rig.pot(0).is_watering);
    assert_eq!(rig.valves().openings(0), 2);
}

#[test]
fn watering_changes_are_logged() {
    let mut rig = watering_rig();
    rig.sensor().raw[0] = RAW_WET;
    assert!(rig.run_until(40_000, |r| !r.pot(0).is_watering));

    let changes: Vec<u8> = rig
        .fetch_log()
        .iter()
        .filter(|i| i.kind() == Some(LogKind::Info) && i.code() == InfoCode::WateringChange as u8)
        .map(|i| i.data())
        .collect();
    assert_eq!(changes, vec![0x80, 0x00]);
}

#[test]
fn implausible_reading_logs_sensor_error() {
    let mut rig = Rig::new();
    rig.sensor().raw[0] = 3;
    rig.configure_pot(0, logging_pot());
    rig.run_ms(11_000);

    assert_eq!(rig.pot(0).state_id, PotStateId::Idle);
    assert_eq!(rig.valves().openings(0), 0);
    let log = rig.fetch_log();
    assert!(log.iter().any(|i| {
        i.kind() == Some(LogKind::Error)
            && i.code() == eventlog::ErrorCode::Sensor as u8
            && i.data() == 0
    }));
}

#[test]
fn pots_share_the_sensor_engine() {
    let mut rig = Rig::new();
    for nr in 0..3 {
        rig.configure_pot(nr, logging_pot());
    }
    rig.run_ms(11_000);
    for nr in 0..3 {
        assert_eq!(rig.sensor().starts_for(nr).len(), 1, "pot {}", nr);
    }
    // Never two measurements in flight.
    let starts = &rig.sensor().starts;
    for pair in starts.windows(2) {
        assert!(pair[1].1 >= pair[0].1 + 2);
    }
}

// ── Watering watchdog ─────────────────────────────────────────

#[test]
fn watchdog_latches_when_watering_makes_no_progress() {
    let mut rig = watering_rig();
    assert!(!rig.app.is_notifying());

    assert!(rig.run_until(700_000, |r| r.remanent(0).watchdog_triggered()));
    assert!(rig.app.is_notifying());
    assert!(!rig.pot(0).is_watering);
    assert!(!rig.valves().is_open(0));
    assert_eq!(rig.pot(0).state_id, PotStateId::Idle);

    let store = rig.store.clone();
    assert!(store.load_remanent(0).unwrap().watchdog_triggered());
    assert!(store.load_notify_led().unwrap());

    let log = rig.fetch_log();
    assert!(log.iter().any(|i| {
        i.kind() == Some(LogKind::Error)
            && i.code() == eventlog::ErrorCode::Watchdog as u8
            && i.data() == 0
    }));

    // A latched pot stays idle.
    let starts = rig.sensor().starts_for(0).len();
    rig.run_ms(180_000);
    assert_eq!(rig.sensor().starts_for(0).len(), starts);
}

#[test]
fn watchdog_rearms_on_progress() {
    let mut rig = watering_rig();
    // About 2 scaled steps per round; 12 are needed within 600 s.
    for _ in 0..25 {
        rig.run_ms(34_000);
        rig.sensor().raw[0] += 8;
    }
    assert!(!rig.remanent(0).watchdog_triggered());
    assert!(rig.pot(0).is_watering);
}

#[test]
fn watchdog_latch_survives_reboot_until_switched_on() {
    let mut rig = watering_rig();
    assert!(rig.run_until(700_000, |r| r.remanent(0).watchdog_triggered()));
    let store = rig.store.clone();
    drop(rig);

    let mut rig = Rig::boot(store, 0);
    assert!(rig.remanent(0).watchdog_triggered());
    assert!(rig.app.is_notifying());

    // Switch off at boot: the latch stays.
    rig.switch.set(true);
    rig.run_ms(1_000);
    assert!(rig.remanent(0).watchdog_triggered());

    rig.set_switch(true);
    rig.run_ms(200);
    assert!(!rig.remanent(0).watchdog_triggered());
    assert!(!rig.store.load_remanent(0).unwrap().watchdog_triggered());

    // The pot measures again after the initial interval.
    let starts = rig.sensor().starts_for(0).len();
    rig.run_ms(11_000);
    assert_eq!(rig.sensor().starts_for(0).len(), starts + 1);
}

#[test]
fn booting_switched_on_clears_latches() {
    let store = SharedStore::default();
    {
        let mut rig = watering_rig_with(store.clone());
        assert!(rig.run_until(700_000, |r| r.remanent(0).watchdog_triggered()));
    }
    let mut rig = Rig::boot(store, 0);
    rig.run(1);
    assert!(!rig.remanent(0).watchdog_triggered());
}

// ── Switch, freeze, configuration ─────────────────────────────

#[test]
fn switching_off_resets_every_pot() {
    let mut rig = watering_rig();
    rig.set_switch(false);
    rig.run_ms(200);

    assert!(!rig.pot(0).is_watering);
    assert!(!rig.valves().is_open(0));
    assert_eq!(rig.pot(0).state_id, PotStateId::Idle);
    assert_eq!(rig.pot(0).last_raw, 0);

    let starts = rig.sensor().starts.len();
    rig.run_ms(60_000);
    assert_eq!(rig.sensor().starts.len(), starts);

    let switches: Vec<u8> = rig
        .fetch_log()
        .iter()
        .filter(|i| i.kind() == Some(LogKind::Info) && i.code() == InfoCode::OnOffSwitch as u8)
        .map(|i| i.data())
        .collect();
    assert_eq!(switches, vec![1, 0]);

    rig.set_switch(true);
    rig.run_ms(11_000);
    assert_eq!(rig.sensor().starts.len(), starts + 1);
}

fn freeze(rig: &mut Rig, on: bool) {
    let flags = MANFLG_FREEZE_CHANGE | if on { MANFLG_FREEZE_ENABLE } else { 0 };
    let reply = rig.request(Message::ManMode(ManualMode {
        flags,
        ..Default::default()
    }));
    assert_eq!(reply.error_code(), ErrorCode::Ok);
}

#[test]
fn frozen_controller_does_not_measure() {
    let mut rig = Rig::new();
    rig.configure_pot(0, logging_pot());
    for _ in 0..5 {
        freeze(&mut rig, true);
        rig.run_ms(4_000);
    }
    assert!(rig.app.controller().is_frozen());
    assert!(rig.sensor().starts.is_empty());

    freeze(&mut rig, false);
    rig.run_ms(200);
    assert_eq!(rig.sensor().starts_for(0).len(), 1);
    let log = rig.fetch_log();
    assert!(!log.iter().any(|i| {
        i.kind() == Some(LogKind::Error) && i.code() == eventlog::ErrorCode::FreezeTimeout as u8
    }));
}

#[test]
fn unrenewed_freeze_times_out() {
    let mut rig = Rig::new();
    freeze(&mut rig, true);
    rig.run_ms(4_900);
    assert!(rig.app.controller().is_frozen());
    rig.run_ms(200);
    assert!(!rig.app.controller().is_frozen());

    let log = rig.fetch_log();
    assert!(log.iter().any(|i| {
        i.kind() == Some(LogKind::Error) && i.code() == eventlog::ErrorCode::FreezeTimeout as u8
    }));
}

#[test]
fn unchanged_configuration_does_not_reset() {
    let mut rig = watering_rig();
    rig.configure_pot(0, logging_pot());
    assert!(rig.pot(0).is_watering);
    assert!(rig.valves().is_open(0));

    let reply = rig.request(Message::ContrConf(GlobalConfig::default()));
    assert_eq!(reply.error_code(), ErrorCode::Ok);
    assert!(rig.pot(0).is_watering);
}

#[test]
fn changed_pot_configuration_resets_that_pot() {
    let mut rig = watering_rig();
    rig.configure_pot(
        0,
        PotConfig {
            min_threshold: 90,
            ..logging_pot()
        },
    );
    assert!(!rig.pot(0).is_watering);
    assert!(!rig.valves().is_open(0));
    assert_eq!(rig.pot(0).state_id, PotStateId::Idle);
    // Still enabled: the last reading is kept.
    assert_eq!(rig.pot(0).last_raw, RAW_DRY);
}

#[test]
fn changed_global_configuration_resets_all_pots() {
    let mut rig = watering_rig();
    let reply = rig.request(Message::ContrConf(GlobalConfig {
        sensor_lowest_value: 16,
        ..GlobalConfig::default()
    }));
    assert_eq!(reply.error_code(), ErrorCode::Ok);
    assert!(!rig.pot(0).is_watering);
    assert_eq!(rig.pot(0).last_raw, 0);
}

#[test]
fn global_disable_stops_scheduling() {
    let mut rig = Rig::new();
    rig.configure_pot(0, logging_pot());
    let reply = rig.request(Message::ContrConf(GlobalConfig {
        flags: 0,
        ..GlobalConfig::default()
    }));
    assert_eq!(reply.error_code(), ErrorCode::Ok);
    rig.run_ms(30_000);
    assert!(rig.sensor().starts.is_empty());
}

#[test]
fn configuration_is_saved_after_debounce() {
    let mut rig = Rig::new();
    rig.configure_pot(0, logging_pot());
    assert!(rig.app.controller().save_pending());
    assert!(rig.store.load().is_err());

    rig.run(msec_to_jiffies(2_900));
    assert!(rig.store.load().is_err());

    rig.run(msec_to_jiffies(200));
    assert!(!rig.app.controller().save_pending());
    assert_eq!(rig.store.load().unwrap().pots[0], logging_pot());

    let rig = Rig::boot(rig.store.clone(), 0);
    assert_eq!(rig.app.controller().config().pots[0], logging_pot());
}
