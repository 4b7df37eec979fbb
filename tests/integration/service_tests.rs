//! Host requests against the assembled service: clock, configuration,
//! pot state, manual mode and the notification LED.

use irrigator::app::ports::ConfigPort;
use irrigator::comm::frame::FC_REQ_ACK;
use irrigator::comm::messages::{MANFLG_NOTIFY_CHANGE, MANFLG_NOTIFY_ENABLE};
use irrigator::comm::{ErrorCode, Frame, ManualMode, Message};
use irrigator::config::{
    GlobalConfig, POT_ENABLED, POT_LOG, POT_LOG_VERBOSE, PotConfig, REM_WATCHDOG_TRIGGERED,
    RemanentState,
};
use irrigator::datetime::{RtcTime, TimeOfDayRange};
use irrigator::eventlog::{InfoCode, LogKind};
use irrigator::fsm::PotStateId;

use super::mock_hw::{RAW_DRY, Rig, logging_pot};

fn noon_monday() -> RtcTime {
    RtcTime {
        second: 0,
        minute: 0,
        hour: 12,
        day: 14,
        month: 3,
        year: 26,
        day_of_week: 0,
    }
}

// ── Clock ─────────────────────────────────────────────────────

#[test]
fn rtc_set_and_fetch() {
    let mut rig = Rig::new();
    assert_eq!(rig.request(Message::Rtc(noon_monday())).error_code(), ErrorCode::Ok);
    assert_eq!(rig.app.time(), noon_monday());
    assert_eq!(rig.query(Message::RtcFetch), Some(Message::Rtc(noon_monday())));
}

#[test]
fn rtc_failure_keeps_cached_time() {
    let mut rig = Rig::new();
    rig.request(Message::Rtc(noon_monday()));
    rig.app.rtc_mut().set_failing(true);
    rig.run_ms(3_000);
    assert_eq!(rig.app.time(), noon_monday());
    assert_eq!(rig.query(Message::RtcFetch), Some(Message::Rtc(noon_monday())));

    let later = RtcTime {
        hour: 13,
        ..noon_monday()
    };
    assert_eq!(rig.request(Message::Rtc(later)).error_code(), ErrorCode::Fail);
    assert_eq!(rig.app.time(), noon_monday());
}

#[test]
fn out_of_range_time_is_rejected() {
    let mut rig = Rig::new();
    let mut msg = Message::Rtc(noon_monday()).encode();
    msg[3] = 24; // hour
    let mut frame = Frame::with_payload(msg);
    frame.fc = FC_REQ_ACK;
    frame.set_src(1);
    frame.seal();
    rig.inject(&frame.to_bytes());
    rig.run(1);
    let reply = Frame::decode(&rig.take_tx()).unwrap();
    assert_eq!(reply.error_code(), ErrorCode::Fail);
    assert_eq!(rig.app.time(), RtcTime::default());
}

// ── Activity window ───────────────────────────────────────────

#[test]
fn pot_only_measures_inside_its_window() {
    let mut rig = Rig::new();
    rig.request(Message::Rtc(noon_monday()));

    // 13:00 to 14:00, in two-second units.
    let window = PotConfig {
        active_range: TimeOfDayRange {
            from: 13 * 1800,
            to: 14 * 1800,
        },
        ..logging_pot()
    };
    rig.configure_pot(0, window);
    rig.run_ms(20_000);
    assert!(rig.sensor().starts.is_empty());

    rig.request(Message::Rtc(RtcTime {
        hour: 13,
        minute: 5,
        ..noon_monday()
    }));
    rig.run_ms(200);
    assert_eq!(rig.sensor().starts_for(0).len(), 1);
}

#[test]
fn pot_only_measures_on_enabled_weekdays() {
    let mut rig = Rig::new();
    rig.request(Message::Rtc(noon_monday()));
    rig.configure_pot(
        0,
        PotConfig {
            dow_on_mask: 0b0111_1110,
            ..logging_pot()
        },
    );
    rig.run_ms(20_000);
    assert!(rig.sensor().starts.is_empty());

    rig.request(Message::Rtc(RtcTime {
        day_of_week: 1,
        ..noon_monday()
    }));
    rig.run_ms(200);
    assert_eq!(rig.sensor().starts_for(0).len(), 1);
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn pot_configuration_round_trips() {
    let mut rig = Rig::new();
    let cfg = PotConfig {
        flags: POT_ENABLED,
        min_threshold: 60,
        max_threshold: 200,
        active_range: TimeOfDayRange { from: 100, to: 4000 },
        dow_on_mask: 0x1F,
    };
    rig.configure_pot(4, cfg);
    assert_eq!(
        rig.query(Message::PotConfFetch { pot: 4 }),
        Some(Message::PotConf { pot: 4, config: cfg })
    );
    assert_eq!(
        rig.query(Message::PotConfFetch { pot: 3 }),
        Some(Message::PotConf {
            pot: 3,
            config: PotConfig::default()
        })
    );
}

#[test]
fn invalid_configuration_is_refused() {
    let mut rig = Rig::new();
    let bad = PotConfig {
        min_threshold: 170,
        max_threshold: 85,
        ..logging_pot()
    };
    let reply = rig.request(Message::PotConf { pot: 0, config: bad });
    assert_eq!(reply.error_code(), ErrorCode::Fail);
    assert_eq!(rig.app.controller().config().pots[0], PotConfig::default());

    let reply = rig.request(Message::ContrConf(GlobalConfig {
        sensor_lowest_value: 900,
        sensor_highest_value: 100,
        ..GlobalConfig::default()
    }));
    assert_eq!(reply.error_code(), ErrorCode::Fail);
    assert!(!rig.app.controller().save_pending());
}

#[test]
fn global_configuration_round_trips() {
    let mut rig = Rig::new();
    let g = GlobalConfig {
        flags: 1,
        sensor_lowest_value: 150,
        sensor_highest_value: 800,
    };
    assert_eq!(rig.request(Message::ContrConf(g)).error_code(), ErrorCode::Ok);
    assert_eq!(rig.query(Message::ContrConfFetch), Some(Message::ContrConf(g)));
}

// ── Pot state ─────────────────────────────────────────────────

#[test]
fn pot_state_reports_the_last_reading() {
    let mut rig = Rig::new();
    rig.sensor().raw[0] = RAW_DRY;
    rig.configure_pot(0, logging_pot());
    assert!(rig.run_until(15_000, |r| r.pot(0).is_watering));

    match rig.query(Message::PotStateFetch { pot: 0 }) {
        Some(Message::PotState { pot: 0, state }) => {
            assert_eq!(state.state_id, PotStateId::WaitingForValve);
            assert!(state.is_watering);
            assert_eq!(state.last_raw, RAW_DRY);
            assert_eq!(state.last_value, 80);
        }
        other => panic!("unexpected reply {:?}", other),
    }
}

#[test]
fn verbose_pot_logs_sensor_data_and_state_changes() {
    let mut rig = Rig::new();
    rig.configure_pot(
        1,
        PotConfig {
            flags: POT_ENABLED | POT_LOG | POT_LOG_VERBOSE,
            ..PotConfig::default()
        },
    );
    rig.run_ms(11_000);

    let log = rig.fetch_log();
    let sensor: Vec<_> = log
        .iter()
        .filter(|i| i.kind() == Some(LogKind::SensorData))
        .collect();
    assert_eq!(sensor.len(), 1);
    assert_eq!(sensor[0].sensor_word(), (1 << 10) | 512);
    assert!(log.iter().any(|i| {
        i.kind() == Some(LogKind::Info)
            && i.code() == InfoCode::StateChange as u8
            && i.data() == (((PotStateId::Measuring as u8) << 4) | 1)
    }));
}

#[test]
fn remanent_state_is_written_and_persisted() {
    let mut rig = Rig::new();
    let latched = RemanentState {
        flags: REM_WATCHDOG_TRIGGERED,
    };
    let reply = rig.request(Message::PotRemState { pot: 2, rem: latched });
    assert_eq!(reply.error_code(), ErrorCode::Ok);
    assert_eq!(rig.remanent(2), latched);
    assert_eq!(rig.store.load_remanent(2).unwrap(), latched);
    assert_eq!(
        rig.query(Message::PotRemStateFetch { pot: 2 }),
        Some(Message::PotRemState { pot: 2, rem: latched })
    );

    rig.request(Message::PotRemState {
        pot: 2,
        rem: RemanentState::default(),
    });
    assert!(!rig.store.load_remanent(2).unwrap().watchdog_triggered());
}

#[test]
fn empty_log_answers_fail() {
    let mut rig = Rig::new();
    // The first pass logs the switch-on edge.
    rig.run(1);
    let items = rig.fetch_log();
    assert_eq!(items.len(), 1);
    assert_eq!(rig.request(Message::LogFetch).error_code(), ErrorCode::Fail);
}

// ── Manual mode ───────────────────────────────────────────────

#[test]
fn manual_valve_override() {
    let mut rig = Rig::new();
    let reply = rig.request(Message::ManMode(ManualMode {
        manual_mask: 0b0000_0110,
        manual_state: 0b0000_0010,
        ..Default::default()
    }));
    assert_eq!(reply.error_code(), ErrorCode::Ok);
    assert!(rig.valves().is_open(1));
    assert!(!rig.valves().is_open(2));

    match rig.query(Message::ManModeFetch) {
        Some(Message::ManMode(m)) => {
            assert_eq!(m.manual_mask, 0b0000_0110);
            assert_eq!(m.manual_state, 0b0000_0010);
            assert_eq!(m.flags, 0);
        }
        other => panic!("unexpected reply {:?}", other),
    }

    rig.request(Message::ManMode(ManualMode::default()));
    assert!(!rig.valves().is_open(1));
}

#[test]
fn force_stop_ends_watering() {
    let mut rig = Rig::new();
    rig.sensor().raw[0] = RAW_DRY;
    rig.configure_pot(0, logging_pot());
    assert!(rig.run_until(15_000, |r| r.pot(0).is_watering));

    rig.request(Message::ManMode(ManualMode {
        force_stop_mask: 0b1,
        ..Default::default()
    }));
    assert!(!rig.pot(0).is_watering);
    assert!(!rig.valves().is_open(0));
    assert_eq!(rig.pot(0).state_id, PotStateId::Idle);
}

#[test]
fn force_start_skips_the_interval() {
    let mut rig = Rig::new();
    rig.configure_pot(0, logging_pot());
    rig.configure_pot(1, PotConfig::default());
    rig.request(Message::ManMode(ManualMode {
        force_start_mask: 0b11,
        ..Default::default()
    }));
    assert_eq!(rig.pot(0).state_id, PotStateId::StartMeasurement);
    // Disabled pots ignore the request.
    assert_eq!(rig.pot(1).state_id, PotStateId::Idle);

    rig.run_ms(200);
    assert_eq!(rig.sensor().starts_for(0).len(), 1);
    assert!(rig.sensor().starts_for(1).is_empty());
}

#[test]
fn notify_led_is_persisted() {
    let mut rig = Rig::new();
    rig.request(Message::ManMode(ManualMode {
        flags: MANFLG_NOTIFY_CHANGE | MANFLG_NOTIFY_ENABLE,
        ..Default::default()
    }));
    assert!(rig.app.is_notifying());
    assert!(rig.store.load_notify_led().unwrap());

    // The LED blinks.
    let mut seen_off = false;
    let mut seen_on = false;
    for _ in 0..100 {
        rig.run(1);
        seen_on |= rig.led.get();
        seen_off |= !rig.led.get();
    }
    assert!(seen_on && seen_off);

    match rig.query(Message::ManModeFetch) {
        Some(Message::ManMode(m)) => assert_eq!(m.flags, MANFLG_NOTIFY_ENABLE),
        other => panic!("unexpected reply {:?}", other),
    }

    let store = rig.store.clone();
    drop(rig);
    let mut rig = Rig::boot(store, 0);
    assert!(rig.app.is_notifying());

    rig.request(Message::ManMode(ManualMode {
        flags: MANFLG_NOTIFY_CHANGE,
        ..Default::default()
    }));
    assert!(!rig.app.is_notifying());
    assert!(!rig.store.load_notify_led().unwrap());
    rig.run_ms(4_000);
    assert!(!rig.led.get());
}
