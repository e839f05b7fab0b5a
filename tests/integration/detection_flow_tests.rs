//! Integration tests: advertisement → smoother → presence → lid, and the
//! loss-check, power-save and battery paths around it.

use std::time::Duration;

use petfeeder::app::commands::AppCommand;
use petfeeder::app::events::AppEvent;
use petfeeder::app::ports::{IDENTIFIER_KEY, IDENTIFIER_NAMESPACE, IdentifierStore};
use petfeeder::app::service::DetectionService;
use petfeeder::beacon::smoother::WINDOW;
use petfeeder::beacon::{AdvRecord, MacAddr};
use petfeeder::config::FeederConfig;
use petfeeder::error::{ActuatorError, Error};
use petfeeder::lid::LidPosition;
use petfeeder::presence::{LossCheck, PresenceState};

use crate::mock_hw::*;

const STRONG: i8 = -40;
const WEAK: i8 = -60;

fn make_service() -> DetectionService {
    DetectionService::new(FeederConfig::default(), TAG)
}

fn feed(
    svc: &mut DetectionService,
    hw: &mut MockHardware,
    sink: &mut RecordingSink,
    rssi: i8,
    count: usize,
) {
    for _ in 0..count {
        svc.handle_advertisement(&tag_adv(rssi), hw, sink).unwrap();
    }
}

/// Warm the smoother and accumulate just enough sightings to open.
fn arrive(svc: &mut DetectionService, hw: &mut MockHardware, sink: &mut RecordingSink) {
    feed(svc, hw, sink, STRONG, WINDOW + 2);
    assert_eq!(svc.presence_state(), PresenceState::Present);
}

/// Run loss checks with no advertisements in between until the loop parks.
fn run_loss_checks(
    svc: &mut DetectionService,
    hw: &mut MockHardware,
    sink: &mut RecordingSink,
) -> Vec<LossCheck> {
    let mut checks = Vec::new();
    loop {
        svc.arm_loss_check();
        let check = svc.finish_loss_check(hw, sink).unwrap();
        checks.push(check);
        if check.parks() {
            return checks;
        }
    }
}

// ── Power-on ──────────────────────────────────────────────────

#[test]
fn power_on_closes_lid_and_arms_power_save() {
    let mut svc = make_service();
    let mut radio = MockRadio::new();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();

    svc.power_on(&mut radio, &mut hw, &mut sink).unwrap();

    assert_eq!(hw.calls, vec![HwCall::SetDuty(26_214), HwCall::Resume]);
    assert_eq!(hw.power_save_arms, vec![Duration::from_millis(500)]);
    assert_eq!(sink.events, vec![AppEvent::LidMoved(LidPosition::Closed)]);
    assert_eq!(svc.lid_position(), LidPosition::Closed);
    assert_eq!(radio.address_filter, Some(TAG));
    assert!(radio.calls.is_empty());
}

#[test]
fn failed_power_on_close_is_recoverable() {
    let mut svc = make_service();
    let mut radio = MockRadio::new();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();
    hw.fail_duty = true;

    let err = svc.power_on(&mut radio, &mut hw, &mut sink).unwrap_err();
    assert!(!err.is_fatal());
    assert!(sink.events.is_empty());
    // The filter is set before the drive is attempted.
    assert_eq!(radio.address_filter, Some(TAG));

    hw.fail_duty = false;
    arrive(&mut svc, &mut hw, &mut sink);
    assert_eq!(svc.lid_position(), LidPosition::Open);
}

// ── Arrival ───────────────────────────────────────────────────

#[test]
fn smoother_warm_up_produces_no_sightings() {
    let mut svc = make_service();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();

    feed(&mut svc, &mut hw, &mut sink, STRONG, WINDOW - 1);
    assert_eq!(svc.sightings(), 0);
    assert_eq!(hw.loss_check_wakes, 0);

    feed(&mut svc, &mut hw, &mut sink, STRONG, 1);
    assert_eq!(svc.sightings(), 1);
    assert_eq!(hw.loss_check_wakes, 1);
}

#[test]
fn close_beacon_opens_lid_exactly_once() {
    let mut svc = make_service();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();

    feed(&mut svc, &mut hw, &mut sink, STRONG, WINDOW + 1);
    assert_eq!(svc.presence_state(), PresenceState::NotPresent);
    assert!(hw.calls.is_empty());

    feed(&mut svc, &mut hw, &mut sink, STRONG, 1);
    assert_eq!(svc.presence_state(), PresenceState::Present);
    assert_eq!(svc.lid_position(), LidPosition::Open);
    assert_eq!(hw.calls, vec![HwCall::SetDuty(78_000), HwCall::Resume]);
    assert_eq!(hw.power_save_arms, vec![Duration::from_millis(500)]);

    // Staying close changes nothing.
    feed(&mut svc, &mut hw, &mut sink, STRONG, 20);
    assert_eq!(hw.duties(), vec![78_000]);
    assert_eq!(svc.sightings(), 4);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::LidMoved(LidPosition::Open))),
        1
    );
    // The loss-check loop was woken only for the first sighting.
    assert_eq!(hw.loss_check_wakes, 1);
}

#[test]
fn weak_signal_never_opens() {
    let mut svc = make_service();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();

    feed(&mut svc, &mut hw, &mut sink, WEAK, 40);
    assert_eq!(svc.sightings(), 0);
    assert_eq!(svc.presence_state(), PresenceState::NotPresent);
    assert!(hw.calls.is_empty());
    assert_eq!(hw.loss_check_wakes, 0);
}

#[test]
fn other_addresses_and_frames_are_ignored() {
    let mut svc = make_service();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();

    for _ in 0..20 {
        let stranger = AdvRecord::discovery(STRANGER, -30, &tlm_frame(3100));
        svc.handle_advertisement(&stranger, &mut hw, &mut sink).unwrap();

        // Right address, but an iBeacon-style payload.
        let other_frame = AdvRecord::discovery(TAG, -30, &[0x02, 0x01, 0x06, 0x1a, 0xff, 0x4c]);
        svc.handle_advertisement(&other_frame, &mut hw, &mut sink).unwrap();
    }

    assert_eq!(svc.sightings(), 0);
    assert!(hw.calls.is_empty());
    assert!(sink.events.is_empty());
}

#[test]
fn failed_open_is_recoverable() {
    let mut svc = make_service();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();
    hw.fail_duty = true;

    feed(&mut svc, &mut hw, &mut sink, STRONG, WINDOW + 1);
    let err = svc
        .handle_advertisement(&tag_adv(STRONG), &mut hw, &mut sink)
        .unwrap_err();

    assert_eq!(err, Error::Actuator(ActuatorError::DutyWriteFailed));
    assert!(!err.is_fatal());
    assert_eq!(svc.presence_state(), PresenceState::Present);
    assert_eq!(svc.lid_position(), LidPosition::Closed);
}

// ── Departure ─────────────────────────────────────────────────

#[test]
fn missed_checks_decay_then_close_lid_once() {
    let mut svc = make_service();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();
    arrive(&mut svc, &mut hw, &mut sink);

    let checks = run_loss_checks(&mut svc, &mut hw, &mut sink);
    assert_eq!(
        checks,
        vec![
            LossCheck::Decayed {
                sightings: 2,
                next_interval_ms: 750
            },
            LossCheck::Decayed {
                sightings: 1,
                next_interval_ms: 750
            },
            LossCheck::Lost,
        ]
    );

    assert_eq!(svc.presence_state(), PresenceState::NotPresent);
    assert_eq!(svc.lid_position(), LidPosition::Closed);
    assert_eq!(hw.duties(), vec![78_000, 26_214]);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::PresenceChanged(PresenceState::NotPresent))),
        1
    );
}

#[test]
fn sighting_during_wait_refreshes_presence() {
    let mut svc = make_service();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();
    arrive(&mut svc, &mut hw, &mut sink);

    assert_eq!(svc.arm_loss_check(), 1000);
    feed(&mut svc, &mut hw, &mut sink, STRONG, 1);
    assert_eq!(
        svc.finish_loss_check(&mut hw, &mut sink).unwrap(),
        LossCheck::Refreshed
    );
    assert_eq!(svc.sightings(), 4);
    assert_eq!(svc.lid_position(), LidPosition::Open);
}

#[test]
fn partial_count_is_cleared_when_beacon_does_not_return() {
    let mut svc = make_service();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();

    feed(&mut svc, &mut hw, &mut sink, STRONG, WINDOW + 1);
    assert_eq!(svc.sightings(), 2);

    svc.arm_loss_check();
    assert_eq!(
        svc.finish_loss_check(&mut hw, &mut sink).unwrap(),
        LossCheck::Cleared
    );
    assert_eq!(svc.sightings(), 0);
    assert!(hw.calls.is_empty());

    // The parked loop is woken again by the next sighting.
    feed(&mut svc, &mut hw, &mut sink, STRONG, 1);
    assert_eq!(hw.loss_check_wakes, 2);
}

#[test]
fn every_lid_drive_rearms_power_save() {
    let mut svc = make_service();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();

    arrive(&mut svc, &mut hw, &mut sink);
    run_loss_checks(&mut svc, &mut hw, &mut sink);

    // Smoother is already warm, so three sightings reopen.
    feed(&mut svc, &mut hw, &mut sink, STRONG, 3);
    assert_eq!(svc.lid_position(), LidPosition::Open);
    assert_eq!(hw.duties(), vec![78_000, 26_214, 78_000]);
    assert_eq!(hw.power_save_arms.len(), 3);

    svc.power_save_elapsed(&mut hw).unwrap();
    assert_eq!(hw.calls.last(), Some(&HwCall::Pause));
    // Pausing the PWM does not change the logical position.
    assert_eq!(svc.lid_position(), LidPosition::Open);
}

// ── Authorized address ────────────────────────────────────────

#[test]
fn setting_address_persists_it() {
    let mut svc = DetectionService::new(FeederConfig::default(), MacAddr::UNSET);
    let mut radio = MockRadio::new();
    let mut nvs = MockNvs::new();
    let mut sink = RecordingSink::new();

    svc.handle_command(AppCommand::SetAuthorizedMac(TAG), &mut radio, &mut nvs, &mut sink)
        .unwrap();

    assert_eq!(svc.authorized(), TAG);
    assert_eq!(
        nvs.raw(IDENTIFIER_NAMESPACE, IDENTIFIER_KEY),
        Some(&TAG.octets()[..])
    );
    assert_eq!(nvs.load_identifier().unwrap(), Some(TAG));
    assert_eq!(sink.events, vec![AppEvent::AuthorizedMacChanged(TAG)]);
    assert!(radio.calls.is_empty());
    assert_eq!(radio.address_filter, Some(TAG));

    // Same address again is a no-op.
    svc.handle_command(AppCommand::SetAuthorizedMac(TAG), &mut radio, &mut nvs, &mut sink)
        .unwrap();
    assert_eq!(sink.events.len(), 1);
}

#[test]
fn new_address_restarts_smoothing() {
    let mut svc = DetectionService::new(FeederConfig::default(), STRANGER);
    let mut hw = MockHardware::new();
    let mut radio = MockRadio::new();
    let mut nvs = MockNvs::new();
    let mut sink = RecordingSink::new();

    for _ in 0..WINDOW {
        let rec = AdvRecord::discovery(STRANGER, STRONG, &tlm_frame(3100));
        svc.handle_advertisement(&rec, &mut hw, &mut sink).unwrap();
    }
    assert_eq!(svc.sightings(), 1);

    svc.handle_command(AppCommand::SetAuthorizedMac(TAG), &mut radio, &mut nvs, &mut sink)
        .unwrap();

    feed(&mut svc, &mut hw, &mut sink, STRONG, WINDOW - 1);
    assert_eq!(svc.sightings(), 1);
    feed(&mut svc, &mut hw, &mut sink, STRONG, 1);
    assert_eq!(svc.sightings(), 2);
}

#[test]
fn failed_persist_still_applies_address() {
    let mut svc = DetectionService::new(FeederConfig::default(), MacAddr::UNSET);
    let mut radio = MockRadio::new();
    let mut nvs = MockNvs::new();
    let mut sink = RecordingSink::new();
    nvs.fail_writes = true;

    svc.handle_command(AppCommand::SetAuthorizedMac(TAG), &mut radio, &mut nvs, &mut sink)
        .unwrap();
    assert_eq!(svc.authorized(), TAG);
    assert_eq!(nvs.load_identifier().unwrap(), None);
}

// ── Batteries ─────────────────────────────────────────────────

#[test]
fn low_beacon_battery_sets_flag() {
    let mut svc = make_service();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();

    let rec = AdvRecord::discovery(TAG, STRONG, &tlm_frame(2900));
    svc.handle_advertisement(&rec, &mut hw, &mut sink).unwrap();
    assert!(hw.beacon_battery_low);
    match sink.events.as_slice() {
        [AppEvent::BeaconTelemetry(t)] => {
            assert_eq!(t.battery_mv, 2900);
            assert_eq!(t.temp_c, 21);
        }
        other => panic!("unexpected events: {other:?}"),
    }

    svc.handle_advertisement(&tag_adv(STRONG), &mut hw, &mut sink)
        .unwrap();
    assert!(!hw.beacon_battery_low);
}

#[test]
fn low_supply_average_sets_flag() {
    let mut svc = make_service();
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();

    svc.on_supply_average(2400, &mut hw, &mut sink);
    assert!(hw.supply_low);
    assert_eq!(
        sink.events.last(),
        Some(&AppEvent::SupplyVoltage {
            avg_mv: 2400,
            low: true
        })
    );

    svc.on_supply_average(2500, &mut hw, &mut sink);
    assert!(!hw.supply_low);
}
