//! Integration tests: scan lifecycle driven through DetectionService
//! with a recording radio. Completions are delivered by hand, in the
//! order the BLE stack would report them.

use petfeeder::app::commands::AppCommand;
use petfeeder::app::events::AppEvent;
use petfeeder::app::service::DetectionService;
use petfeeder::config::FeederConfig;
use petfeeder::error::{Error, RadioError};
use petfeeder::fsm::{ScanCompletion, ScanState};

use crate::mock_hw::*;

fn make_service() -> DetectionService {
    DetectionService::new(FeederConfig::default(), TAG)
}

struct Rig {
    svc: DetectionService,
    radio: MockRadio,
    nvs: MockNvs,
    sink: RecordingSink,
}

impl Rig {
    fn new() -> Self {
        Self {
            svc: make_service(),
            radio: MockRadio::new(),
            nvs: MockNvs::new(),
            sink: RecordingSink::new(),
        }
    }

    fn command(&mut self, cmd: AppCommand) -> petfeeder::error::Result<()> {
        self.svc
            .handle_command(cmd, &mut self.radio, &mut self.nvs, &mut self.sink)
    }

    fn complete(&mut self, done: ScanCompletion) -> petfeeder::error::Result<()> {
        self.svc
            .handle_completion(done, &mut self.radio, &mut self.sink)
    }

    /// Start from scratch and acknowledge every step until scanning.
    fn scanning() -> Self {
        let mut rig = Self::new();
        rig.command(AppCommand::StartScan).unwrap();
        rig.complete(ScanCompletion::ParamsConfigured(Ok(()))).unwrap();
        rig.complete(ScanCompletion::Started(Ok(()))).unwrap();
        assert_eq!(rig.svc.scan_state(), ScanState::On);
        rig
    }
}

// ── Normal bring-up ───────────────────────────────────────────

#[test]
fn first_start_brings_radio_up_then_scans() {
    let mut rig = Rig::new();

    rig.command(AppCommand::StartScan).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::Initializing);
    assert_eq!(rig.radio.calls, vec![RadioCall::BringUp]);

    rig.complete(ScanCompletion::ParamsConfigured(Ok(()))).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::Starting);
    assert_eq!(rig.radio.calls, vec![RadioCall::BringUp, RadioCall::Start]);

    rig.complete(ScanCompletion::Started(Ok(()))).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::On);

    let transitions: Vec<_> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::ScanStateChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![ScanState::Initializing, ScanState::Starting, ScanState::On]
    );
}

#[test]
fn stop_then_start_again_reuses_the_stack() {
    let mut rig = Rig::scanning();

    rig.command(AppCommand::StopScan).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::Stopping);
    rig.complete(ScanCompletion::Stopped(Ok(()))).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::Off);

    rig.command(AppCommand::StartScan).unwrap();
    rig.complete(ScanCompletion::Started(Ok(()))).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::On);
    assert_eq!(rig.radio.count(RadioCall::BringUp), 1);
    assert_eq!(rig.radio.count(RadioCall::Start), 2);
}

// ── Requests while an operation is in flight ─────────────────

#[test]
fn stop_during_starting_stops_once_start_completes() {
    let mut rig = Rig::new();
    rig.command(AppCommand::StartScan).unwrap();
    rig.complete(ScanCompletion::ParamsConfigured(Ok(()))).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::Starting);

    rig.command(AppCommand::StopScan).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::StopPending);
    assert_eq!(rig.radio.count(RadioCall::Stop), 0);

    rig.complete(ScanCompletion::Started(Ok(()))).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::Stopping);
    assert_eq!(rig.radio.count(RadioCall::Stop), 1);

    rig.complete(ScanCompletion::Stopped(Ok(()))).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::Off);
}

#[test]
fn start_during_stopping_restarts_after_stop_completes() {
    let mut rig = Rig::scanning();
    rig.command(AppCommand::StopScan).unwrap();
    rig.command(AppCommand::StartScan).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::StartPending);

    rig.complete(ScanCompletion::Stopped(Ok(()))).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::Starting);
    assert_eq!(rig.radio.calls.last(), Some(&RadioCall::Start));

    rig.complete(ScanCompletion::Started(Ok(()))).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::On);
}

#[test]
fn latest_request_wins_while_stop_is_in_flight() {
    let mut rig = Rig::scanning();
    rig.command(AppCommand::StopScan).unwrap();
    rig.command(AppCommand::StartScan).unwrap();
    rig.command(AppCommand::StopScan).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::Stopping);

    rig.complete(ScanCompletion::Stopped(Ok(()))).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::Off);
    assert_eq!(rig.radio.count(RadioCall::Stop), 1);
}

#[test]
fn stop_before_initialization_is_ignored() {
    let mut rig = Rig::new();
    rig.command(AppCommand::StopScan).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::Uninitialized);
    assert!(rig.radio.calls.is_empty());
    assert!(rig.sink.events.is_empty());
}

#[test]
fn unexpected_completion_leaves_state_alone() {
    let mut rig = Rig::scanning();
    rig.complete(ScanCompletion::Stopped(Ok(()))).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::On);
}

// ── Failures ─────────────────────────────────────────────────

#[test]
fn bring_up_failure_is_fatal() {
    let mut rig = Rig::new();
    rig.radio.fail_bring_up = Some(-1);

    let err = rig.command(AppCommand::StartScan).unwrap_err();
    assert_eq!(err, Error::Radio(RadioError::BringUpFailed(-1)));
    assert!(err.is_fatal());
    assert_eq!(rig.svc.scan_state(), ScanState::Uninitialized);
}

#[test]
fn rejected_scan_parameters_are_fatal() {
    let mut rig = Rig::new();
    rig.command(AppCommand::StartScan).unwrap();

    let err = rig
        .complete(ScanCompletion::ParamsConfigured(Err(0x103)))
        .unwrap_err();
    assert_eq!(err, Error::Radio(RadioError::ParamsRejected(0x103)));
    assert_eq!(rig.svc.scan_state(), ScanState::Uninitialized);
    assert_eq!(rig.radio.count(RadioCall::Start), 0);
}

#[test]
fn rejected_start_falls_back_to_off() {
    let mut rig = Rig::new();
    rig.radio.fail_start = Some(3);
    rig.command(AppCommand::StartScan).unwrap();

    rig.complete(ScanCompletion::ParamsConfigured(Ok(()))).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::Off);

    // The next request tries again.
    rig.radio.fail_start = None;
    rig.command(AppCommand::StartScan).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::Starting);
}

#[test]
fn failed_start_completion_falls_back_to_off() {
    let mut rig = Rig::new();
    rig.command(AppCommand::StartScan).unwrap();
    rig.complete(ScanCompletion::ParamsConfigured(Ok(()))).unwrap();

    rig.complete(ScanCompletion::Started(Err(7))).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::Off);
}

#[test]
fn failed_stop_completion_keeps_scanning() {
    let mut rig = Rig::scanning();
    rig.command(AppCommand::StopScan).unwrap();
    rig.complete(ScanCompletion::Stopped(Err(9))).unwrap();
    assert_eq!(rig.svc.scan_state(), ScanState::On);
}
