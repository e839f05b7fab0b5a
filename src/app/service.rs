//! Detection service: the hexagonal core.
//!
//! [`DetectionService`] owns the scan lifecycle machine, the advertisement
//! filter, the RSSI smoother, the presence engine and the lid controller.
//! It is the single owner of all detection state; every callback and
//! background loop reaches it through the runtime's shared handle. All I/O
//! flows through port traits injected at call sites, making the entire
//! service testable with mock adapters.
//!
//! ```text
//!  RadioPort ◀──  ┌──────────────────────────────┐ ──▶ EventSink
//!                 │       DetectionService        │
//!  ServoPort ◀──  │ Scan FSM · Filter · Smoother  │ ──▶ StatusPort
//!                 │ Presence · Lid                │
//!  TimerPort ◀──  └──────────────────────────────┘ ◀─▶ IdentifierStore
//! ```

use log::{debug, error, info, warn};

use crate::beacon::filter::AdvertisementFilter;
use crate::beacon::smoother::RssiSmoother;
use crate::beacon::{AdvRecord, MacAddr};
use crate::config::FeederConfig;
use crate::error::{RadioError, Result};
use crate::fsm::{ScanAction, ScanCompletion, ScanFsm, ScanInput, ScanState, StepKind};
use crate::lid::{LidController, LidPosition};
use crate::presence::{LossCheck, PresenceEngine, PresenceState};

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{EventSink, IdentifierStore, RadioPort, ServoPort, StatusPort, TimerPort};

// ───────────────────────────────────────────────────────────────
// DetectionService
// ───────────────────────────────────────────────────────────────

pub struct DetectionService {
    config: FeederConfig,
    scan: ScanFsm,
    filter: AdvertisementFilter,
    smoother: RssiSmoother,
    presence: PresenceEngine,
    lid: LidController,
}

impl DetectionService {
    /// Construct the service. The radio stays down until the first
    /// [`AppCommand::StartScan`].
    pub fn new(config: FeederConfig, authorized: MacAddr) -> Self {
        if authorized.is_unset() {
            warn!("No authorized beacon configured, lid will stay closed");
        }
        Self {
            scan: ScanFsm::new(),
            filter: AdvertisementFilter::new(authorized),
            smoother: RssiSmoother::new(config.slew_delta_dbm),
            presence: PresenceEngine::new(&config),
            lid: LidController::new(&config),
            config,
        }
    }

    // ── Power-on ──────────────────────────────────────────────

    /// Runs once before any other entry point: points the radio's
    /// pre-filter at the authorized beacon and drives the lid closed,
    /// whatever position a reset left it in.
    pub fn power_on(
        &mut self,
        radio: &mut impl RadioPort,
        hw: &mut (impl ServoPort + TimerPort),
        sink: &mut impl EventSink,
    ) -> Result<()> {
        radio.set_address_filter(self.filter.authorized());
        info!("Power-on, closing lid");
        self.drive_lid(LidPosition::Closed, hw, sink)
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.
    ///
    /// Returns `Err` only for radio bring-up failures, which the caller
    /// treats as fatal.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        radio: &mut impl RadioPort,
        store: &mut impl IdentifierStore,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        match cmd {
            AppCommand::StartScan => self.drive_scan(ScanInput::Start, radio, sink),
            AppCommand::StopScan => self.drive_scan(ScanInput::Stop, radio, sink),
            AppCommand::SetAuthorizedMac(mac) => {
                self.set_authorized(mac, radio, store, sink);
                Ok(())
            }
        }
    }

    /// Apply a hardware completion reported by the radio.
    ///
    /// Returns `Err` when scan-parameter configuration failed.
    pub fn handle_completion(
        &mut self,
        completion: ScanCompletion,
        radio: &mut impl RadioPort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        self.drive_scan(completion.into(), radio, sink)
    }

    // ── Advertisement path ────────────────────────────────────

    /// Filter → smoother → presence → lid.
    ///
    /// Returns `Err` only if the lid could not be driven; presence state
    /// has already been updated by then.
    pub fn handle_advertisement(
        &mut self,
        record: &AdvRecord,
        hw: &mut (impl ServoPort + StatusPort + TimerPort),
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let Some(accepted) = self.filter.accept(record) else {
            return Ok(());
        };
        debug!("beacon adv RSSI {} dBm", accepted.rssi);

        if let Some(t) = accepted.telemetry {
            hw.set_beacon_battery_low(t.battery_mv < self.config.beacon_battery_low_mv);
            sink.emit(&AppEvent::BeaconTelemetry(t));
        }

        let Some(smoothed) = self.smoother.observe(accepted.rssi) else {
            return Ok(());
        };

        let outcome = self.presence.on_sighting(smoothed);
        if outcome.wake_loss_check {
            hw.wake_loss_check();
        }
        if outcome.became_present {
            info!("Beacon detected, opening lid");
            sink.emit(&AppEvent::PresenceChanged(PresenceState::Present));
            self.drive_lid(LidPosition::Open, hw, sink)?;
        }
        Ok(())
    }

    // ── Loss-check loop entry points ──────────────────────────

    /// Begin a loss-check wait; returns its length in milliseconds.
    pub fn arm_loss_check(&mut self) -> u32 {
        self.presence.arm_loss_check()
    }

    /// Finish a loss-check wait. Closes the lid when the pet is lost.
    pub fn finish_loss_check(
        &mut self,
        hw: &mut (impl ServoPort + TimerPort),
        sink: &mut impl EventSink,
    ) -> Result<LossCheck> {
        let check = self.presence.finish_loss_check();
        if check == LossCheck::Lost {
            info!("Beacon lost, closing lid");
            sink.emit(&AppEvent::PresenceChanged(PresenceState::NotPresent));
            self.drive_lid(LidPosition::Closed, hw, sink)?;
        }
        Ok(check)
    }

    // ── Power-save / supply entry points ──────────────────────

    /// The servo hold time elapsed without a new drive command.
    pub fn power_save_elapsed(&mut self, servo: &mut impl ServoPort) -> Result<()> {
        debug!("servo hold elapsed, pausing PWM");
        self.lid.release(servo)
    }

    /// A full block of supply-voltage samples has been averaged.
    pub fn on_supply_average(
        &mut self,
        avg_mv: u16,
        status: &mut impl StatusPort,
        sink: &mut impl EventSink,
    ) {
        let low = avg_mv < self.config.supply_low_mv;
        status.set_battery_low(low);
        sink.emit(&AppEvent::SupplyVoltage { avg_mv, low });
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn scan_state(&self) -> ScanState {
        self.scan.state()
    }

    pub fn presence_state(&self) -> PresenceState {
        self.presence.state()
    }

    pub fn sightings(&self) -> u8 {
        self.presence.sightings()
    }

    /// The loss-check loop is waiting for a sighting rather than a timer.
    pub fn loss_check_parked(&self) -> bool {
        self.presence.is_parked()
    }

    pub fn authorized(&self) -> MacAddr {
        self.filter.authorized()
    }

    pub fn lid_position(&self) -> LidPosition {
        self.lid.position()
    }

    pub fn config(&self) -> &FeederConfig {
        &self.config
    }

    // ── Internal ──────────────────────────────────────────────

    /// Run one input through the scan machine, issue the resulting
    /// hardware action and feed synchronous rejections back in as failed
    /// completions.
    fn drive_scan(
        &mut self,
        input: ScanInput,
        radio: &mut impl RadioPort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let mut next = Some(input);
        let mut fatal = None;

        while let Some(input) = next.take() {
            let step = self.scan.handle(input);
            if step.from != step.to {
                sink.emit(&AppEvent::ScanStateChanged {
                    from: step.from,
                    to: step.to,
                });
            }
            if let (ScanInput::ParamsConfigured(_), StepKind::Failed(rc)) = (input, step.kind) {
                fatal.get_or_insert(RadioError::ParamsRejected(rc));
            }

            let Some(action) = step.action else {
                continue;
            };
            let issued = match action {
                ScanAction::BringUp => radio.bring_up(),
                ScanAction::StartScan => radio.start_scan(),
                ScanAction::StopScan => radio.stop_scan(),
            };
            if let Err(e) = issued {
                error!("{action:?} rejected: {e}");
                let rc = Err(e.code());
                next = Some(match action {
                    ScanAction::BringUp => {
                        fatal = Some(e);
                        ScanInput::ParamsConfigured(rc)
                    }
                    ScanAction::StartScan => ScanInput::ScanStarted(rc),
                    ScanAction::StopScan => ScanInput::ScanStopped(rc),
                });
            }
        }

        match fatal {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn drive_lid(
        &mut self,
        target: LidPosition,
        hw: &mut (impl ServoPort + TimerPort),
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let result = match target {
            LidPosition::Open => self.lid.open(hw),
            LidPosition::Closed => self.lid.close(hw),
        };
        match result {
            Ok(()) => {
                sink.emit(&AppEvent::LidMoved(target));
                Ok(())
            }
            Err(e) => {
                error!("Lid {:?} failed: {}", target, e);
                Err(e)
            }
        }
    }

    fn set_authorized(
        &mut self,
        mac: MacAddr,
        radio: &mut impl RadioPort,
        store: &mut impl IdentifierStore,
        sink: &mut impl EventSink,
    ) {
        if mac == self.filter.authorized() {
            info!("Authorized MAC unchanged ({})", mac);
            return;
        }
        info!("Authorized MAC set to {}", mac);
        self.filter.set_authorized(mac);
        radio.set_address_filter(mac);
        // Samples from the previous tag say nothing about the new one.
        self.smoother = RssiSmoother::new(self.config.slew_delta_dbm);

        if let Err(e) = store.save_identifier(mac) {
            warn!("Failed to persist authorized MAC: {}", e);
        }
        sink.emit(&AppEvent::AuthorizedMacChanged(mac));
    }
}
