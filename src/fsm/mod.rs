//! BLE scan lifecycle state machine.
//!
//! ```text
//!  state          start                   stop
//!  ─────────────  ──────────────────────  ───────────────────
//!  Uninitialized  Initializing (BringUp)  warn
//!  Initializing   ignored                 StopPending
//!  Off            Starting (StartScan)    ignored
//!  Starting       ignored                 StopPending
//!  On             ignored                 Stopping (StopScan)
//!  Stopping       StartPending            ignored
//!  StartPending   ignored                 Stopping
//!  StopPending    Off                     ignored
//! ```
//!
//! The machine is a pure transition function: [`ScanFsm::handle`] takes a
//! request or a hardware completion and returns the hardware action the
//! caller must issue. The controller performs the action through its
//! radio port and feeds synchronous failures back as failed completions.
//!
//! Pending states remember the most recent intent while a hardware
//! operation is in flight, so once every completion has been delivered the
//! machine rests in the state the latest request asked for.

use log::{error, info, warn};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanState {
    Uninitialized,
    Initializing,
    Off,
    Starting,
    On,
    Stopping,
    StartPending,
    StopPending,
}

impl ScanState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninit",
            Self::Initializing => "initializing",
            Self::Off => "off",
            Self::Starting => "starting",
            Self::On => "on",
            Self::Stopping => "stopping",
            Self::StartPending => "start_pending",
            Self::StopPending => "stop_pending",
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Raw status code reported by a failed hardware operation.
pub type HwStatus = i32;

/// Requests and hardware completions consumed by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanInput {
    Start,
    Stop,
    /// Scan-parameter configuration finished (last step of bring-up).
    ParamsConfigured(Result<(), HwStatus>),
    ScanStarted(Result<(), HwStatus>),
    ScanStopped(Result<(), HwStatus>),
}

/// Completion reported by the radio for an operation it accepted earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanCompletion {
    ParamsConfigured(Result<(), HwStatus>),
    Started(Result<(), HwStatus>),
    Stopped(Result<(), HwStatus>),
}

impl From<ScanCompletion> for ScanInput {
    fn from(c: ScanCompletion) -> Self {
        match c {
            ScanCompletion::ParamsConfigured(r) => Self::ParamsConfigured(r),
            ScanCompletion::Started(r) => Self::ScanStarted(r),
            ScanCompletion::Stopped(r) => Self::ScanStopped(r),
        }
    }
}

/// Hardware action the caller must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAction {
    /// Bring up the controller and host stack, then configure scan
    /// parameters. Completes with [`ScanInput::ParamsConfigured`].
    BringUp,
    /// Completes with [`ScanInput::ScanStarted`].
    StartScan,
    /// Completes with [`ScanInput::ScanStopped`].
    StopScan,
}

/// How an input was disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// State changed (or an intent was recorded).
    Applied,
    /// Request had no effect in the current state.
    Ignored,
    /// A completion reported failure; the state reverted.
    Failed(HwStatus),
    /// A completion arrived with no matching operation in flight.
    Unexpected,
}

/// Result of one [`ScanFsm::handle`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStep {
    pub from: ScanState,
    pub to: ScanState,
    pub action: Option<ScanAction>,
    pub kind: StepKind,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    BringUp,
    Start,
    Stop,
}

/// Scan lifecycle machine. Tracks the visible state plus the hardware
/// operation currently in flight, if any.
#[derive(Debug, Clone)]
pub struct ScanFsm {
    state: ScanState,
    in_flight: Option<InFlight>,
}

impl Default for ScanFsm {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanFsm {
    pub const fn new() -> Self {
        Self {
            state: ScanState::Uninitialized,
            in_flight: None,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Whether a hardware completion is still outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Apply one input and return the resulting step.
    pub fn handle(&mut self, input: ScanInput) -> ScanStep {
        let from = self.state;
        let (action, kind) = match input {
            ScanInput::Start => self.on_start(),
            ScanInput::Stop => self.on_stop(),
            ScanInput::ParamsConfigured(status) => self.on_params_configured(status),
            ScanInput::ScanStarted(status) => self.on_scan_started(status),
            ScanInput::ScanStopped(status) => self.on_scan_stopped(status),
        };
        if from != self.state {
            info!("BLE scan: {} -> {}", from.name(), self.state.name());
        }
        ScanStep {
            from,
            to: self.state,
            action,
            kind,
        }
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    fn on_start(&mut self) -> (Option<ScanAction>, StepKind) {
        match (self.state, self.in_flight) {
            (ScanState::Uninitialized, _) => {
                self.state = ScanState::Initializing;
                self.in_flight = Some(InFlight::BringUp);
                (Some(ScanAction::BringUp), StepKind::Applied)
            }
            (ScanState::Off, None) => {
                self.state = ScanState::Starting;
                self.in_flight = Some(InFlight::Start);
                (Some(ScanAction::StartScan), StepKind::Applied)
            }
            // A cancelled stop left the bring-up or start running; it
            // will finish the job on its own.
            (ScanState::Off, Some(InFlight::BringUp)) => {
                self.state = ScanState::Initializing;
                (None, StepKind::Applied)
            }
            (ScanState::Off, Some(_)) => {
                self.state = ScanState::Starting;
                (None, StepKind::Applied)
            }
            (ScanState::Stopping, _) => {
                self.state = ScanState::StartPending;
                (None, StepKind::Applied)
            }
            (ScanState::StopPending, _) => {
                info!("BLE scan stop already pending, not starting scan");
                self.state = ScanState::Off;
                (None, StepKind::Applied)
            }
            (s, _) => {
                info!("Cannot start BLE scan right now, scan_status={}", s.name());
                (None, StepKind::Ignored)
            }
        }
    }

    fn on_stop(&mut self) -> (Option<ScanAction>, StepKind) {
        match (self.state, self.in_flight) {
            (ScanState::On, _) => {
                self.state = ScanState::Stopping;
                self.in_flight = Some(InFlight::Stop);
                (Some(ScanAction::StopScan), StepKind::Applied)
            }
            (ScanState::Starting | ScanState::Initializing, _)
            | (ScanState::Off, Some(InFlight::BringUp | InFlight::Start)) => {
                self.state = ScanState::StopPending;
                (None, StepKind::Applied)
            }
            (ScanState::StartPending, _) => {
                self.state = ScanState::Stopping;
                (None, StepKind::Applied)
            }
            (ScanState::Uninitialized, _) => {
                warn!("BLE scan is not initialized yet");
                (None, StepKind::Ignored)
            }
            (s, _) => {
                info!("Cannot stop BLE scan right now, scan_status={}", s.name());
                (None, StepKind::Ignored)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Completions
    // -----------------------------------------------------------------------

    fn on_params_configured(
        &mut self,
        status: Result<(), HwStatus>,
    ) -> (Option<ScanAction>, StepKind) {
        if self.in_flight != Some(InFlight::BringUp) {
            warn!("Unexpected scan-params completion in {}", self.state.name());
            return (None, StepKind::Unexpected);
        }
        self.in_flight = None;

        if let Err(rc) = status {
            error!("BLE scan parameters setting failed (rc={rc})");
            self.state = ScanState::Uninitialized;
            return (None, StepKind::Failed(rc));
        }

        if self.state != ScanState::StopPending {
            self.state = ScanState::Off;
        }
        // Start right away; from StopPending this just settles in Off.
        self.on_start()
    }

    fn on_scan_started(&mut self, status: Result<(), HwStatus>) -> (Option<ScanAction>, StepKind) {
        if self.in_flight != Some(InFlight::Start) {
            warn!("Unexpected scan-start completion in {}", self.state.name());
            return (None, StepKind::Unexpected);
        }
        self.in_flight = None;

        if let Err(rc) = status {
            error!("BLE scan start failed (rc={rc})");
            self.state = ScanState::Off;
            return (None, StepKind::Failed(rc));
        }

        let stop_requested = self.state == ScanState::StopPending;
        self.state = ScanState::On;
        if stop_requested {
            return self.on_stop();
        }
        (None, StepKind::Applied)
    }

    fn on_scan_stopped(&mut self, status: Result<(), HwStatus>) -> (Option<ScanAction>, StepKind) {
        if self.in_flight != Some(InFlight::Stop) {
            warn!("Unexpected scan-stop completion in {}", self.state.name());
            return (None, StepKind::Unexpected);
        }
        self.in_flight = None;

        if let Err(rc) = status {
            error!("BLE scan stop failed (rc={rc})");
            self.state = ScanState::On;
            return (None, StepKind::Failed(rc));
        }

        let start_requested = self.state == ScanState::StartPending;
        self.state = ScanState::Off;
        if start_requested {
            return self.on_start();
        }
        (None, StepKind::Applied)
    }
}
