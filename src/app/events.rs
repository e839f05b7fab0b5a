//! Outbound application events.
//!
//! The [`DetectionService`](super::service::DetectionService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them; in firmware they become
//! log lines.

use crate::beacon::{MacAddr, Telemetry};
use crate::fsm::ScanState;
use crate::lid::LidPosition;
use crate::presence::PresenceState;

/// Structured events emitted by the detection core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The scan lifecycle machine changed state.
    ScanStateChanged { from: ScanState, to: ScanState },

    /// The pet arrived or left.
    PresenceChanged(PresenceState),

    /// The lid was driven to a new position.
    LidMoved(LidPosition),

    /// Telemetry read from an accepted beacon frame.
    BeaconTelemetry(Telemetry),

    /// A new authorized address took effect.
    AuthorizedMacChanged(MacAddr),

    /// The feeder supply average crossed the low threshold.
    SupplyVoltage { avg_mv: u16, low: bool },
}
