//! Presence debounce engine.
//!
//! Turns smoothed RSSI values into a stable present / not-present decision.
//! A sighting counts when the smoothed RSSI reaches the floor; the pet is
//! declared present once enough sightings accumulate, and declared gone
//! only after the counter decays to zero across missed loss checks.
//!
//! The loss-check loop itself lives in the runtime. This module only
//! decides how long the next wait is and what a finished wait means.

use log::{debug, info};

use crate::config::FeederConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    NotPresent,
    Present,
}

/// What a single accepted advertisement did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SightingOutcome {
    /// Smoothed RSSI was at or above the floor.
    pub qualified: bool,
    /// This sighting crossed the threshold and made the pet present.
    pub became_present: bool,
    /// The loss-check loop was parked and must be woken.
    pub wake_loss_check: bool,
}

/// Result of one finished loss-check wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossCheck {
    /// A qualifying sighting arrived during the wait.
    Refreshed,
    /// Nothing seen while present; the counter dropped but is still above
    /// zero.
    Decayed { sightings: u8, next_interval_ms: u32 },
    /// The counter reached zero; the pet is gone. The loop parks.
    Lost,
    /// Nothing seen while not present; the partial count is discarded and
    /// the loop parks.
    Cleared,
}

impl LossCheck {
    /// Whether the loop should park after this check.
    pub fn parks(self) -> bool {
        matches!(self, Self::Lost | Self::Cleared)
    }
}

/// Debounce state for the authorized beacon.
#[derive(Debug, Clone)]
pub struct PresenceEngine {
    state: PresenceState,
    sightings: u8,
    /// Total qualifying sightings, wrapping. Unlike `sightings` it keeps
    /// moving while the counter sits at its cap.
    seen_seq: u32,
    seq_at_arm: u32,
    interval_ms: u32,
    parked: bool,

    rssi_floor: f32,
    min_sightings: u8,
    max_sightings: u8,
    initial_ms: u32,
    step_ms: u32,
    floor_ms: u32,
}

impl PresenceEngine {
    pub fn new(config: &FeederConfig) -> Self {
        Self {
            state: PresenceState::NotPresent,
            sightings: 0,
            seen_seq: 0,
            seq_at_arm: 0,
            interval_ms: config.loss_check_initial_ms,
            parked: true,
            rssi_floor: f32::from(config.rssi_floor_dbm),
            min_sightings: config.min_sightings,
            max_sightings: config.max_sightings,
            initial_ms: config.loss_check_initial_ms,
            step_ms: config.loss_check_step_ms,
            floor_ms: config.loss_check_floor_ms,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> PresenceState {
        self.state
    }

    pub fn is_present(&self) -> bool {
        self.state == PresenceState::Present
    }

    pub fn sightings(&self) -> u8 {
        self.sightings
    }

    /// Wait before the next loss check.
    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn is_parked(&self) -> bool {
        self.parked
    }

    // ── Sighting path ─────────────────────────────────────────

    /// Feed one smoothed RSSI value.
    pub fn on_sighting(&mut self, smoothed_rssi: f32) -> SightingOutcome {
        if smoothed_rssi < self.rssi_floor {
            return SightingOutcome::default();
        }

        if self.sightings < self.max_sightings {
            self.sightings += 1;
        }
        self.seen_seq = self.seen_seq.wrapping_add(1);
        self.interval_ms = self.initial_ms;

        let mut out = SightingOutcome {
            qualified: true,
            ..SightingOutcome::default()
        };

        if self.state == PresenceState::NotPresent && self.sightings >= self.min_sightings {
            info!("Beacon detected ({} sightings)", self.sightings);
            self.state = PresenceState::Present;
            out.became_present = true;
        }

        if self.parked {
            self.parked = false;
            out.wake_loss_check = true;
        }
        debug!(
            "sighting at {:.2} dBm, count={} state={:?}",
            smoothed_rssi, self.sightings, self.state
        );
        out
    }

    // ── Loss-check path ───────────────────────────────────────

    /// Start a loss-check wait. Returns how long to wait (ms).
    pub fn arm_loss_check(&mut self) -> u32 {
        self.seq_at_arm = self.seen_seq;
        self.interval_ms
    }

    /// Evaluate a finished wait started by [`arm_loss_check`](Self::arm_loss_check).
    pub fn finish_loss_check(&mut self) -> LossCheck {
        // Compare sequence numbers, not `sightings`: at the cap a fresh
        // sighting leaves the counter unchanged and would read as a miss,
        // decaying a pet that is standing right at the feeder.
        if self.seen_seq != self.seq_at_arm {
            self.interval_ms = self.initial_ms;
            return LossCheck::Refreshed;
        }

        if self.state == PresenceState::NotPresent {
            self.sightings = 0;
            self.park();
            return LossCheck::Cleared;
        }

        self.sightings = self.sightings.saturating_sub(1);
        if self.sightings == 0 {
            info!("Beacon lost");
            self.state = PresenceState::NotPresent;
            self.park();
            return LossCheck::Lost;
        }

        self.interval_ms = self
            .interval_ms
            .saturating_sub(self.step_ms)
            .max(self.floor_ms);
        debug!(
            "beacon missed, count={} next check in {} ms",
            self.sightings, self.interval_ms
        );
        LossCheck::Decayed {
            sightings: self.sightings,
            next_interval_ms: self.interval_ms,
        }
    }

    fn park(&mut self) {
        self.parked = true;
        self.interval_ms = self.initial_ms;
    }
}
