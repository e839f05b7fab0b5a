//! Battery status flags and the red LED blink schedule derived from them.
//!
//! The detection core and the supply monitor write the flags through
//! [`StatusPort`]; the status loop reads them every cycle and plays the
//! matching [`BlinkPattern`].
//!
//! | Supply low | Beacon low | Pattern                                  |
//! |------------|------------|------------------------------------------|
//! | no         | no         | dark                                     |
//! | yes        | no         | two fast blinks (250 ms)                 |
//! | no         | yes        | one slow blink (1 s)                     |
//! | yes        | yes        | two fast blinks, 250 ms gap, one slow    |

use core::sync::atomic::{AtomicBool, Ordering};

use crate::app::ports::StatusPort;

/// Pause between two status cycles.
pub const STATUS_PERIOD_MS: u64 = 2000;

const FAST_MS: u32 = 250;
const SLOW_MS: u32 = 1000;

/// One segment of a blink schedule: red LED level held for `ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkStep {
    pub red_on: bool,
    pub ms: u32,
}

const fn on(ms: u32) -> BlinkStep {
    BlinkStep { red_on: true, ms }
}

const fn off(ms: u32) -> BlinkStep {
    BlinkStep { red_on: false, ms }
}

const FAST_TWICE: &[BlinkStep] = &[on(FAST_MS), off(FAST_MS), on(FAST_MS), off(0)];
const SLOW_ONCE: &[BlinkStep] = &[on(SLOW_MS), off(0)];
const FAST_TWICE_THEN_SLOW: &[BlinkStep] = &[
    on(FAST_MS),
    off(FAST_MS),
    on(FAST_MS),
    off(FAST_MS),
    on(SLOW_MS),
    off(0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkPattern {
    Dark,
    SupplyLow,
    BeaconBatteryLow,
    BothLow,
}

impl BlinkPattern {
    pub fn steps(self) -> &'static [BlinkStep] {
        match self {
            Self::Dark => &[],
            Self::SupplyLow => FAST_TWICE,
            Self::BeaconBatteryLow => SLOW_ONCE,
            Self::BothLow => FAST_TWICE_THEN_SLOW,
        }
    }
}

/// Lock-free battery flags shared between the detection core and the
/// status loop.
pub struct StatusBoard {
    supply_low: AtomicBool,
    beacon_battery_low: AtomicBool,
}

impl StatusBoard {
    pub const fn new() -> Self {
        Self {
            supply_low: AtomicBool::new(false),
            beacon_battery_low: AtomicBool::new(false),
        }
    }

    pub fn supply_low(&self) -> bool {
        self.supply_low.load(Ordering::Acquire)
    }

    pub fn beacon_battery_low(&self) -> bool {
        self.beacon_battery_low.load(Ordering::Acquire)
    }

    pub fn store_supply_low(&self, low: bool) {
        self.supply_low.store(low, Ordering::Release);
    }

    pub fn store_beacon_battery_low(&self, low: bool) {
        self.beacon_battery_low.store(low, Ordering::Release);
    }

    pub fn pattern(&self) -> BlinkPattern {
        match (self.supply_low(), self.beacon_battery_low()) {
            (false, false) => BlinkPattern::Dark,
            (true, false) => BlinkPattern::SupplyLow,
            (false, true) => BlinkPattern::BeaconBatteryLow,
            (true, true) => BlinkPattern::BothLow,
        }
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide board read by the status loop.
pub static STATUS: StatusBoard = StatusBoard::new();

impl StatusPort for &StatusBoard {
    fn set_battery_low(&mut self, low: bool) {
        self.store_supply_low(low);
    }

    fn set_beacon_battery_low(&mut self, low: bool) {
        self.store_beacon_battery_low(low);
    }
}
