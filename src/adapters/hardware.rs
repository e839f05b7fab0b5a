//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the servo driver and a handle to the status board, and forwards
//! timer requests to whatever scheduler the runtime supplies. This is
//! the only module besides the radio adapter that touches actual
//! hardware. On non-espidf targets, the underlying drivers use
//! cfg-gated simulation stubs.

use core::time::Duration;

use crate::app::ports::{ServoPort, StatusPort, TimerPort};
use crate::drivers::servo::ServoDriver;
use crate::error::ActuatorError;
use crate::status::StatusBoard;

/// Concrete adapter that combines the feeder actuators behind port traits.
pub struct FeederHardware<T> {
    servo: ServoDriver,
    status: &'static StatusBoard,
    timers: T,
}

impl<T: TimerPort> FeederHardware<T> {
    pub fn new(servo: ServoDriver, status: &'static StatusBoard, timers: T) -> Self {
        Self {
            servo,
            status,
            timers,
        }
    }

    pub fn servo(&self) -> &ServoDriver {
        &self.servo
    }

    pub fn status(&self) -> &'static StatusBoard {
        self.status
    }
}

// ── ServoPort implementation ──────────────────────────────────

impl<T> ServoPort for FeederHardware<T> {
    fn set_duty(&mut self, duty: u32) -> Result<(), ActuatorError> {
        self.servo.set_duty(duty)
    }

    fn resume(&mut self) -> Result<(), ActuatorError> {
        self.servo.resume()
    }

    fn pause(&mut self) -> Result<(), ActuatorError> {
        self.servo.pause()
    }
}

// ── StatusPort implementation ─────────────────────────────────

impl<T> StatusPort for FeederHardware<T> {
    fn set_battery_low(&mut self, low: bool) {
        self.status.store_supply_low(low);
    }

    fn set_beacon_battery_low(&mut self, low: bool) {
        self.status.store_beacon_battery_low(low);
    }
}

// ── TimerPort implementation ──────────────────────────────────

impl<T: TimerPort> TimerPort for FeederHardware<T> {
    fn wake_loss_check(&mut self) {
        self.timers.wake_loss_check();
    }

    fn arm_power_save(&mut self, hold: Duration) {
        self.timers.arm_power_save(hold);
    }
}
