//! Lid actuator controller.
//!
//! Drives the servo to the open or closed duty, resumes the PWM timer and
//! arms the power-save timer that pauses it again once the servo has had
//! time to reach position. Re-driving an already reached position is
//! allowed; it rewrites the duty and re-arms the timer.

use core::time::Duration;

use log::{info, warn};

use crate::app::ports::{ServoPort, TimerPort};
use crate::config::FeederConfig;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LidPosition {
    Closed,
    Open,
}

#[derive(Debug, Clone)]
pub struct LidController {
    position: LidPosition,
    open_duty: u32,
    closed_duty: u32,
    hold: Duration,
}

impl LidController {
    /// The lid is assumed closed at power-on.
    pub fn new(config: &FeederConfig) -> Self {
        Self {
            position: LidPosition::Closed,
            open_duty: config.lid_open_duty,
            closed_duty: config.lid_closed_duty,
            hold: Duration::from_millis(u64::from(config.servo_hold_ms)),
        }
    }

    pub fn position(&self) -> LidPosition {
        self.position
    }

    /// `hw` provides both the PWM channel and the power-save timer; one
    /// parameter avoids a double mutable borrow of the same adapter.
    pub fn open(&mut self, hw: &mut (impl ServoPort + TimerPort)) -> Result<()> {
        self.drive(LidPosition::Open, hw)
    }

    pub fn close(&mut self, hw: &mut (impl ServoPort + TimerPort)) -> Result<()> {
        self.drive(LidPosition::Closed, hw)
    }

    /// Power-save timer expired: stop driving the servo.
    pub fn release(&mut self, servo: &mut impl ServoPort) -> Result<()> {
        servo.pause().inspect_err(|e| warn!("servo pause failed: {e}"))?;
        Ok(())
    }

    fn drive(&mut self, target: LidPosition, hw: &mut (impl ServoPort + TimerPort)) -> Result<()> {
        let duty = match target {
            LidPosition::Open => self.open_duty,
            LidPosition::Closed => self.closed_duty,
        };
        hw.set_duty(duty)?;
        hw.resume()?;
        hw.arm_power_save(self.hold);

        if self.position != target {
            info!("Lid {:?} -> {:?} (duty={})", self.position, target, duty);
        }
        self.position = target;
        Ok(())
    }
}
