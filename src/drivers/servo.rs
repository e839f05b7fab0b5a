//! Lid servo PWM driver.
//!
//! One LEDC channel at 50 Hz with 20-bit duty resolution. The timer is
//! paused between moves so the servo stops drawing holding current.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: raw `ledc_*` calls on the channel set up by hw_init.
//! On host/test: tracks duty and run state in memory only.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::error::ActuatorError;

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init::{LEDC_CH_SERVO, LEDC_TIMER_SERVO};

pub struct ServoDriver {
    duty: u32,
    running: bool,
}

impl ServoDriver {
    /// Wrap the channel configured by `hw_init`. The timer starts paused.
    pub fn new(initial_duty: u32) -> Self {
        Self {
            duty: initial_duty,
            running: false,
        }
    }

    pub fn duty(&self) -> u32 {
        self.duty
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    #[cfg(target_os = "espidf")]
    pub fn set_duty(&mut self, duty: u32) -> Result<(), ActuatorError> {
        // SAFETY: the channel was configured in hw_init; only the runtime
        // thread drives it.
        unsafe {
            if ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, LEDC_CH_SERVO, duty) != ESP_OK as i32
            {
                return Err(ActuatorError::DutyWriteFailed);
            }
            if ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, LEDC_CH_SERVO) != ESP_OK as i32 {
                return Err(ActuatorError::DutyWriteFailed);
            }
        }
        self.duty = duty;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    pub fn resume(&mut self) -> Result<(), ActuatorError> {
        // SAFETY: see set_duty.
        let ret = unsafe { ledc_timer_resume(ledc_mode_t_LEDC_LOW_SPEED_MODE, LEDC_TIMER_SERVO) };
        if ret != ESP_OK as i32 {
            return Err(ActuatorError::ResumeFailed);
        }
        self.running = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    pub fn pause(&mut self) -> Result<(), ActuatorError> {
        // SAFETY: see set_duty.
        let ret = unsafe { ledc_timer_pause(ledc_mode_t_LEDC_LOW_SPEED_MODE, LEDC_TIMER_SERVO) };
        if ret != ESP_OK as i32 {
            return Err(ActuatorError::PauseFailed);
        }
        self.running = false;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn set_duty(&mut self, duty: u32) -> Result<(), ActuatorError> {
        if duty >= 1 << crate::pins::SERVO_DUTY_RESOLUTION_BITS {
            return Err(ActuatorError::DutyWriteFailed);
        }
        self.duty = duty;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn resume(&mut self) -> Result<(), ActuatorError> {
        self.running = true;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn pause(&mut self) -> Result<(), ActuatorError> {
        self.running = false;
        Ok(())
    }
}
