//! GPIO / peripheral pin assignments for the feeder board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Lid servo
// ---------------------------------------------------------------------------

/// LEDC PWM output to the servo signal line.
pub const SERVO_PWM_GPIO: i32 = 5;
/// Standard hobby-servo frame rate.
pub const SERVO_PWM_FREQ_HZ: u32 = 50;
/// Duty resolution of the servo timer (bits). 2^20 counts per 20 ms frame.
pub const SERVO_DUTY_RESOLUTION_BITS: u32 = 20;

// ---------------------------------------------------------------------------
// Status LEDs (active HIGH)
// ---------------------------------------------------------------------------

pub const RED_LED_GPIO: i32 = 4;
pub const BLUE_LED_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// Supply voltage sense (ADC1)
// ---------------------------------------------------------------------------

/// ADC1 channel 0 (GPIO 36 on the ESP32), 12 dB attenuation.
pub const VCC_ADC_CHANNEL: u32 = 0;
/// Full-scale reading used when no calibration scheme is available.
pub const VCC_ADC_FULL_SCALE_MV: u32 = 3300;
/// 12-bit ADC maximum count.
pub const VCC_ADC_MAX_RAW: u32 = 4095;
