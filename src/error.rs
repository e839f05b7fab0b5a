//! Unified error types for the PetFeeder firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! bootstrap path's error handling uniform. All variants are `Copy` so they
//! can be returned from the radio callback path without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the detection core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The BLE receiver could not be brought up or commanded.
    Radio(RadioError),
    /// A lid servo command failed.
    Actuator(ActuatorError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Radio(e) => write!(f, "radio: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Fatal errors end the detection thread and trigger a restart.
    /// Actuator failures are reported and detection carries on.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Actuator(_))
    }
}

// ---------------------------------------------------------------------------
// Radio errors
// ---------------------------------------------------------------------------

/// Failures of the BLE receiver. The `i32` payloads carry the raw
/// ESP-IDF status code where one exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// Controller / host stack bring-up failed.
    BringUpFailed(i32),
    /// Scan parameters were rejected.
    ParamsRejected(i32),
    /// The scan start request failed (synchronously or on completion).
    StartFailed(i32),
    /// The scan stop request failed (synchronously or on completion).
    StopFailed(i32),
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BringUpFailed(rc) => write!(f, "BLE bring-up failed (rc={rc})"),
            Self::ParamsRejected(rc) => write!(f, "scan parameters rejected (rc={rc})"),
            Self::StartFailed(rc) => write!(f, "scan start failed (rc={rc})"),
            Self::StopFailed(rc) => write!(f, "scan stop failed (rc={rc})"),
        }
    }
}

impl RadioError {
    /// Raw ESP-IDF status code carried by the error.
    pub fn code(self) -> i32 {
        match self {
            Self::BringUpFailed(rc)
            | Self::ParamsRejected(rc)
            | Self::StartFailed(rc)
            | Self::StopFailed(rc) => rc,
        }
    }
}

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// LEDC duty write or update failed.
    DutyWriteFailed,
    /// LEDC timer resume failed.
    ResumeFailed,
    /// LEDC timer pause failed.
    PauseFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DutyWriteFailed => write!(f, "PWM duty write failed"),
            Self::ResumeFailed => write!(f, "PWM timer resume failed"),
            Self::PauseFailed => write!(f, "PWM timer pause failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
