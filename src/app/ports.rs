//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DetectionService (domain)
//! ```
//!
//! Driven adapters (radio, servo, status LEDs, timers, storage) implement
//! these traits. The [`DetectionService`](super::service::DetectionService)
//! consumes them via generics, so the domain core never touches hardware
//! directly.

use crate::beacon::MacAddr;
use crate::config::FeederConfig;
use crate::error::{ActuatorError, RadioError};
use core::time::Duration;

// ───────────────────────────────────────────────────────────────
// Radio port (domain → BLE controller)
// ───────────────────────────────────────────────────────────────

/// Issues scan lifecycle requests to the radio. Every call only starts
/// the operation; its outcome arrives later as a completion message.
/// An `Err` means the request was rejected synchronously and no
/// completion will follow.
pub trait RadioPort {
    /// Bring up controller and host stack, register the GAP callback and
    /// submit the scan parameters.
    fn bring_up(&mut self) -> Result<(), RadioError>;

    fn start_scan(&mut self) -> Result<(), RadioError>;

    fn stop_scan(&mut self) -> Result<(), RadioError>;

    /// Address whose scan results are worth delivering. Results from any
    /// other address may be discarded before they reach the service.
    fn set_address_filter(&mut self, mac: MacAddr);
}

// ───────────────────────────────────────────────────────────────
// Servo port (domain → lid PWM)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the lid servo's PWM channel.
pub trait ServoPort {
    /// Write a raw duty value (20-bit resolution at 50 Hz).
    fn set_duty(&mut self, duty: u32) -> Result<(), ActuatorError>;

    /// Resume the PWM timer so the servo is driven.
    fn resume(&mut self) -> Result<(), ActuatorError>;

    /// Pause the PWM timer. The servo holds position unpowered.
    fn pause(&mut self) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Status port (domain → status LEDs)
// ───────────────────────────────────────────────────────────────

pub trait StatusPort {
    /// Feeder supply voltage is low.
    fn set_battery_low(&mut self, low: bool);

    /// The collar tag reports a low battery.
    fn set_beacon_battery_low(&mut self, low: bool);
}

// ───────────────────────────────────────────────────────────────
// Timer port (domain → runtime background loops)
// ───────────────────────────────────────────────────────────────

/// Wakes the runtime's background loops. Both calls only signal; the
/// loops run on the executor after the current handler returns.
pub trait TimerPort {
    /// Unpark the loss-check loop.
    fn wake_loss_check(&mut self);

    /// (Re-)arm the servo power-save timer. A new arm restarts the wait.
    fn arm_power_save(&mut self, hold: Duration);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`FeederConfig`].
///
/// Implementations MUST validate before persisting. Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Returns [`FeederConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<FeederConfig, ConfigError>;

    fn save(&self, config: &FeederConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// Keys are namespaced to prevent collisions between subsystems. Writes
/// MUST be atomic: the ESP-IDF NVS API guarantees this natively.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Authorized identifier persistence
// ───────────────────────────────────────────────────────────────

pub const IDENTIFIER_NAMESPACE: &str = "nvs_main";
pub const IDENTIFIER_KEY: &str = "auth_mac";

/// Persisted authorized beacon address: a raw 6-byte blob.
pub trait IdentifierStore {
    /// `Ok(None)` when nothing has been stored yet.
    fn load_identifier(&self) -> Result<Option<MacAddr>, StorageError>;

    /// Storing [`MacAddr::UNSET`] erases the key instead.
    fn save_identifier(&mut self, mac: MacAddr) -> Result<(), StorageError>;
}

impl<T: StoragePort> IdentifierStore for T {
    fn load_identifier(&self) -> Result<Option<MacAddr>, StorageError> {
        let mut buf = [0u8; 6];
        match self.read(IDENTIFIER_NAMESPACE, IDENTIFIER_KEY, &mut buf) {
            Ok(6) => Ok(Some(MacAddr(buf))),
            Ok(_) => Err(StorageError::Corrupted),
            Err(StorageError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save_identifier(&mut self, mac: MacAddr) -> Result<(), StorageError> {
        if mac.is_unset() {
            return self.delete(IDENTIFIER_NAMESPACE, IDENTIFIER_KEY);
        }
        self.write(IDENTIFIER_NAMESPACE, IDENTIFIER_KEY, &mac.octets())
    }
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Stored value has the wrong size or shape.
    Corrupted,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Corrupted => write!(f, "stored value corrupted"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}
