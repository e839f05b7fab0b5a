//! System configuration parameters
//!
//! All tunable parameters for the presence detector and lid actuator.
//! Thresholds are configuration rather than law: the debounce constants
//! were tuned on one collar tag and one feeder enclosure.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::beacon::MacAddr;

/// Authorized beacon baked in at build time, used until one is stored.
const PROVISIONED_BEACON: Option<&str> = option_env!("PETFEEDER_BEACON_MAC");

/// The build-time beacon address, if one was provided and parses.
pub fn provisioned_beacon() -> Option<MacAddr> {
    parse_provisioned(PROVISIONED_BEACON)
}

/// Parse a provisioned address. Blank, malformed and all-zero values
/// yield `None`; malformed ones are logged.
pub fn parse_provisioned(raw: Option<&str>) -> Option<MacAddr> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<MacAddr>() {
        Ok(mac) if mac.is_unset() => None,
        Ok(mac) => Some(mac),
        Err(e) => {
            warn!("Ignoring provisioned beacon {:?}: {}", raw, e);
            None
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeederConfig {
    // --- Detection ---
    /// Smoothed RSSI at or above which a sighting counts (dBm)
    pub rssi_floor_dbm: i8,
    /// Sightings needed before the pet is declared present
    pub min_sightings: u8,
    /// Upper bound of the sightings counter
    pub max_sightings: u8,
    /// Maximum change of the smoothed RSSI per accepted sample (dBm)
    pub slew_delta_dbm: u8,

    // --- Loss check ---
    /// Wait before the first loss check, and after every reset (ms)
    pub loss_check_initial_ms: u32,
    /// Interval reduction per missed check while present (ms)
    pub loss_check_step_ms: u32,
    /// The interval never shrinks below this (ms)
    pub loss_check_floor_ms: u32,

    // --- Lid servo ---
    /// LEDC duty (20-bit, 50 Hz) for the open position
    pub lid_open_duty: u32,
    /// LEDC duty (20-bit, 50 Hz) for the closed position
    pub lid_closed_duty: u32,
    /// Drive time before the servo timer is paused again (ms)
    pub servo_hold_ms: u32,

    // --- Batteries ---
    /// Beacon telemetry battery level below which the tag is flagged (mV)
    pub beacon_battery_low_mv: u16,
    /// Averaged supply voltage below which the feeder is flagged (mV)
    pub supply_low_mv: u16,
    /// Supply voltage sampling period (seconds)
    pub supply_sample_interval_secs: u32,

    // --- Fatal error policy ---
    /// Delay between a fatal error and the restart (seconds)
    pub restart_delay_secs: u32,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            // Detection
            rssi_floor_dbm: -48,
            min_sightings: 3,
            max_sightings: 4,
            slew_delta_dbm: 2,

            // Loss check
            loss_check_initial_ms: 1000,
            loss_check_step_ms: 500,
            loss_check_floor_ms: 750,

            // Lid servo
            lid_open_duty: 78_000,   // ~1.5 ms pulse
            lid_closed_duty: 26_214, // 0.5 ms pulse
            servo_hold_ms: 500,

            // Batteries
            beacon_battery_low_mv: 3000,
            supply_low_mv: 2500,
            supply_sample_interval_secs: 10,

            restart_delay_secs: 3,
        }
    }
}

impl FeederConfig {
    /// Range-check the configuration. Invalid values are rejected, not
    /// clamped.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.min_sightings == 0 {
            return Err("min_sightings must be at least 1");
        }
        if self.max_sightings < self.min_sightings {
            return Err("max_sightings must be >= min_sightings");
        }
        if self.loss_check_initial_ms == 0 {
            return Err("loss_check_initial_ms must be non-zero");
        }
        if self.loss_check_floor_ms == 0 || self.loss_check_floor_ms > self.loss_check_initial_ms {
            return Err("loss_check_floor_ms must be 1..=loss_check_initial_ms");
        }
        if self.servo_hold_ms == 0 {
            return Err("servo_hold_ms must be non-zero");
        }
        if self.lid_open_duty == self.lid_closed_duty {
            return Err("lid_open_duty and lid_closed_duty must differ");
        }
        if self.lid_open_duty >= 1 << 20 || self.lid_closed_duty >= 1 << 20 {
            return Err("lid duties must fit the 20-bit LEDC resolution");
        }
        Ok(())
    }
}
