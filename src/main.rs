//! PetFeeder Firmware: Main Entry Point
//!
//! Opens the feeder lid while the authorized collar beacon is close and
//! closes it once the beacon is gone.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BleScanner    FeederHardware        NvsAdapter   LogEventSink │
//! │  (RadioPort)   (Servo+Status+Timer)  (Config+NVS) (EventSink)  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            DetectionService (pure logic)               │    │
//! │  │  Scan FSM · Filter · Smoother · Presence · Lid         │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  runtime: one executor thread (dispatch, loss check,           │
//! │           power save, supply, status)                          │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::time::Duration;

use anyhow::Result;
use log::{info, warn};

use petfeeder::adapters::hardware::FeederHardware;
use petfeeder::adapters::log_sink::LogEventSink;
use petfeeder::adapters::nvs::NvsAdapter;
use petfeeder::adapters::radio::BleScanner;
use petfeeder::adapters::restart::restart_after;
use petfeeder::app::commands::AppCommand;
use petfeeder::app::ports::{ConfigError, ConfigPort, IdentifierStore};
use petfeeder::app::service::DetectionService;
use petfeeder::beacon::MacAddr;
use petfeeder::config::{provisioned_beacon, FeederConfig};
use petfeeder::drivers::hw_init;
use petfeeder::drivers::servo::ServoDriver;
use petfeeder::drivers::status_led::StatusLeds;
use petfeeder::error::Error;
use petfeeder::runtime::{self, Controller, SignalTimers};
use petfeeder::sensors::vcc::VccMonitor;
use petfeeder::status::STATUS;

/// Delay used before the configuration is known.
const BOOT_RESTART_DELAY: Duration = Duration::from_secs(3);

/// Restart on a fatal boot error. Returns only on host builds.
#[allow(unreachable_code)]
fn fatal(cause: Error, delay: Duration) -> anyhow::Error {
    restart_after(&cause, delay);
    anyhow::Error::new(cause)
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PetFeeder v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Persistent storage ─────────────────────────────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            log::error!("NVS init failed: {}", e);
            return Err(fatal(Error::Init("nvs"), BOOT_RESTART_DELAY));
        }
    };

    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(ConfigError::IoError) => {
            warn!("Config unreadable, using defaults");
            FeederConfig::default()
        }
        Err(e) => {
            warn!("Stored config unusable ({}), rewriting defaults", e);
            let defaults = FeederConfig::default();
            if let Err(e) = nvs.save(&defaults) {
                warn!("Config repair failed: {}", e);
            }
            defaults
        }
    };
    match serde_json::to_string(&config) {
        Ok(json) => info!("Config: {}", json),
        Err(e) => warn!("Config not printable: {}", e),
    }
    let restart_delay = Duration::from_secs(u64::from(config.restart_delay_secs));

    let authorized = match nvs.load_identifier() {
        Ok(Some(mac)) => {
            info!("Authorized beacon: {}", mac);
            mac
        }
        Ok(None) => match provisioned_beacon() {
            Some(mac) => {
                info!("Authorized beacon (provisioned): {}", mac);
                if let Err(e) = nvs.save_identifier(mac) {
                    warn!("Could not store provisioned beacon ({})", e);
                }
                mac
            }
            None => MacAddr::UNSET,
        },
        Err(e) => {
            warn!("Stored beacon address unreadable ({})", e);
            MacAddr::UNSET
        }
    };

    // ── 3. Peripherals ────────────────────────────────────────
    if let Err(e) = hw_init::init_peripherals(config.lid_closed_duty) {
        log::error!("HAL init failed: {}", e);
        return Err(fatal(e.into(), restart_delay));
    }
    let mut leds = StatusLeds::new();
    leds.all_off();

    // ── 4. Detection runtime ──────────────────────────────────
    let hw = FeederHardware::new(ServoDriver::new(config.lid_closed_duty), &STATUS, SignalTimers);
    let ctl = Controller {
        service: DetectionService::new(config, authorized),
        radio: BleScanner::new(),
        hw,
        store: nvs,
        sink: LogEventSink::new(),
    };

    let handle = match runtime::spawn(ctl, leds, VccMonitor::new()) {
        Ok(h) => h,
        Err(e) => {
            log::error!("Failed to spawn detection thread: {}", e);
            return Err(fatal(Error::Init("detect thread"), restart_delay));
        }
    };

    runtime::send_command(AppCommand::StartScan);
    info!("Boot complete, scanning for beacon");

    // The detection thread restarts the device on a fatal error, so
    // returning from join means it panicked.
    if handle.join().is_err() {
        return Err(fatal(Error::Init("detect thread panicked"), restart_delay));
    }
    Ok(())
}
