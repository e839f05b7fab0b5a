//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::ScanStateChanged { from, to } => {
                info!("SCAN  | {} -> {}", from.name(), to.name());
            }
            AppEvent::PresenceChanged(state) => {
                info!("PET   | {:?}", state);
            }
            AppEvent::LidMoved(pos) => {
                info!("LID   | {:?}", pos);
            }
            AppEvent::BeaconTelemetry(t) => {
                info!(
                    "TAG   | battery={}mV T={:.2}\u{00b0}C",
                    t.battery_mv,
                    t.temperature_c()
                );
            }
            AppEvent::AuthorizedMacChanged(mac) => {
                info!("AUTH  | beacon {}", mac);
            }
            AppEvent::SupplyVoltage { avg_mv, low: false } => {
                info!("VCC   | avg={}mV", avg_mv);
            }
            AppEvent::SupplyVoltage { avg_mv, low: true } => {
                warn!("VCC   | avg={}mV (low)", avg_mv);
            }
        }
    }
}
