//! Advertisement filter.
//!
//! Accepts only discovery results from the authorized address whose
//! payload is an Eddystone-TLM frame. Everything else is dropped with a
//! trace line; rejection is the normal case in a busy radio environment.

use log::trace;

use super::{AdvKind, AdvRecord, MacAddr, Telemetry};

/// Flags AD, 16-bit service UUID list (0xFEAA), service data header for
/// Eddystone with frame type 0x20 (TLM).
pub const EDDYSTONE_TLM_HEADER: [u8; 12] = [
    0x02, 0x01, 0x06, 0x03, 0x03, 0xaa, 0xfe, 0x11, 0x16, 0xaa, 0xfe, 0x20,
];

const BATTERY_OFFSET: usize = 13;
const TEMP_OFFSET: usize = 15;
const TEMP_FRAC_OFFSET: usize = 16;

/// Result of accepting a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub rssi: i8,
    /// `None` when the frame ends before the telemetry fields.
    pub telemetry: Option<Telemetry>,
}

/// Pattern-matches advertisement records against the authorized beacon.
#[derive(Debug, Clone)]
pub struct AdvertisementFilter {
    authorized: MacAddr,
}

impl AdvertisementFilter {
    pub fn new(authorized: MacAddr) -> Self {
        Self { authorized }
    }

    pub fn authorized(&self) -> MacAddr {
        self.authorized
    }

    pub fn set_authorized(&mut self, mac: MacAddr) {
        self.authorized = mac;
    }

    /// Returns `Some` iff the record came from the authorized beacon and
    /// carries an Eddystone-TLM frame.
    pub fn accept(&self, record: &AdvRecord) -> Option<Accepted> {
        if record.kind != AdvKind::Discovery {
            return None;
        }
        if record.address != self.authorized {
            trace!("adv from {} ignored (not authorized)", record.address);
            return None;
        }
        if !record.payload.starts_with(&EDDYSTONE_TLM_HEADER) {
            trace!("adv from {} ignored (not Eddystone-TLM)", record.address);
            return None;
        }

        Some(Accepted {
            rssi: record.rssi,
            telemetry: parse_telemetry(&record.payload),
        })
    }
}

fn parse_telemetry(payload: &[u8]) -> Option<Telemetry> {
    if payload.len() <= TEMP_FRAC_OFFSET {
        return None;
    }
    Some(Telemetry {
        battery_mv: u16::from_be_bytes([payload[BATTERY_OFFSET], payload[BATTERY_OFFSET + 1]]),
        temp_c: payload[TEMP_OFFSET] as i8,
        temp_frac: payload[TEMP_FRAC_OFFSET],
    })
}
