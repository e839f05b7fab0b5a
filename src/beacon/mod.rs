//! Beacon advertisement domain types.
//!
//! The radio adapter translates every Bluedroid scan result into an
//! [`AdvRecord`]; the [`filter`] decides whether it came from the
//! authorized collar tag and the [`smoother`] turns the accepted RSSI
//! stream into a stable signal for the presence engine.

pub mod filter;
pub mod smoother;

use core::fmt;
use core::str::FromStr;

use heapless::Vec;
use serde::{Deserialize, Serialize};

/// Largest payload a scan result can carry (advertisement + scan response).
pub const MAX_ADV_PAYLOAD: usize = 62;

// ---------------------------------------------------------------------------
// MacAddr
// ---------------------------------------------------------------------------

/// 48-bit Bluetooth device address, most significant byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// The unconfigured address. No real beacon advertises from it.
    pub const UNSET: Self = Self([0; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_unset(&self) -> bool {
        *self == Self::UNSET
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Why a textual address was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacParseError {
    /// Wrong number of hex digits or separators in the wrong place.
    BadLength,
    /// A character that is neither a hex digit nor an accepted separator.
    BadDigit,
}

impl fmt::Display for MacParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadLength => write!(f, "expected 6 octets"),
            Self::BadDigit => write!(f, "invalid hex digit"),
        }
    }
}

impl std::error::Error for MacParseError {}

impl FromStr for MacAddr {
    type Err = MacParseError;

    /// Accepts `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff` or `aabbccddeeff`
    /// in either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits: Vec<u8, 12> = match s.len() {
            12 => s.bytes().collect(),
            17 => {
                let sep = s.as_bytes()[2];
                if sep != b':' && sep != b'-' {
                    return Err(MacParseError::BadLength);
                }
                let mut out = Vec::new();
                for (i, ch) in s.bytes().enumerate() {
                    if i % 3 == 2 {
                        if ch != sep {
                            return Err(MacParseError::BadLength);
                        }
                    } else {
                        out.push(ch).map_err(|_| MacParseError::BadLength)?;
                    }
                }
                out
            }
            _ => return Err(MacParseError::BadLength),
        };

        let mut bytes = [0u8; 6];
        for (octet, pair) in bytes.iter_mut().zip(digits.chunks_exact(2)) {
            *octet = (hex_nibble(pair[0])? << 4) | hex_nibble(pair[1])?;
        }
        Ok(Self(bytes))
    }
}

fn hex_nibble(ch: u8) -> Result<u8, MacParseError> {
    match ch {
        b'0'..=b'9' => Ok(ch - b'0'),
        b'a'..=b'f' => Ok(ch - b'a' + 10),
        b'A'..=b'F' => Ok(ch - b'A' + 10),
        _ => Err(MacParseError::BadDigit),
    }
}

// ---------------------------------------------------------------------------
// Advertisement records
// ---------------------------------------------------------------------------

/// Kind of scan result delivered by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvKind {
    /// An inquiry (discovery) result carrying advertisement data.
    Discovery,
    /// Inquiry complete, discovery complete and other bookkeeping events.
    Other,
}

/// One decoded scan result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvRecord {
    pub kind: AdvKind,
    pub address: MacAddr,
    pub rssi: i8,
    pub payload: Vec<u8, MAX_ADV_PAYLOAD>,
}

impl AdvRecord {
    /// Build a discovery record, truncating payloads longer than
    /// [`MAX_ADV_PAYLOAD`].
    pub fn discovery(address: MacAddr, rssi: i8, payload: &[u8]) -> Self {
        let take = payload.len().min(MAX_ADV_PAYLOAD);
        // `take` is bounded by the capacity, so the fallback never fires.
        let buf = Vec::from_slice(&payload[..take]).unwrap_or_default();
        Self {
            kind: AdvKind::Discovery,
            address,
            rssi,
            payload: buf,
        }
    }
}

/// Eddystone-TLM telemetry read from an accepted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telemetry {
    /// Beacon battery voltage (mV).
    pub battery_mv: u16,
    /// Integer part of the beacon temperature (°C).
    pub temp_c: i8,
    /// Fractional part of the temperature, as a numerator over 255.
    pub temp_frac: u8,
}

impl Telemetry {
    /// Temperature in °C with the fractional byte applied.
    pub fn temperature_c(&self) -> f32 {
        f32::from(self.temp_c) + f32::from(self.temp_frac) / 255.0
    }
}
