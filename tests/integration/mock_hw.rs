//! Mock adapters for integration tests.
//!
//! Records every radio, servo, status and timer call so tests can assert
//! on the full command history without touching real peripherals.

use std::collections::HashMap;
use std::time::Duration;

use petfeeder::app::events::AppEvent;
use petfeeder::app::ports::{
    EventSink, RadioPort, ServoPort, StatusPort, StorageError, StoragePort, TimerPort,
};
use petfeeder::beacon::filter::EDDYSTONE_TLM_HEADER;
use petfeeder::beacon::{AdvRecord, MacAddr};
use petfeeder::error::{ActuatorError, RadioError};

pub const TAG: MacAddr = MacAddr::new([0xC2, 0x9B, 0x44, 0x1A, 0x00, 0x7E]);
pub const STRANGER: MacAddr = MacAddr::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);

/// Eddystone-TLM frame with the given battery level, 21.5 °C.
pub fn tlm_frame(battery_mv: u16) -> Vec<u8> {
    let mut frame = EDDYSTONE_TLM_HEADER.to_vec();
    frame.push(0x00); // TLM version
    frame.extend_from_slice(&battery_mv.to_be_bytes());
    frame.extend_from_slice(&[21, 0x80]);
    frame.extend_from_slice(&[0, 0, 0, 42, 0, 0, 1, 0]);
    frame
}

pub fn tag_adv(rssi: i8) -> AdvRecord {
    AdvRecord::discovery(TAG, rssi, &tlm_frame(3100))
}

// ── Radio ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioCall {
    BringUp,
    Start,
    Stop,
}

#[derive(Default)]
pub struct MockRadio {
    pub calls: Vec<RadioCall>,
    pub fail_bring_up: Option<i32>,
    pub fail_start: Option<i32>,
    pub address_filter: Option<MacAddr>,
}

#[allow(dead_code)]
impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, call: RadioCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }
}

impl RadioPort for MockRadio {
    fn bring_up(&mut self) -> Result<(), RadioError> {
        self.calls.push(RadioCall::BringUp);
        match self.fail_bring_up {
            Some(rc) => Err(RadioError::BringUpFailed(rc)),
            None => Ok(()),
        }
    }

    fn start_scan(&mut self) -> Result<(), RadioError> {
        self.calls.push(RadioCall::Start);
        match self.fail_start {
            Some(rc) => Err(RadioError::StartFailed(rc)),
            None => Ok(()),
        }
    }

    fn stop_scan(&mut self) -> Result<(), RadioError> {
        self.calls.push(RadioCall::Stop);
        Ok(())
    }

    fn set_address_filter(&mut self, mac: MacAddr) {
        self.address_filter = Some(mac);
    }
}

// ── Servo / status / timers ───────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwCall {
    SetDuty(u32),
    Resume,
    Pause,
}

#[derive(Default)]
pub struct MockHardware {
    pub calls: Vec<HwCall>,
    pub supply_low: bool,
    pub beacon_battery_low: bool,
    pub loss_check_wakes: u32,
    pub power_save_arms: Vec<Duration>,
    pub fail_duty: bool,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duties(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HwCall::SetDuty(d) => Some(*d),
                _ => None,
            })
            .collect()
    }
}

impl ServoPort for MockHardware {
    fn set_duty(&mut self, duty: u32) -> Result<(), ActuatorError> {
        if self.fail_duty {
            return Err(ActuatorError::DutyWriteFailed);
        }
        self.calls.push(HwCall::SetDuty(duty));
        Ok(())
    }

    fn resume(&mut self) -> Result<(), ActuatorError> {
        self.calls.push(HwCall::Resume);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), ActuatorError> {
        self.calls.push(HwCall::Pause);
        Ok(())
    }
}

impl StatusPort for MockHardware {
    fn set_battery_low(&mut self, low: bool) {
        self.supply_low = low;
    }

    fn set_beacon_battery_low(&mut self, low: bool) {
        self.beacon_battery_low = low;
    }
}

impl TimerPort for MockHardware {
    fn wake_loss_check(&mut self) {
        self.loss_check_wakes += 1;
    }

    fn arm_power_save(&mut self, hold: Duration) {
        self.power_save_arms.push(hold);
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    store: HashMap<String, Vec<u8>>,
    pub fail_writes: bool,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, namespace: &str, key: &str) -> Option<&[u8]> {
        self.store
            .get(&format!("{}::{}", namespace, key))
            .map(Vec::as_slice)
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.get(&format!("{}::{}", namespace, key)) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.store
            .insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{}::{}", namespace, key));
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
