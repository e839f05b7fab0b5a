//! Feeder supply-voltage monitor.
//!
//! Samples the supply-sense ADC channel once per battery-loop tick and
//! averages non-overlapping blocks of [`VCC_BLOCK_LEN`] samples.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1_CH0 via the oneshot API (initialised by hw_init).
//! On host/test: reads from a static `AtomicU16` for injection.

use core::sync::atomic::{AtomicU16, Ordering};

use log::{debug, warn};

static SIM_VCC_MV: AtomicU16 = AtomicU16::new(3300);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_vcc_mv(mv: u16) {
    SIM_VCC_MV.store(mv, Ordering::Relaxed);
}

pub const VCC_BLOCK_LEN: usize = 10;

pub struct VccMonitor {
    sum_mv: u32,
    count: usize,
    last_avg: Option<u16>,
}

impl VccMonitor {
    pub fn new() -> Self {
        Self {
            sum_mv: 0,
            count: 0,
            last_avg: None,
        }
    }

    /// Take one sample. Returns the block average once a block completes.
    pub fn sample(&mut self) -> Option<u16> {
        match self.read_mv() {
            Some(mv) => self.push(mv),
            None => {
                warn!("vcc: ADC read failed, sample skipped");
                None
            }
        }
    }

    /// Fold one reading into the current block.
    pub fn push(&mut self, mv: u16) -> Option<u16> {
        self.sum_mv += u32::from(mv);
        self.count += 1;
        debug!("vcc: sample {}/{} = {} mV", self.count, VCC_BLOCK_LEN, mv);
        if self.count < VCC_BLOCK_LEN {
            return None;
        }
        let avg = (self.sum_mv / VCC_BLOCK_LEN as u32) as u16;
        self.sum_mv = 0;
        self.count = 0;
        self.last_avg = Some(avg);
        Some(avg)
    }

    pub fn last_average(&self) -> Option<u16> {
        self.last_avg
    }

    #[cfg(target_os = "espidf")]
    fn read_mv(&self) -> Option<u16> {
        crate::drivers::hw_init::read_vcc_mv()
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_mv(&self) -> Option<u16> {
        Some(SIM_VCC_MV.load(Ordering::Relaxed))
    }
}

impl Default for VccMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_only_full_blocks() {
        let mut m = VccMonitor::new();
        for mv in [2400u16, 2600, 2400, 2600, 2400, 2600, 2400, 2600, 2400] {
            assert_eq!(m.push(mv), None);
        }
        assert_eq!(m.last_average(), None);
        assert_eq!(m.push(2600), Some(2500));
        assert_eq!(m.last_average(), Some(2500));
    }

    #[test]
    fn blocks_do_not_overlap() {
        let mut m = VccMonitor::new();
        for _ in 0..VCC_BLOCK_LEN {
            m.push(3000);
        }
        for _ in 0..VCC_BLOCK_LEN - 1 {
            assert_eq!(m.push(2000), None);
        }
        assert_eq!(m.push(2000), Some(2000));
    }

    #[cfg(not(target_os = "espidf"))]
    #[test]
    fn sim_sample_reads_injected_level() {
        sim_set_vcc_mv(2450);
        let mut m = VccMonitor::new();
        let out: Vec<_> = (0..VCC_BLOCK_LEN).map(|_| m.sample()).collect();
        assert!(out[..VCC_BLOCK_LEN - 1].iter().all(Option::is_none));
        assert_eq!(out[VCC_BLOCK_LEN - 1], Some(2450));
    }
}
