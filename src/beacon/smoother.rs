//! RSSI smoother: moving average over the last [`WINDOW`] samples with a
//! slew-rate limit on the output.

use heapless::HistoryBuffer;
use log::debug;

/// Number of samples averaged.
pub const WINDOW: usize = 8;

/// Moving-average smoother with a per-sample slew limit.
#[derive(Debug)]
pub struct RssiSmoother {
    samples: HistoryBuffer<i8, WINDOW>,
    prev: Option<f32>,
    slew_delta: f32,
}

impl RssiSmoother {
    pub fn new(slew_delta_dbm: u8) -> Self {
        Self {
            samples: HistoryBuffer::new(),
            prev: None,
            slew_delta: f32::from(slew_delta_dbm),
        }
    }

    /// Push one sample. Returns `None` until the window has been filled
    /// once, then the clamped mean.
    pub fn observe(&mut self, rssi: i8) -> Option<f32> {
        self.samples.write(rssi);
        if !self.is_ready() {
            debug!(
                "RSSI window warming up ({}/{})",
                self.samples.len(),
                WINDOW
            );
            return None;
        }

        let sum: i32 = self.samples.as_slice().iter().map(|&s| i32::from(s)).sum();
        let mean = sum as f32 / WINDOW as f32;

        let out = match self.prev {
            Some(prev) => mean.clamp(prev - self.slew_delta, prev + self.slew_delta),
            None => mean,
        };
        debug!("RSSI avg {:.2} dBm (raw mean {:.2}, prev {:?})", out, mean, self.prev);
        self.prev = Some(out);
        Some(out)
    }

    pub fn is_ready(&self) -> bool {
        self.samples.len() == self.samples.capacity()
    }

    /// Last value returned by [`observe`](Self::observe).
    pub fn last(&self) -> Option<f32> {
        self.prev
    }
}
