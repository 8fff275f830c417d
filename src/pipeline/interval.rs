//! Adaptive frame interval
//!
//! Tracks how long recent ticks took to process and stretches or shrinks the
//! base frame interval so slow devices are not asked for more frames than
//! they can handle.

use std::collections::VecDeque;
use std::time::Duration;

use crate::config::defaults::{
    ADAPTIVE_FAST_FACTOR, ADAPTIVE_FAST_MULTIPLIER, ADAPTIVE_MAX_INTERVAL_MS,
    ADAPTIVE_MIN_INTERVAL_MS, ADAPTIVE_SLOW_FACTOR, ADAPTIVE_SLOW_MULTIPLIER, FRAME_TIMING_WINDOW,
};

#[derive(Debug, Clone, Default)]
pub struct FrameIntervalTuner {
    recent_ms: VecDeque<f64>,
}

impl FrameIntervalTuner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record how long one processed frame took.
    pub fn record(&mut self, elapsed: Duration) {
        self.recent_ms.push_back(elapsed.as_secs_f64() * 1000.0);
        while self.recent_ms.len() > FRAME_TIMING_WINDOW {
            self.recent_ms.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.recent_ms.clear();
    }

    /// Mean of the recorded processing times (ms), if any.
    pub fn average_ms(&self) -> Option<f64> {
        if self.recent_ms.is_empty() {
            None
        } else {
            Some(self.recent_ms.iter().sum::<f64>() / self.recent_ms.len() as f64)
        }
    }

    /// Interval to wait between processed frames given base interval `base_ms`.
    ///
    /// - average > 1.2 × base → min(1.5 × base, 300 ms)
    /// - average < 0.7 × base → max(0.8 × base, 30 ms)
    /// - otherwise base
    pub fn effective_interval_ms(&self, base_ms: u64) -> u64 {
        let Some(avg) = self.average_ms() else {
            return base_ms;
        };
        let base = base_ms as f64;
        if avg > base * ADAPTIVE_SLOW_FACTOR {
            ((base * ADAPTIVE_SLOW_MULTIPLIER).round() as u64).min(ADAPTIVE_MAX_INTERVAL_MS)
        } else if avg < base * ADAPTIVE_FAST_FACTOR {
            ((base * ADAPTIVE_FAST_MULTIPLIER).round() as u64).max(ADAPTIVE_MIN_INTERVAL_MS)
        } else {
            base_ms
        }
    }
}
