//! Smoothing Buffer: bounded history with positional weighted averaging
//!
//! Once at least three measurements are buffered, each push returns the
//! weighted mean of the most recent entries (newest weighted heaviest).
//! A smoothed value outside the sanity range falls back to the raw value.

use std::collections::VecDeque;

use crate::config::defaults::{
    SMOOTHED_HEIGHT_RANGE_CM, SMOOTHED_SHOULDER_WIDTH_RANGE_CM, SMOOTHING_FALLBACK_WEIGHT,
    SMOOTHING_MIN_HISTORY, SMOOTHING_WEIGHTS,
};
use crate::types::Measurement;

#[derive(Debug, Clone)]
pub struct SmoothingBuffer {
    capacity: usize,
    entries: VecDeque<Measurement>,
}

impl SmoothingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change capacity, evicting the oldest entries if it shrinks.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Up to `n` most recent entries, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Measurement> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    /// Buffer `measurement` and return its smoothed counterpart.
    pub fn push(&mut self, measurement: &Measurement) -> Measurement {
        self.entries.push_back(measurement.clone());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }

        if self.entries.len() < SMOOTHING_MIN_HISTORY {
            return measurement.clone();
        }

        let mut total_weight = 0.0;
        let mut width = 0.0;
        let mut height = 0.0;
        let mut confidence = 0.0;
        for (i, m) in self.recent(SMOOTHING_WEIGHTS.len()).enumerate() {
            let w = SMOOTHING_WEIGHTS.get(i).copied().unwrap_or(SMOOTHING_FALLBACK_WEIGHT);
            total_weight += w;
            width += m.shoulder_width_cm * w;
            height += m.height_cm * w;
            confidence += m.confidence * w;
        }
        width /= total_weight;
        height /= total_weight;
        confidence /= total_weight;

        let (w_min, w_max) = SMOOTHED_SHOULDER_WIDTH_RANGE_CM;
        if !(w_min..=w_max).contains(&width) {
            width = measurement.shoulder_width_cm;
        }
        let (h_min, h_max) = SMOOTHED_HEIGHT_RANGE_CM;
        if !(h_min..=h_max).contains(&height) {
            height = measurement.height_cm;
        }

        measurement.with_values(width, height, confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(width: f64, height: f64, confidence: f64) -> Measurement {
        Measurement::valid(width, height, confidence, 0)
    }

    #[test]
    fn test_passthrough_below_three_entries() {
        let mut buf = SmoothingBuffer::new(5);
        let first = m(40.0, 170.0, 0.9);
        assert_eq!(buf.push(&first), first);
        let second = m(50.0, 180.0, 0.8);
        assert_eq!(buf.push(&second), second);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_weighted_mean_of_four() {
        let mut buf = SmoothingBuffer::new(5);
        let mut out = m(0.0, 0.0, 0.0);
        for w in [40.0, 42.0, 44.0, 46.0] {
            out = buf.push(&m(w, 170.0, 0.9));
        }
        // (40·0.1 + 42·0.2 + 44·0.3 + 46·0.4) / 1.0
        assert!((out.shoulder_width_cm - 44.0).abs() < 1e-9, "got {}", out.shoulder_width_cm);
        assert!((out.height_cm - 170.0).abs() < 1e-9);
        assert!((out.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_three_entries_use_leading_weights() {
        let mut buf = SmoothingBuffer::new(5);
        buf.push(&m(40.0, 170.0, 0.9));
        buf.push(&m(43.0, 170.0, 0.9));
        let out = buf.push(&m(46.0, 170.0, 0.9));
        let expected = (40.0 * 0.1 + 43.0 * 0.2 + 46.0 * 0.3) / 0.6;
        assert!((out.shoulder_width_cm - expected).abs() < 1e-9);
    }

    #[test]
    fn test_only_last_four_contribute() {
        let mut buf = SmoothingBuffer::new(5);
        let mut out = m(0.0, 0.0, 0.0);
        for w in [70.0, 40.0, 42.0, 44.0, 46.0] {
            out = buf.push(&m(w, 170.0, 0.9));
        }
        assert!((out.shoulder_width_cm - 44.0).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_falls_back_to_raw() {
        let mut buf = SmoothingBuffer::new(5);
        buf.push(&m(10.0, 90.0, 0.9));
        buf.push(&m(10.0, 90.0, 0.9));
        let raw = m(12.0, 95.0, 0.9);
        let out = buf.push(&raw);
        assert!((out.shoulder_width_cm - 12.0).abs() < 1e-9);
        assert!((out.height_cm - 95.0).abs() < 1e-9);
    }

    #[test]
    fn test_capacity_bound() {
        let mut buf = SmoothingBuffer::new(3);
        for i in 0..10 {
            buf.push(&m(40.0 + f64::from(i), 170.0, 0.9));
        }
        assert_eq!(buf.len(), 3);
        buf.set_capacity(2);
        assert_eq!(buf.len(), 2);
        let widths: Vec<f64> = buf.recent(5).map(|e| e.shoulder_width_cm).collect();
        assert_eq!(widths, vec![48.0, 49.0]);
    }
}
