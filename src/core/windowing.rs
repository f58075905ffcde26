//! Multi-scale window selection.
//!
//! Gestures are performed faster or slower than the training average, so the
//! detector evaluates several window spans per tick. Spans are derived from
//! the mean and standard deviation of the training sequence durations.

use crate::source::types::Frame;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Default standard-deviation offsets applied to the mean duration.
pub const DEFAULT_SPAN_MULTIPLIERS: [f64; 5] = [-1.5, -1.0, 0.0, 1.0, 1.5];

/// Derives candidate window spans from training statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSelector {
    multipliers: Vec<f64>,
}

impl WindowSelector {
    pub fn new(multipliers: Vec<f64>) -> Self {
        Self { multipliers }
    }

    pub fn multipliers(&self) -> &[f64] {
        &self.multipliers
    }

    /// Candidate spans for the given training sequences.
    ///
    /// Spans are rounded to whole ticks, sorted ascending, with non-positive
    /// values and duplicates removed.
    pub fn candidate_spans(&self, training_sequences: &[Vec<Frame>]) -> Vec<u64> {
        let durations: Vec<f64> = training_sequences
            .iter()
            .map(|seq| sequence_duration(seq) as f64)
            .collect();
        self.spans_from_durations(&durations)
    }

    /// Candidate spans from precomputed durations.
    pub fn spans_from_durations(&self, durations: &[f64]) -> Vec<u64> {
        if durations.is_empty() {
            return Vec::new();
        }
        let mean = durations.mean();
        let std_dev = durations.population_std_dev();
        if !mean.is_finite() || !std_dev.is_finite() {
            return Vec::new();
        }

        let mut spans: Vec<u64> = self
            .multipliers
            .iter()
            .map(|k| (mean + k * std_dev).round())
            .filter(|span| *span > 0.0)
            .map(|span| span as u64)
            .collect();
        spans.sort_unstable();
        spans.dedup();
        spans
    }
}

impl Default for WindowSelector {
    fn default() -> Self {
        Self::new(DEFAULT_SPAN_MULTIPLIERS.to_vec())
    }
}

/// Ticks between the first and last frame of a sequence.
pub fn sequence_duration(frames: &[Frame]) -> u64 {
    match (frames.first(), frames.last()) {
        (Some(first), Some(last)) => last.timestamp.saturating_sub(first.timestamp),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_variance_collapses_to_mean() {
        let selector = WindowSelector::default();
        assert_eq!(selector.spans_from_durations(&[10.0, 10.0, 10.0]), vec![10]);
    }

    #[test]
    fn test_spans_are_ordered_and_positive() {
        let selector = WindowSelector::new(vec![2.0, -2.0, -1.0, 0.0, 1.0]);
        // mean 20, population std dev 10
        let spans = selector.spans_from_durations(&[10.0, 30.0]);
        assert_eq!(spans, vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_empty_training_set_has_no_spans() {
        assert!(WindowSelector::default().candidate_spans(&[]).is_empty());
    }

    #[test]
    fn test_spans_from_sequences() {
        let seq = |end: u64| vec![Frame::new(100), Frame::new(100 + end)];
        let spans = WindowSelector::new(vec![0.0]).candidate_spans(&[seq(40), seq(60)]);
        assert_eq!(spans, vec![50]);
    }
}
