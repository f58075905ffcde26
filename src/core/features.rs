//! Feature extraction from frame windows.
//!
//! Windows are resampled to a fixed number of evenly spaced frames so that
//! examples of different durations share one dimensionality. Features are
//! first and second differences (velocity, acceleration) of the configured
//! channels. A missing or non-numeric channel produces NaN, which marks the
//! whole vector invalid; callers skip such windows. Frames that are not in
//! timestamp order yield an empty, equally invalid vector.

use crate::error::DataError;
use crate::source::types::Frame;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Default number of resampled frames per window.
pub const DEFAULT_RESOLUTION: usize = 10;

/// A flat feature vector.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector(pub Vec<f64>);

impl FeatureVector {
    /// Non-empty with every component finite.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn validate(&self) -> Result<(), DataError> {
        if self.0.is_empty() || !self.0.iter().all(|v| v.is_finite()) {
            return Err(DataError::InvalidFeatures);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        FeatureVector(values)
    }
}

/// Turns a window of frames into a feature vector.
///
/// Implementations must be deterministic.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, frames: &[Frame]) -> FeatureVector;
}

/// Velocity/acceleration features over a resampled window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionFeatureExtractor {
    channels: Vec<String>,
    resolution: usize,
}

impl MotionFeatureExtractor {
    pub fn new(channels: Vec<String>, resolution: usize) -> Self {
        Self {
            channels,
            resolution: resolution.max(2),
        }
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Rows of `[v_0, a_0, v_1, a_1, ...]`, one row per resampled frame.
    fn motion_matrix(&self, frames: &[Frame]) -> Option<Vec<Vec<f64>>> {
        if frames.len() < 2 || self.channels.is_empty() {
            return None;
        }
        if frames.windows(2).any(|w| w[1].timestamp < w[0].timestamp) {
            return None;
        }
        let sampled = resample(frames, self.resolution);

        let mut rows = vec![Vec::with_capacity(self.channels.len() * 2); sampled.len()];
        for channel in &self.channels {
            let values: Vec<f64> = sampled
                .iter()
                .map(|f| f.scalar(channel).unwrap_or(f64::NAN))
                .collect();
            let velocity = differences(&values);
            let acceleration = differences(&velocity);
            for (i, row) in rows.iter_mut().enumerate() {
                row.push(velocity[i]);
                // The second difference is undefined for the first two rows
                row.push(if i < 2 { 0.0 } else { acceleration[i] });
            }
        }
        Some(rows)
    }
}

impl Default for MotionFeatureExtractor {
    fn default() -> Self {
        Self::new(
            crate::source::Device::Leap.default_channels(),
            DEFAULT_RESOLUTION,
        )
    }
}

impl FeatureExtractor for MotionFeatureExtractor {
    fn extract(&self, frames: &[Frame]) -> FeatureVector {
        match self.motion_matrix(frames) {
            Some(rows) => FeatureVector(rows.into_iter().flatten().collect()),
            None => FeatureVector::default(),
        }
    }
}

/// Compresses the motion matrix to per-column mean, std dev, max and min.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryFeatureExtractor {
    inner: MotionFeatureExtractor,
}

impl SummaryFeatureExtractor {
    pub fn new(inner: MotionFeatureExtractor) -> Self {
        Self { inner }
    }
}

impl FeatureExtractor for SummaryFeatureExtractor {
    fn extract(&self, frames: &[Frame]) -> FeatureVector {
        let Some(rows) = self.inner.motion_matrix(frames) else {
            return FeatureVector::default();
        };
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let mut features = Vec::with_capacity(width * 4);
        for col in 0..width {
            let column: Vec<f64> = rows.iter().map(|row| row[col]).collect();
            if column.iter().any(|v| v.is_nan()) {
                features.extend([f64::NAN; 4]);
                continue;
            }
            features.push(Statistics::mean(&column));
            features.push(Statistics::population_std_dev(&column));
            features.push(Statistics::max(&column));
            features.push(Statistics::min(&column));
        }
        FeatureVector(features)
    }
}

/// Pick `resolution` frames roughly evenly spaced in time.
///
/// Each knot takes the first frame at or after it, so the result always has
/// exactly `resolution` rows. Expects frames in timestamp order.
fn resample(frames: &[Frame], resolution: usize) -> Vec<&Frame> {
    let first = frames[0].timestamp;
    let last = frames[frames.len() - 1].timestamp;
    let elapsed = last.saturating_sub(first) as f64;

    (0..resolution)
        .map(|i| {
            let knot = first as f64 + elapsed * i as f64 / (resolution - 1) as f64;
            let index = frames
                .partition_point(|f| (f.timestamp as f64) < knot)
                .min(frames.len() - 1);
            &frames[index]
        })
        .collect()
}

/// First differences with a leading zero.
fn differences(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    out.push(0.0);
    out.extend(values.windows(2).map(|pair| pair[1] - pair[0]));
    out
}
