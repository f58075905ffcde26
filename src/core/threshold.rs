//! Score threshold derived from a model's scores on its own training set.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Default number of standard deviations below the mean score.
pub const DEFAULT_THRESHOLD_K: f64 = 3.0;

/// Pass/fail decision boundary over generative model scores.
///
/// Immutable once trained; retrain whenever the model or its training set
/// changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    boundary: f64,
    k: f64,
}

impl ThresholdPolicy {
    /// Boundary = mean(scores) - k * stddev(scores).
    ///
    /// Non-finite scores are ignored; at least one finite score is required.
    pub fn train(scores: &[f64], k: f64) -> Result<Self, ModelError> {
        let finite: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
        if finite.is_empty() {
            return Err(ModelError::NoExamples);
        }
        let mean = finite.iter().mean();
        let std_dev = finite.iter().population_std_dev();
        let boundary = mean - k * std_dev;
        if !boundary.is_finite() {
            return Err(ModelError::NonConvergent(format!(
                "threshold boundary is not finite (mean {mean}, std dev {std_dev})"
            )));
        }
        Ok(Self { boundary, k })
    }

    /// A policy with an explicit boundary.
    pub fn with_boundary(boundary: f64) -> Self {
        Self { boundary, k: 0.0 }
    }

    pub fn classify(&self, score: f64) -> bool {
        score >= self.boundary
    }

    pub fn boundary(&self) -> f64 {
        self.boundary
    }

    pub fn k(&self) -> f64 {
        self.k
    }
}
