//! Generative models over feature vectors.
//!
//! The detector only relies on the train/score contract: training on a set
//! of positive examples, and a score that grows with how well an example fits
//! the trained class.

use crate::core::features::FeatureVector;
use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, Normal};
use statrs::statistics::Statistics;

/// Trained scorer for one class of motion.
pub trait GenerativeModel: Sized + Send + Sync {
    /// Fit the model to positive examples.
    fn train(examples: &[FeatureVector]) -> Result<Self, ModelError>;

    /// Log-likelihood style score; higher means a better fit.
    fn score(&self, example: &FeatureVector) -> f64;
}

/// Smallest standard deviation allowed per dimension.
const MIN_STD_DEV: f64 = 1e-3;

/// Stored parameters of a [`GaussianProfile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianParameters {
    pub means: Vec<f64>,
    pub std_devs: Vec<f64>,
}

/// Diagonal Gaussian over feature dimensions.
///
/// Each dimension is modelled independently with its own mean and standard
/// deviation; the score is the summed log-density.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GaussianParameters", into = "GaussianParameters")]
pub struct GaussianProfile {
    means: Vec<f64>,
    std_devs: Vec<f64>,
    dimensions: Vec<Normal>,
}

impl TryFrom<GaussianParameters> for GaussianProfile {
    type Error = ModelError;

    fn try_from(params: GaussianParameters) -> Result<Self, Self::Error> {
        Self::from_parameters(params.means, params.std_devs)
    }
}

impl From<GaussianProfile> for GaussianParameters {
    fn from(profile: GaussianProfile) -> Self {
        GaussianParameters {
            means: profile.means,
            std_devs: profile.std_devs,
        }
    }
}

impl GaussianProfile {
    /// Rebuild from stored parameters.
    pub fn from_parameters(means: Vec<f64>, std_devs: Vec<f64>) -> Result<Self, ModelError> {
        if means.len() != std_devs.len() {
            return Err(ModelError::DimensionMismatch {
                expected: means.len(),
                got: std_devs.len(),
            });
        }
        let dimensions = means
            .iter()
            .zip(&std_devs)
            .map(|(&mean, &std_dev)| {
                Normal::new(mean, std_dev.max(MIN_STD_DEV))
                    .map_err(|e| ModelError::NonConvergent(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            means,
            std_devs,
            dimensions,
        })
    }

    pub fn dimensionality(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn std_devs(&self) -> &[f64] {
        &self.std_devs
    }
}

impl GenerativeModel for GaussianProfile {
    fn train(examples: &[FeatureVector]) -> Result<Self, ModelError> {
        let first = examples.first().ok_or(ModelError::NoExamples)?;
        let width = first.len();
        if width == 0 {
            return Err(ModelError::NonConvergent("examples have no features".into()));
        }
        for example in examples {
            if example.len() != width {
                return Err(ModelError::DimensionMismatch {
                    expected: width,
                    got: example.len(),
                });
            }
            if !example.is_valid() {
                return Err(ModelError::NonConvergent(
                    "training example contains non-finite values".into(),
                ));
            }
        }

        let mut means = Vec::with_capacity(width);
        let mut std_devs = Vec::with_capacity(width);
        for dim in 0..width {
            let column: Vec<f64> = examples.iter().map(|e| e.0[dim]).collect();
            means.push(Statistics::mean(&column));
            std_devs.push(Statistics::population_std_dev(&column).max(MIN_STD_DEV));
        }
        Self::from_parameters(means, std_devs)
    }

    fn score(&self, example: &FeatureVector) -> f64 {
        if example.len() != self.dimensions.len() || self.dimensions.is_empty() {
            return f64::NEG_INFINITY;
        }
        self.dimensions
            .iter()
            .zip(example.as_slice())
            .map(|(normal, &x)| normal.ln_pdf(x))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn examples() -> Vec<FeatureVector> {
        vec![
            vec![1.0, 10.0].into(),
            vec![2.0, 11.0].into(),
            vec![3.0, 12.0].into(),
        ]
    }

    #[test]
    fn test_training_estimates_parameters() {
        let model = GaussianProfile::train(&examples()).unwrap();
        assert_eq!(model.dimensionality(), 2);
        assert_eq!(model.means(), &[2.0, 11.0]);
    }

    #[test]
    fn test_score_prefers_typical_examples() {
        let model = GaussianProfile::train(&examples()).unwrap();
        let typical = model.score(&vec![2.0, 11.0].into());
        let outlier = model.score(&vec![9.0, -4.0].into());
        assert!(typical > outlier);
    }

    #[test]
    fn test_wrong_dimensionality_scores_negative_infinity() {
        let model = GaussianProfile::train(&examples()).unwrap();
        assert_eq!(model.score(&vec![1.0].into()), f64::NEG_INFINITY);
    }

    #[test]
    fn test_empty_training_set_is_fatal() {
        assert_eq!(
            GaussianProfile::train(&[]).unwrap_err(),
            ModelError::NoExamples
        );
    }

    #[test]
    fn test_inconsistent_examples_rejected() {
        let err = GaussianProfile::train(&[vec![1.0].into(), vec![1.0, 2.0].into()]).unwrap_err();
        assert!(matches!(err, ModelError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_mismatched_parameters_rejected() {
        let params = GaussianParameters {
            means: vec![0.0, 1.0],
            std_devs: vec![1.0],
        };
        assert!(GaussianProfile::try_from(params).is_err());
    }

    #[test]
    fn test_zero_variance_dimension_is_floored() {
        let model =
            GaussianProfile::train(&[vec![5.0].into(), vec![5.0].into()]).unwrap();
        assert!(model.score(&vec![5.0].into()).is_finite());
    }

    #[test]
    fn test_restored_profile_scores_identically() {
        let model = GaussianProfile::train(&examples()).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let restored: GaussianProfile = serde_json::from_str(&json).unwrap();
        let x: FeatureVector = vec![2.5, 10.5].into();
        assert_eq!(model.score(&x), restored.score(&x));
    }
}
