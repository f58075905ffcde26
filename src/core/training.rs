//! Gesture training: model, threshold and window spans from examples.

use crate::core::features::{FeatureExtractor, FeatureVector};
use crate::core::model::{GaussianProfile, GenerativeModel};
use crate::core::threshold::ThresholdPolicy;
use crate::core::windowing::{sequence_duration, WindowSelector};
use crate::error::ModelError;
use crate::source::types::Frame;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// The capability the detector is generic over.
pub trait DetectionStrategy: Send + Sync {
    /// Label attached to emitted events.
    fn label(&self) -> &str;

    /// Window spans evaluated on every detection tick.
    fn candidate_spans(&self) -> &[u64];

    /// Score a feature vector; higher means a better fit.
    fn score(&self, features: &FeatureVector) -> f64;

    /// Whether a score belongs to the trained class.
    fn classify(&self, score: f64) -> bool;
}

impl<S: DetectionStrategy + ?Sized> DetectionStrategy for Arc<S> {
    fn label(&self) -> &str {
        (**self).label()
    }

    fn candidate_spans(&self) -> &[u64] {
        (**self).candidate_spans()
    }

    fn score(&self, features: &FeatureVector) -> f64 {
        (**self).score(features)
    }

    fn classify(&self, score: f64) -> bool {
        (**self).classify(score)
    }
}

/// Training parameters.
#[derive(Debug, Clone)]
pub struct TrainingOptions {
    /// Standard deviations below the mean training score for the boundary
    pub threshold_k: f64,
    /// Derives window spans from training durations
    pub selector: WindowSelector,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            threshold_k: crate::core::threshold::DEFAULT_THRESHOLD_K,
            selector: WindowSelector::default(),
        }
    }
}

/// A trained gesture: generative model, threshold and window spans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureProfile<M = GaussianProfile> {
    label: String,
    model: M,
    threshold: ThresholdPolicy,
    spans: Vec<u64>,
    example_count: usize,
    trained_at: DateTime<Utc>,
}

impl<M: GenerativeModel> GestureProfile<M> {
    /// Train a profile from example recordings of one gesture.
    ///
    /// Examples whose features are invalid are discarded. Construction fails
    /// if nothing usable remains or if any stage of training fails.
    pub fn train<E>(
        label: impl Into<String>,
        sequences: &[Vec<Frame>],
        extractor: &E,
        options: &TrainingOptions,
    ) -> Result<Self, ModelError>
    where
        E: FeatureExtractor + ?Sized,
    {
        let label = label.into();
        if sequences.is_empty() {
            return Err(ModelError::NoExamples);
        }

        let (examples, durations): (Vec<FeatureVector>, Vec<f64>) = sequences
            .iter()
            .enumerate()
            .filter_map(|(index, seq)| {
                let features = extractor.extract(seq);
                if let Err(e) = features.validate() {
                    debug!(gesture = %label, index, "discarding example: {e}");
                    return None;
                }
                Some((features, sequence_duration(seq) as f64))
            })
            .unzip();
        debug!(
            gesture = %label,
            usable = examples.len(),
            total = sequences.len(),
            "extracted training features"
        );
        if examples.is_empty() {
            return Err(ModelError::NoValidExamples(sequences.len()));
        }

        let model = M::train(&examples)?;
        let scores: Vec<f64> = examples.iter().map(|e| model.score(e)).collect();
        let threshold = ThresholdPolicy::train(&scores, options.threshold_k)?;

        let spans = options.selector.spans_from_durations(&durations);
        if spans.is_empty() {
            return Err(ModelError::NonConvergent(
                "training sequences yield no positive window span".into(),
            ));
        }

        info!(
            gesture = %label,
            examples = examples.len(),
            boundary = threshold.boundary(),
            spans = ?spans,
            "trained gesture profile"
        );

        Ok(Self {
            label,
            model,
            threshold,
            spans,
            example_count: examples.len(),
            trained_at: Utc::now(),
        })
    }

    /// Assemble a profile from already-trained parts.
    pub fn from_parts(
        label: impl Into<String>,
        model: M,
        threshold: ThresholdPolicy,
        spans: Vec<u64>,
    ) -> Self {
        Self {
            label: label.into(),
            model,
            threshold,
            spans,
            example_count: 0,
            trained_at: Utc::now(),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn threshold(&self) -> &ThresholdPolicy {
        &self.threshold
    }

    pub fn example_count(&self) -> usize {
        self.example_count
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }
}

impl<M: GenerativeModel> DetectionStrategy for GestureProfile<M> {
    fn label(&self) -> &str {
        &self.label
    }

    fn candidate_spans(&self) -> &[u64] {
        &self.spans
    }

    fn score(&self, features: &FeatureVector) -> f64 {
        self.model.score(features)
    }

    fn classify(&self, score: f64) -> bool {
        self.threshold.classify(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::MotionFeatureExtractor;

    fn swipe(length: u64, amplitude: f64) -> Vec<Frame> {
        (0..=length)
            .map(|t| {
                let x = amplitude * (t as f64 / length as f64);
                Frame::new(t).with("x", x * x)
            })
            .collect()
    }

    fn extractor() -> MotionFeatureExtractor {
        MotionFeatureExtractor::new(vec!["x".to_string()], 6)
    }

    #[test]
    fn test_train_profile() {
        let sequences = vec![swipe(40, 1.0), swipe(50, 1.1), swipe(60, 0.9)];
        let profile: GestureProfile =
            GestureProfile::train("swipe", &sequences, &extractor(), &TrainingOptions::default())
                .unwrap();

        assert_eq!(profile.label(), "swipe");
        assert_eq!(profile.example_count(), 3);
        assert!(profile.candidate_spans().contains(&50));

        let typical = extractor().extract(&swipe(50, 1.0));
        assert!(profile.classify(profile.score(&typical)));
    }

    #[test]
    fn test_train_with_no_sequences_fails() {
        let err = GestureProfile::<GaussianProfile>::train(
            "swipe",
            &[],
            &extractor(),
            &TrainingOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, ModelError::NoExamples);
    }

    #[test]
    fn test_invalid_examples_are_discarded() {
        let broken: Vec<Frame> = (0..10).map(Frame::new).collect();
        let err = GestureProfile::<GaussianProfile>::train(
            "swipe",
            &[broken.clone(), broken],
            &extractor(),
            &TrainingOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, ModelError::NoValidExamples(2));

        let profile = GestureProfile::<GaussianProfile>::train(
            "swipe",
            &[swipe(40, 1.0), (0..10).map(Frame::new).collect()],
            &extractor(),
            &TrainingOptions::default(),
        )
        .unwrap();
        assert_eq!(profile.example_count(), 1);
    }

    #[test]
    fn test_unordered_example_is_discarded() {
        let mut reversed = swipe(45, 1.0);
        reversed.reverse();
        let profile = GestureProfile::<GaussianProfile>::train(
            "swipe",
            &[swipe(40, 1.0), reversed],
            &extractor(),
            &TrainingOptions::default(),
        )
        .unwrap();
        assert_eq!(profile.example_count(), 1);
    }

    #[test]
    fn test_profile_serializes() {
        let profile: GestureProfile = GestureProfile::train(
            "swipe",
            &[swipe(40, 1.0), swipe(44, 1.0)],
            &extractor(),
            &TrainingOptions::default(),
        )
        .unwrap();
        let json = serde_json::to_string(&profile).unwrap();
        let restored: GestureProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.label(), "swipe");
        assert_eq!(restored.candidate_spans(), profile.candidate_spans());
        assert_eq!(restored.threshold(), profile.threshold());
    }
}
