//! Core functionality for the gesture monitor.
//!
//! This module contains:
//! - The shared motion sequence buffer and its new-data signal
//! - Window span selection and threshold policy
//! - Feature extraction and generative models
//! - Gesture training and the detector loop

pub mod buffer;
pub mod detector;
pub mod event;
pub mod features;
pub mod model;
pub mod threshold;
pub mod training;
pub mod windowing;

// Re-export commonly used types
pub use buffer::{
    MotionSequenceBuffer, NewDataSignal, SharedBuffer, WaitStatus, Window, MIN_WINDOW_FRAMES,
};
pub use detector::{Detector, DetectorConfig, DetectorHandle, MonitorStatus, StopReason};
pub use event::Event;
pub use features::{
    FeatureExtractor, FeatureVector, MotionFeatureExtractor, SummaryFeatureExtractor,
    DEFAULT_RESOLUTION,
};
pub use model::{GaussianProfile, GenerativeModel};
pub use threshold::{ThresholdPolicy, DEFAULT_THRESHOLD_K};
pub use training::{DetectionStrategy, GestureProfile, TrainingOptions};
pub use windowing::{sequence_duration, WindowSelector, DEFAULT_SPAN_MULTIPLIERS};
