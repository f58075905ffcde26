//! Gesture Monitor - real-time gesture detection over motion capture streams.
//!
//! Frames from one or more capture devices are merged into a shared motion
//! sequence buffer. Detectors trained on example recordings watch the buffer,
//! score candidate windows against a generative model and emit an event when
//! a window crosses the trained threshold.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Gesture Monitor                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌──────────────────────┐    │
//! │  │FrameSources │──▶│  Recorder   │──▶│ MotionSequenceBuffer │    │
//! │  │ (per device)│   │(tick merge) │   │  (append + signal)   │    │
//! │  └─────────────┘   └─────────────┘   └──────────────────────┘    │
//! │                                                 │                 │
//! │                                                 ▼                 │
//! │  ┌─────────────┐   ┌─────────────┐   ┌──────────────────────┐    │
//! │  │   Events    │◀──│  Threshold  │◀──│ Detector: windows ─▶ │    │
//! │  │  (channel)  │   │   Policy    │   │ features ─▶ model    │    │
//! │  └─────────────┘   └─────────────┘   └──────────────────────┘    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use gesture_monitor::core::{
//!     Detector, DetectorConfig, GestureProfile, MotionFeatureExtractor, MotionSequenceBuffer,
//!     TrainingOptions,
//! };
//! use gesture_monitor::source::Frame;
//!
//! let examples: Vec<Vec<Frame>> = Vec::new(); // recorded gesture examples
//! let extractor = MotionFeatureExtractor::default();
//! let profile: GestureProfile =
//!     GestureProfile::train("swipe", &examples, &extractor, &TrainingOptions::default())?;
//!
//! let buffer = MotionSequenceBuffer::shared();
//! let mut detector = Detector::new(profile, extractor, DetectorConfig::default())?;
//! detector.attach(buffer.clone())?;
//! detector.start()?;
//!
//! // Producers append frames to `buffer`; events arrive on detector.events()
//! # Ok::<(), gesture_monitor::Error>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod recording;
pub mod source;
pub mod stats;
pub mod storage;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{
    Detector, DetectorConfig, DetectorHandle, Event, GestureProfile, MonitorStatus,
    MotionSequenceBuffer, SharedBuffer, StopReason,
};
pub use error::{
    ConfigurationError, DataError, Error, ModelError, Result, RuntimeFault, SourceError,
    StorageError,
};
pub use recording::{Recorder, RecorderConfig};
pub use source::{Device, Frame, FrameSource};
pub use stats::{SessionLog, SessionStats, SharedSessionLog};
pub use storage::{FileStore, SequenceStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
