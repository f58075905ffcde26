//! Configuration for the gesture monitor.

use crate::core::buffer::MIN_WINDOW_FRAMES;
use crate::core::detector::DetectorConfig;
use crate::core::features::{MotionFeatureExtractor, DEFAULT_RESOLUTION};
use crate::core::threshold::DEFAULT_THRESHOLD_K;
use crate::core::training::TrainingOptions;
use crate::core::windowing::{WindowSelector, DEFAULT_SPAN_MULTIPLIERS};
use crate::recording::RecorderConfig;
use crate::source::device::Device;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main configuration for the gesture monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Detector and training parameters
    pub detection: DetectionConfig,

    /// Recorder parameters
    pub recording: RecordingConfig,

    /// Feature extraction parameters
    pub features: FeatureConfig,

    /// Path for stored recordings, profiles and session stats
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gesture-monitor");

        Self {
            detection: DetectionConfig::default(),
            recording: RecordingConfig::default(),
            features: FeatureConfig::default(),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(ConfigError::Parse)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gesture-monitor")
            .join("config.json")
    }

    /// Path of the persisted session statistics.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)?;
        Ok(())
    }
}

/// Detection and training parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Standard deviations below the mean training score for the boundary
    pub threshold_k: f64,

    /// Multipliers of the training-duration std-dev used for window spans
    pub span_multipliers: Vec<f64>,

    /// Frames required in the buffer before any window is evaluated
    pub min_window_frames: usize,

    /// Longest single wait for new data before re-checking state
    #[serde(with = "duration_serde")]
    pub wait_timeout: Duration,

    /// Events buffered before new ones are dropped
    pub event_capacity: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold_k: DEFAULT_THRESHOLD_K,
            span_multipliers: DEFAULT_SPAN_MULTIPLIERS.to_vec(),
            min_window_frames: MIN_WINDOW_FRAMES,
            wait_timeout: Duration::from_millis(500),
            event_capacity: 256,
        }
    }
}

impl DetectionConfig {
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            wait_timeout: self.wait_timeout,
            event_capacity: self.event_capacity,
        }
    }

    pub fn training_options(&self) -> TrainingOptions {
        TrainingOptions {
            threshold_k: self.threshold_k,
            selector: WindowSelector::new(self.span_multipliers.clone()),
        }
    }
}

/// Recorder parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// How long a partial tick waits for the remaining sources
    #[serde(with = "duration_serde")]
    pub merge_timeout: Duration,

    /// Frames queued between source threads and the merger
    pub source_capacity: usize,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            merge_timeout: Duration::from_millis(100),
            source_capacity: 1024,
        }
    }
}

impl RecordingConfig {
    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            merge_timeout: self.merge_timeout,
            source_capacity: self.source_capacity,
        }
    }
}

/// Feature extraction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Channels read from every frame (dotted paths allowed)
    pub channels: Vec<String>,

    /// Frames each window is resampled to
    pub resolution: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            channels: Device::Leap.default_channels(),
            resolution: DEFAULT_RESOLUTION,
        }
    }
}

impl FeatureConfig {
    pub fn extractor(&self) -> MotionFeatureExtractor {
        MotionFeatureExtractor::new(self.channels.clone(), self.resolution)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Serde support for Duration, stored as milliseconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
