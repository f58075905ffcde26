//! Detection events.

use crate::core::buffer::Window;
use crate::source::types::Timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A discrete detection result, emitted when a window crosses the threshold.
///
/// Events are immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Gesture label of the strategy that fired
    pub label: String,
    /// Timestamp of the first frame in the matching window
    pub start_timestamp: Timestamp,
    /// Timestamp of the last frame in the matching window
    pub end_timestamp: Timestamp,
    /// Buffer index of the first frame in the matching window
    pub start_index: usize,
    /// Buffer index of the last frame in the matching window
    pub end_index: usize,
    /// Model score of the matching window
    pub score: f64,
    /// Window span that matched
    pub span: u64,
    /// Wall-clock time of detection
    pub detected_at: DateTime<Utc>,
}

impl Event {
    pub fn from_window(label: &str, window: &Window, score: f64) -> Self {
        Self {
            label: label.to_string(),
            start_timestamp: window.start_timestamp(),
            end_timestamp: window.end_timestamp(),
            start_index: window.start_index,
            end_index: window.end_index,
            score,
            span: window.span,
            detected_at: Utc::now(),
        }
    }
}
