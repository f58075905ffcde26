//! Frame types shared by sources, buffers and feature extraction.
//!
//! A frame is one timestamped sample merged across the channels of a device
//! tick. Values may be scalars, text, or nested groups of values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Device-clock ticks (microseconds for the supported devices).
pub type Timestamp = u64;

/// A single channel reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelValue {
    Scalar(f64),
    Text(String),
    Nested(BTreeMap<String, ChannelValue>),
}

impl ChannelValue {
    /// The numeric value, if this is a scalar.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ChannelValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for ChannelValue {
    fn from(value: f64) -> Self {
        ChannelValue::Scalar(value)
    }
}

/// A timestamped mapping of channel names to values.
///
/// Frames are immutable once appended to a buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Device timestamp of the sample
    pub timestamp: Timestamp,
    /// Channel readings keyed by name
    #[serde(flatten)]
    pub channels: BTreeMap<String, ChannelValue>,
}

impl Frame {
    /// Create an empty frame at the given timestamp.
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            channels: BTreeMap::new(),
        }
    }

    /// Builder-style channel insertion.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ChannelValue>) -> Self {
        self.channels.insert(name.into(), value.into());
        self
    }

    /// Look up a channel by name or dotted path (`hand.palm_x`).
    pub fn channel(&self, path: &str) -> Option<&ChannelValue> {
        let mut parts = path.split('.');
        let mut current = self.channels.get(parts.next()?)?;
        for part in parts {
            match current {
                ChannelValue::Nested(map) => current = map.get(part)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Numeric value of a channel, if present and scalar.
    pub fn scalar(&self, path: &str) -> Option<f64> {
        self.channel(path).and_then(ChannelValue::as_f64)
    }

    /// Merge another frame's channels into this one.
    ///
    /// Channels already present are overwritten. The merged timestamp is the
    /// later of the two so the result never moves backwards in time.
    pub fn merge(&mut self, other: Frame) {
        self.timestamp = self.timestamp.max(other.timestamp);
        self.channels.extend(other.channels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_json_is_flat() {
        let frame = Frame::new(42).with("palm_x", 1.5);
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["timestamp"], 42);
        assert_eq!(json["palm_x"], 1.5);
    }

    #[test]
    fn test_nested_channel_lookup() {
        let frame: Frame =
            serde_json::from_str(r#"{"timestamp": 7, "hand": {"palm_x": 3, "label": "left"}}"#)
                .unwrap();
        assert_eq!(frame.scalar("hand.palm_x"), Some(3.0));
        assert_eq!(frame.scalar("hand.label"), None);
        assert_eq!(frame.scalar("hand.missing"), None);
        assert_eq!(frame.scalar("hand"), None);
    }

    #[test]
    fn test_merge_keeps_later_timestamp() {
        let mut a = Frame::new(10).with("a", 1.0);
        let b = Frame::new(12).with("b", 2.0);
        a.merge(b);
        assert_eq!(a.timestamp, 12);
        assert_eq!(a.scalar("a"), Some(1.0));
        assert_eq!(a.scalar("b"), Some(2.0));
    }
}
