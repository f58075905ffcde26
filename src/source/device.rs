//! The frame source capability and device message decoding.
//!
//! Capture devices publish JSON payloads prefixed with a per-device topic
//! filter. The transport itself lives outside this crate; sources only need
//! to hand over complete messages.

use crate::error::{DataError, SourceError};
use crate::source::types::Frame;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Blocking pull of frames from one capture device.
pub trait FrameSource: Send {
    /// Block until the next frame is available.
    fn get_frame(&mut self) -> Result<Frame, SourceError>;

    /// Empirical frames per second over `num_frames` pulls.
    fn get_framerate(&mut self, num_frames: usize) -> Result<f64, SourceError> {
        let start = Instant::now();
        for _ in 0..num_frames {
            self.get_frame()?;
        }
        let elapsed = start.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return Ok(f64::INFINITY);
        }
        Ok(num_frames as f64 / elapsed)
    }

    /// Human-readable name used in logs.
    fn name(&self) -> &str {
        "source"
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn get_frame(&mut self) -> Result<Frame, SourceError> {
        (**self).get_frame()
    }

    fn get_framerate(&mut self, num_frames: usize) -> Result<f64, SourceError> {
        (**self).get_framerate(num_frames)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Supported capture devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Primesense,
    Leap,
    Eyetribe,
}

impl Device {
    /// Topic filter prefixed to every message from this device.
    pub fn topic_filter(&self) -> &'static str {
        match self {
            Device::Primesense => "__primesense__",
            Device::Leap => "__leap__",
            Device::Eyetribe => "__eyetribe__",
        }
    }

    /// Parse a device name (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "primesense" => Some(Device::Primesense),
            "leap" => Some(Device::Leap),
            "eyetribe" => Some(Device::Eyetribe),
            _ => None,
        }
    }

    /// Default channels read by feature extraction for this device.
    pub fn default_channels(&self) -> Vec<String> {
        let names: &[&str] = match self {
            Device::Leap => &["yaw", "pitch", "roll", "palm_x", "palm_y", "palm_z"],
            Device::Primesense => &["head_x", "head_y", "head_z"],
            Device::Eyetribe => &["gaze_x", "gaze_y"],
        };
        names.iter().map(|s| s.to_string()).collect()
    }
}

/// Decode a topic-prefixed device message into a frame.
pub fn decode_message(device: Device, message: &[u8]) -> Result<Frame, DataError> {
    let filter = device.topic_filter().as_bytes();
    let payload = message
        .strip_prefix(filter)
        .ok_or(DataError::TopicMismatch {
            expected: device.topic_filter(),
        })?;
    decode_payload(payload)
}

/// Decode a bare JSON payload into a frame.
pub fn decode_payload(payload: &[u8]) -> Result<Frame, DataError> {
    serde_json::from_slice(payload).map_err(|e| DataError::MalformedFrame(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_leap_message() {
        let frame = decode_message(Device::Leap, br#"__leap__{"timestamp": 100, "yaw": 0.5}"#)
            .unwrap();
        assert_eq!(frame.timestamp, 100);
        assert_eq!(frame.scalar("yaw"), Some(0.5));
    }

    #[test]
    fn test_decode_rejects_wrong_topic() {
        let err = decode_message(Device::Leap, br#"__eyetribe__{"timestamp": 1}"#).unwrap_err();
        assert!(matches!(err, DataError::TopicMismatch { .. }));
    }

    #[test]
    fn test_decode_rejects_bad_json() {
        let err = decode_message(Device::Leap, b"__leap__{not json").unwrap_err();
        assert!(matches!(err, DataError::MalformedFrame(_)));
    }

    #[test]
    fn test_device_parsing() {
        assert_eq!(Device::parse("LEAP"), Some(Device::Leap));
        assert_eq!(Device::parse("kinect"), None);
        assert_eq!(Device::Leap.default_channels().len(), 6);
    }

    struct Counting(u64);

    impl FrameSource for Counting {
        fn get_frame(&mut self) -> Result<Frame, SourceError> {
            self.0 += 1;
            Ok(Frame::new(self.0))
        }
    }

    #[test]
    fn test_framerate_pulls_requested_frames() {
        let mut source = Counting(0);
        let rate = source.get_framerate(5).unwrap();
        assert!(rate > 0.0);
        assert_eq!(source.0, 5);
    }
}
