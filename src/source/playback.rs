//! Finite sources: replay of stored sequences and line-delimited streams.

use crate::error::SourceError;
use crate::source::device::{decode_message, decode_payload, Device, FrameSource};
use crate::source::types::Frame;
use std::collections::VecDeque;
use std::io::BufRead;
use std::time::Duration;

/// Replays a stored frame sequence, optionally paced.
pub struct PlaybackSource {
    name: String,
    frames: VecDeque<Frame>,
    interval: Option<Duration>,
}

impl PlaybackSource {
    pub fn new(name: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            name: name.into(),
            frames: frames.into(),
            interval: None,
        }
    }

    /// Sleep `interval` before every frame to imitate a live device.
    pub fn paced(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Frames not yet replayed.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for PlaybackSource {
    fn get_frame(&mut self) -> Result<Frame, SourceError> {
        if let Some(interval) = self.interval {
            std::thread::sleep(interval);
        }
        self.frames.pop_front().ok_or(SourceError::Exhausted)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Reads one device message per line from any buffered reader.
///
/// Lines may carry the device topic prefix; with no device configured each
/// line must be a bare JSON frame. Blank lines are skipped.
pub struct LineSource<R> {
    name: String,
    reader: R,
    device: Option<Device>,
    line: String,
}

impl<R: BufRead + Send> LineSource<R> {
    pub fn new(name: impl Into<String>, reader: R, device: Option<Device>) -> Self {
        Self {
            name: name.into(),
            reader,
            device,
            line: String::new(),
        }
    }
}

impl<R: BufRead + Send> FrameSource for LineSource<R> {
    fn get_frame(&mut self) -> Result<Frame, SourceError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Err(SourceError::Exhausted);
            }
            let message = self.line.trim();
            if message.is_empty() {
                continue;
            }
            let frame = match self.device {
                Some(device) if message.starts_with(device.topic_filter()) => {
                    decode_message(device, message.as_bytes())?
                }
                _ => decode_payload(message.as_bytes())?,
            };
            return Ok(frame);
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
