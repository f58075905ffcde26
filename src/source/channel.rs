//! Channel-backed frame source.
//!
//! A transport thread pushes decoded frames into the sender half; the
//! recorder pulls them through the [`FrameSource`] contract.

use crate::error::SourceError;
use crate::source::device::FrameSource;
use crate::source::types::Frame;
use crossbeam_channel::{bounded, Receiver, Sender};

/// A frame source fed through a bounded crossbeam channel.
pub struct ChannelSource {
    name: String,
    receiver: Receiver<Frame>,
}

impl ChannelSource {
    /// Create a source and the sender used to feed it.
    pub fn new(name: impl Into<String>, capacity: usize) -> (Sender<Frame>, Self) {
        let (sender, receiver) = bounded(capacity);
        (
            sender,
            Self {
                name: name.into(),
                receiver,
            },
        )
    }

    /// Wrap an existing receiver.
    pub fn from_receiver(name: impl Into<String>, receiver: Receiver<Frame>) -> Self {
        Self {
            name: name.into(),
            receiver,
        }
    }
}

impl FrameSource for ChannelSource {
    /// Blocks until a frame arrives; fails once every sender is dropped.
    fn get_frame(&mut self) -> Result<Frame, SourceError> {
        self.receiver.recv().map_err(|_| SourceError::Disconnected)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_source_delivers_in_order() {
        let (tx, mut source) = ChannelSource::new("leap", 4);
        tx.send(Frame::new(1)).unwrap();
        tx.send(Frame::new(2)).unwrap();
        drop(tx);

        assert_eq!(source.get_frame().unwrap().timestamp, 1);
        assert_eq!(source.get_frame().unwrap().timestamp, 2);
        assert!(matches!(source.get_frame(), Err(SourceError::Disconnected)));
    }
}
