//! Frame sources for the gesture monitor.
//!
//! Every capture device is consumed through the blocking [`FrameSource`]
//! contract; the wire transport stays outside the crate.

pub mod channel;
pub mod device;
pub mod playback;
pub mod types;

// Re-export commonly used types
pub use channel::ChannelSource;
pub use device::{decode_message, decode_payload, Device, FrameSource};
pub use playback::{LineSource, PlaybackSource};
pub use types::{ChannelValue, Frame, Timestamp};
