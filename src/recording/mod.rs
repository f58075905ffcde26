//! Recording: frame sources merged into a motion sequence buffer.

pub mod merge;
pub mod recorder;

// Re-export commonly used types
pub use merge::{FrameMerger, MergeOutcome};
pub use recorder::{Recorder, RecorderConfig};
