//! Session statistics for the gesture monitor.
//!
//! Counters are shared between the recorder and any detectors attached to
//! the same session, and can be persisted across runs.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SessionLog, SessionStats,
    SharedSessionLog,
};
