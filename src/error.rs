//! Error taxonomy for the gesture monitor.
//!
//! Lifecycle misuse fails fast, malformed data is recovered locally by the
//! caller, model failures abort construction, and runtime faults stop the
//! monitor with a queryable terminal status.

use crate::source::types::Timestamp;
use thiserror::Error;

/// Misuse of a component's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("detector is not attached to a buffer")]
    NotAttached,
    #[error("detector is already attached to a buffer")]
    AlreadyAttached,
    #[error("cannot {operation} a detector that is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: String,
    },
    #[error("recorder needs at least one frame source")]
    NoSources,
    #[error("recorder has already been started")]
    AlreadyStarted,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Malformed input. The offending unit is rejected and processing continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("frame timestamp {got} precedes last timestamp {last}")]
    NonMonotonicTimestamp { last: Timestamp, got: Timestamp },
    #[error("buffer is exhausted; no further frames are accepted")]
    BufferExhausted,
    #[error("invalid frame range {start}..={end} for buffer of {len} frames")]
    InvalidRange { start: usize, end: usize, len: usize },
    #[error("feature vector is empty or contains non-finite values")]
    InvalidFeatures,
    #[error("message does not carry the '{expected}' topic filter")]
    TopicMismatch { expected: &'static str },
    #[error("malformed frame payload: {0}")]
    MalformedFrame(String),
}

/// Training failures. Fatal to the component being built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("cannot train on an empty example set")]
    NoExamples,
    #[error("none of the {0} training examples produced valid features")]
    NoValidExamples(usize),
    #[error("examples have inconsistent dimensionality ({expected} vs {got})")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("fit did not converge: {0}")]
    NonConvergent(String),
}

/// A buffer invariant was observed violated during a read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("buffer invariant violated at frame {index}: timestamp {got} follows {previous}")]
pub struct RuntimeFault {
    pub index: usize,
    pub previous: Timestamp,
    pub got: Timestamp,
}

/// Errors raised by a frame source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source has no more frames")]
    Exhausted,
    #[error("source disconnected")]
    Disconnected,
    #[error("source read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("'{0}' not found")]
    NotFound(String),
    #[error("invalid name '{0}': names may not be empty or contain path separators")]
    InvalidName(String),
}

/// Top-level error for callers that do not care about the concern.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Fault(#[from] RuntimeFault),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DataError::NonMonotonicTimestamp { last: 20, got: 10 };
        assert_eq!(err.to_string(), "frame timestamp 10 precedes last timestamp 20");

        let err: Error = ConfigurationError::NotAttached.into();
        assert!(err.to_string().contains("not attached"));
    }
}
