use thiserror::Error;

use crate::types::SessionKey;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("channel `{channel_id}` has no electrode mapping")]
    UnmappedChannel { channel_id: String },
    #[error("channel `{channel_id}` mapped to electrode {existing} and {requested}")]
    ConflictingMapping {
        channel_id: String,
        existing: u32,
        requested: u32,
    },
    #[error("incomplete coverage: {covered} of {required} bins present")]
    IncompleteCoverage { required: usize, covered: usize },
    #[error("insufficient activity: wanted {wanted} windows, filled {filled} after {attempts} fallback draws")]
    InsufficientActivity {
        wanted: usize,
        filled: usize,
        attempts: usize,
    },
    #[error("recording has no channel coverage")]
    EmptyRecording,
    #[error("malformed stream `{channel_id}`: {reason}")]
    MalformedStream { channel_id: String, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FrameError {
    /// The caller may retry once more data lands.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FrameError::IncompleteCoverage { .. })
    }
}

/// A fatal engine error tagged with the request it aborted.
#[derive(Debug, Clone, Error)]
#[error("{key}: {source}")]
pub struct DetectionError {
    pub key: SessionKey,
    #[source]
    pub source: FrameError,
}

impl DetectionError {
    pub fn new(key: SessionKey, source: FrameError) -> Self {
        Self { key, source }
    }

    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}
