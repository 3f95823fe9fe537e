//! Error types for the journey layer.

use flowpath::FlowError;
use playback::{AssessmentError, PlaybackError};

/// Errors raised by a [`crate::store::ProgressStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Flow does not exist
    #[error("Flow not found: {0}")]
    FlowNotFound(String),

    /// Store rejected the write
    #[error("Write rejected: {0}")]
    Rejected(String),

    /// Payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Errors loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Journey errors.
///
/// Persistence failures after a completion are not errors here; they are
/// reported on [`crate::CompletionReport`] so the learner is never blocked.
#[derive(Debug, thiserror::Error)]
pub enum JourneyError {
    /// The flow could not be loaded; no journey state exists
    #[error("Couldn't load this flow: {0}")]
    Load(#[source] StoreError),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Assessment(#[from] AssessmentError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for journey operations.
pub type Result<T> = std::result::Result<T, JourneyError>;
