//! Player error taxonomy.

use std::path::PathBuf;

/// Errors surfaced by parsing, loading and driving a recording.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// Unrecognized or malformed recording data.
    #[error("Invalid recording format: {0}")]
    Format(String),

    /// A header declared a version this player cannot read.
    #[error("asciicast v{0} format not supported")]
    UnsupportedVersion(u64),

    #[error("Failed to fetch recording {path}: {source}")]
    Transport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The transport broke after a live stream was opened.
    #[error("Live stream interrupted: {0}")]
    Stream(#[from] std::io::Error),

    #[error("Recording is missing output events")]
    EmptyRecording,

    #[error("Invalid seek target: {0}")]
    InvalidSeekTarget(String),

    /// The session task is gone (dropped or panicked).
    #[error("Player session closed")]
    Closed,
}

impl PlayerError {
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    /// Whether the error leaves the session in the `errored` state.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::InvalidSeekTarget(_))
    }
}

impl From<serde_json::Error> for PlayerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(err.to_string())
    }
}

pub type Result<T, E = PlayerError> = std::result::Result<T, E>;
