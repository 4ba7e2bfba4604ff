//! Integration-layer error types.

use thiserror::Error;

/// Errors from the debug surface.
#[derive(Debug, Error)]
pub enum GameError {
    /// The command string did not parse.
    #[error("Unrecognised debug command: {0}")]
    BadCommand(String),

    /// No speaker name matched.
    #[error("No speaker matching \"{0}\"")]
    SpeakerNotFound(String),

    /// The speaker exists but has no bank.
    #[error("Speaker \"{0}\" is not registered with a bank")]
    NoBank(String),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, GameError>;
