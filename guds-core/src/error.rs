//! Error types for the GUDS core library.
//!
//! None of these reach gameplay. The [`crate::DialogueManager`] facade logs
//! them and degrades to silence; only constructors that parse data files
//! return them to the caller.

use thiserror::Error;

use crate::types::{EventId, LoadId, SpeakerId};

/// Top-level error type for all GUDS operations.
#[derive(Error, Debug)]
pub enum GudsError {
    /// The bank name has no entry in the catalog.
    #[error("Bank not in catalog: {0}")]
    CatalogMiss(String),

    /// The catalog entry exists but has no descriptor at that slot.
    #[error("Bank {bank} has no slot {slot}")]
    SlotOutOfRange {
        /// Bank name.
        bank: String,
        /// Requested slot index (0 = root).
        slot: usize,
    },

    /// No package for the bank could be found by the load service.
    #[error("Load failure for {load_id}: {reason}")]
    LoadFailure {
        /// Package that failed.
        load_id: LoadId,
        /// Reported reason.
        reason: String,
    },

    /// An event id with no properties in the event table.
    #[error("Unknown event: {0}")]
    UnknownEvent(EventId),

    /// A speaker handle no longer resolves in the world.
    #[error("Speaker vanished: {0:?}")]
    SpeakerVanished(SpeakerId),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, GudsError>;
