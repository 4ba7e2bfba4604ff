//! Loader error types.

use guds_core::loading::LoadFailure;
use guds_core::types::LoadId;
use thiserror::Error;

/// Errors raised while resolving or reading a package.
#[derive(Debug, Error)]
pub enum LoadError {
    /// No package file for this id.
    #[error("Package not found: {0}")]
    NotFound(LoadId),

    /// Reading the package failed.
    #[error("I/O error reading package: {0}")]
    Io(#[from] std::io::Error),

    /// The package was read but is not a valid bank.
    #[error("Failed to parse bank package {load_id}: {reason}")]
    Parse {
        /// Package that failed to parse.
        load_id: LoadId,
        /// Parser message.
        reason: String,
    },
}

impl From<LoadError> for LoadFailure {
    fn from(err: LoadError) -> Self {
        LoadFailure::new(err)
    }
}
