//! Pipeline error types.

use thiserror::Error;

use sluice_core::StoreError;

/// Errors from registry and configuration operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No stream is registered under this destination.
    #[error("unknown destination: {0}")]
    UnknownDestination(String),

    /// A stream is already registered under this destination.
    #[error("destination already registered: {0}")]
    DuplicateDestination(String),

    /// A stream property could not be parsed or validated.
    #[error("invalid value for '{key}': {message}")]
    InvalidProperty {
        /// The offending property key.
        key: String,
        /// What went wrong.
        message: String,
    },

    /// An underlying store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
