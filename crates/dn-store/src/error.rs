//! Storage error types.

use dn_core::AuthStatus;
use thiserror::Error;

/// Errors that can occur during credential-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No credential file exists for the record.
    #[error("no stored credential for record")]
    NotFound,

    /// The file content is not a recognizable credential record.
    #[error("corrupt credential file: {0}")]
    Corrupt(&'static str),

    /// An underlying filesystem operation failed.
    #[error("credential store I/O failure")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for AuthStatus {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::Corrupt(_) => Self::InvalidBufferFormat,
            StoreError::Io(_) => Self::MemoryError,
        }
    }
}
