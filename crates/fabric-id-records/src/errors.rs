//! Identity record error types.

use thiserror::Error;

/// Identity record errors
#[derive(Debug, Error)]
pub enum RecordError {
    /// A required field is missing or malformed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A record already exists at the key
    #[error("Identity already exists: {0}")]
    AlreadyExists(String),

    /// The submitting caller does not own or match the record
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No record at the key
    #[error("Identity not found: {0}")]
    NotFound(String),

    /// The caller identity could not be resolved
    #[error("Identity resolution failed: {0}")]
    IdentityResolution(String),

    /// Forwarded certificate or key material is unusable
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Transaction name not exposed by the contract
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    /// Record (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Ledger world-state error
    #[error("Ledger error: {0}")]
    Ledger(#[from] fabric_id_storage::StorageError),
}

impl From<serde_json::Error> for RecordError {
    fn from(e: serde_json::Error) -> Self {
        RecordError::Serialization(e.to_string())
    }
}

/// Result type for identity record operations
pub type Result<T> = std::result::Result<T, RecordError>;
