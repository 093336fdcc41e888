//! Credential issuer error types.

use crate::types::SagaReport;
use fabric_id_storage::StorageError;
use thiserror::Error;

/// Credential bundle mapping errors
#[derive(Debug, Error)]
pub enum MapperError {
    /// A required category has no entries
    #[error("Required category missing: {0}")]
    CategoryMissing(&'static str),

    /// A listing entry or payload does not have the expected shape
    #[error("Malformed entry: {0}")]
    MalformedEntry(String),

    /// Reading a staged bundle from disk failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Certificate authority client errors
#[derive(Debug, Error)]
pub enum CaError {
    /// The CA client process could not be started
    #[error("Failed to run CA client for {operation}: {source}")]
    Spawn {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The CA rejected the request
    #[error("CA {operation} failed ({status}): {output}")]
    CommandFailed {
        operation: &'static str,
        status: String,
        output: String,
    },

    /// The CA did not answer within the configured timeout
    #[error("CA {operation} timed out after {seconds}s")]
    Timeout { operation: &'static str, seconds: u64 },

    /// The staging area for enrollment output could not be prepared
    #[error("Staging error: {0}")]
    Staging(String),
}

/// Credential issuer errors
#[derive(Debug, Error)]
pub enum IssuerError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Registration failed: {0}")]
    Registration(#[source] CaError),

    #[error("Enrollment failed: {0}")]
    Enrollment(#[source] CaError),

    #[error("Revocation failed: {0}")]
    Revocation(#[source] CaError),

    #[error("Storage failed: {0}")]
    Persistence(#[source] StorageError),

    #[error("Secret cleanup failed: {0}")]
    SecretCleanup(#[source] StorageError),

    #[error("Credential bundle error: {0}")]
    Mapper(#[from] MapperError),

    #[error("No credential material stored for {0}")]
    NotFound(String),

    #[error("Secret store error: {0}")]
    Storage(#[from] StorageError),
}

/// A saga step failed; compensation has run
///
/// Displays as the original failure. The report tells whether the rollback
/// itself completed.
#[derive(Debug, Error)]
#[error("{cause}")]
pub struct SagaFailure {
    #[source]
    pub cause: IssuerError,
    pub report: SagaReport,
}

/// Result type for issuer operations
pub type Result<T> = std::result::Result<T, IssuerError>;
