//! Storage trait definitions.

use crate::errors::{Result, StorageError};
use async_trait::async_trait;

/// Versioned key-value secret store
///
/// Paths are relative to the store's KV root and use `/` as separator,
/// e.g. `users/alice/signcerts/cert.pem`. Every write creates a new
/// version of the key.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Write `content` at `path`, returning the new version number
    async fn write(&self, path: &str, content: &str) -> Result<u64>;

    /// Read the current version at `path`
    ///
    /// # Returns
    ///
    /// `Ok(Some(content))` if a live version exists, `Ok(None)` if the key
    /// is absent, soft-deleted or destroyed
    async fn read(&self, path: &str) -> Result<Option<String>>;

    /// List the direct children of `prefix`
    ///
    /// Child folders are returned with a trailing `/` (a directory marker).
    /// An unknown prefix lists as empty.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Version numbers recorded in the metadata of `path`
    async fn versions(&self, path: &str) -> Result<Vec<u64>>;

    /// Soft-delete `path` (metadata delete): the key stops being readable
    /// and listable
    async fn soft_delete(&self, path: &str) -> Result<()>;

    /// Permanently destroy the given versions of `path`
    async fn destroy(&self, path: &str, versions: &[u64]) -> Result<()>;

    /// Check the store is reachable
    async fn health(&self) -> Result<()> {
        Ok(())
    }
}

/// Ledger world-state interface
///
/// One record per key. Values are opaque bytes; callers own the
/// serialization format.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Get the value stored at `key`
    async fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` at `key`, replacing any previous value
    async fn put_state(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove `key` from the world state
    async fn del_state(&self, key: &str) -> Result<()>;
}

/// Join path segments with `/`, validating each one
pub fn join_path(segments: &[&str]) -> Result<String> {
    let joined = segments.join("/");
    validate_path(&joined)?;
    Ok(joined)
}

/// Reject empty, absolute and relative (`.`/`..`) path segments
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() || path.starts_with('/') {
        return Err(StorageError::InvalidPath(path.to_string()));
    }

    let trimmed = path.strip_suffix('/').unwrap_or(path);
    for segment in trimmed.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
    }

    Ok(())
}
