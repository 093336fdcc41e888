//! Identity record trait definitions.

use crate::{errors::Result, identity::ClientIdentity, types::*};
use async_trait::async_trait;

/// Ownership-gated identity record operations
#[async_trait]
pub trait IdentityLedger: Send + Sync {
    /// Create a record owned by the submitting caller
    ///
    /// The caller must carry an `identity.id` attribute equal to `record.id`.
    /// Any caller-supplied `owner` is replaced.
    async fn create(&self, record: IdentityRecord, caller: &ClientIdentity)
        -> Result<IdentityRecord>;

    /// Read the record stored at `id`
    async fn read(&self, id: &str) -> Result<IdentityRecord>;

    /// Apply the non-empty fields of `patch` to the record at `id`
    ///
    /// Only the record owner may update.
    async fn update(
        &self,
        id: &str,
        patch: IdentityPatch,
        caller: &ClientIdentity,
    ) -> Result<IdentityRecord>;

    /// Remove the record at `id`
    ///
    /// Only the record owner may delete.
    async fn delete(&self, id: &str, caller: &ClientIdentity) -> Result<()>;
}
