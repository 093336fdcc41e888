//! Ledger record store implementation.

use crate::{errors::*, identity::ClientIdentity, traits::*, types::*};
use async_trait::async_trait;
use fabric_id_storage::LedgerStore;
use std::sync::Arc;

mod records;

/// Identity records over a ledger world state
pub struct LedgerRecordStore<S>
where
    S: LedgerStore,
{
    ledger: Arc<S>,
}

impl<S> LedgerRecordStore<S>
where
    S: LedgerStore,
{
    /// Create a record store over `ledger`
    pub fn new(ledger: Arc<S>) -> Self {
        Self { ledger }
    }

    /// The underlying world state
    pub fn ledger(&self) -> &Arc<S> {
        &self.ledger
    }
}

#[async_trait]
impl<S> IdentityLedger for LedgerRecordStore<S>
where
    S: LedgerStore + 'static,
{
    async fn create(
        &self,
        record: IdentityRecord,
        caller: &ClientIdentity,
    ) -> Result<IdentityRecord> {
        self.create_internal(record, caller).await
    }

    async fn read(&self, id: &str) -> Result<IdentityRecord> {
        self.read_internal(id).await
    }

    async fn update(
        &self,
        id: &str,
        patch: IdentityPatch,
        caller: &ClientIdentity,
    ) -> Result<IdentityRecord> {
        self.update_internal(id, patch, caller).await
    }

    async fn delete(&self, id: &str, caller: &ClientIdentity) -> Result<()> {
        self.delete_internal(id, caller).await
    }
}
