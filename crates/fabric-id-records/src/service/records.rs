//! Identity record CRUD operations.

use crate::{
    errors::*,
    identity::{ClientIdentity, IDENTITY_ID_ATTRIBUTE},
    types::*,
};
use fabric_id_storage::LedgerStore;
use tracing::{debug, info};

use super::LedgerRecordStore;

impl<S> LedgerRecordStore<S>
where
    S: LedgerStore + 'static,
{
    /// Validate, bind the caller as owner and write a new record
    pub(crate) async fn create_internal(
        &self,
        mut record: IdentityRecord,
        caller: &ClientIdentity,
    ) -> Result<IdentityRecord> {
        if let Some(field) = record.first_missing_field() {
            return Err(RecordError::Validation(format!("{} is required", field)));
        }

        caller.assert_attribute_value(IDENTITY_ID_ATTRIBUTE, &record.id)?;
        let owner = caller.resolve_id()?;

        if self.ledger.get_state(&record.id).await?.is_some() {
            return Err(RecordError::AlreadyExists(record.id));
        }

        info!("Creating identity record: {}", record.id);
        record.owner = owner;
        self.put_record(&record).await?;

        info!("Identity record created: {}", record.id);
        Ok(record)
    }

    /// Get a record by id
    pub(crate) async fn read_internal(&self, id: &str) -> Result<IdentityRecord> {
        require_id(id)?;
        let bytes = self
            .ledger
            .get_state(id)
            .await?
            .ok_or_else(|| RecordError::NotFound(id.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Merge a patch into a record owned by the caller
    pub(crate) async fn update_internal(
        &self,
        id: &str,
        patch: IdentityPatch,
        caller: &ClientIdentity,
    ) -> Result<IdentityRecord> {
        let mut record = self.read_internal(id).await?;
        ensure_owner(&record, caller)?;

        if patch.is_empty() {
            debug!("Empty patch for identity record {}, nothing to write", id);
            return Ok(record);
        }

        patch.apply_to(&mut record);
        self.put_record(&record).await?;

        info!("Identity record updated: {}", id);
        Ok(record)
    }

    /// Remove a record owned by the caller
    pub(crate) async fn delete_internal(&self, id: &str, caller: &ClientIdentity) -> Result<()> {
        let record = self.read_internal(id).await?;
        ensure_owner(&record, caller)?;

        self.ledger.del_state(id).await?;

        info!("Identity record deleted: {}", id);
        Ok(())
    }

    async fn put_record(&self, record: &IdentityRecord) -> Result<()> {
        let bytes = serde_json::to_vec(record)?;
        self.ledger.put_state(&record.id, bytes).await?;
        Ok(())
    }
}

fn require_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(RecordError::Validation("id is required".to_string()));
    }
    Ok(())
}

fn ensure_owner(record: &IdentityRecord, caller: &ClientIdentity) -> Result<()> {
    let caller_id = caller.resolve_id()?;
    if caller_id != record.owner {
        return Err(RecordError::Unauthorized(format!(
            "caller does not own identity {}",
            record.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::IdentityLedger;
    use fabric_id_storage::InMemoryLedgerStore;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn caller(canonical: &str, bound_id: &str) -> ClientIdentity {
        ClientIdentity::from_canonical(
            canonical,
            BTreeMap::from([(IDENTITY_ID_ATTRIBUTE.to_string(), bound_id.to_string())]),
        )
    }

    fn record(id: &str) -> IdentityRecord {
        IdentityRecord {
            id: id.to_string(),
            first_name: "A".to_string(),
            phone: "555".to_string(),
            national_id: "N1".to_string(),
            ..Default::default()
        }
    }

    fn store() -> (LedgerRecordStore<InMemoryLedgerStore>, Arc<InMemoryLedgerStore>) {
        let ledger = Arc::new(InMemoryLedgerStore::new());
        (LedgerRecordStore::new(ledger.clone()), ledger)
    }

    #[tokio::test]
    async fn test_create_binds_caller_as_owner() {
        let (records, _) = store();
        let alice = caller("x509::CN=u1::CN=ca", "u1");

        let mut input = record("u1");
        input.owner = "someone else".to_string();
        let created = records.create(input, &alice).await.unwrap();
        assert_eq!(created.owner, "x509::CN=u1::CN=ca");

        let read = records.read("u1").await.unwrap();
        assert_eq!(read, created);
        assert_eq!(read.first_name, "A");
        assert_eq!(read.national_id, "N1");
    }

    #[tokio::test]
    async fn test_create_missing_phone_writes_nothing() {
        let (records, ledger) = store();
        let alice = caller("x509::CN=u1::CN=ca", "u1");

        let mut input = record("u1");
        input.phone.clear();
        let result = records.create(input, &alice).await;

        assert!(matches!(result, Err(RecordError::Validation(m)) if m.contains("phone")));
        assert_eq!(ledger.write_count(), 0);
    }

    #[tokio::test]
    async fn test_create_requires_matching_identity_attribute() {
        let (records, ledger) = store();
        let mallory = caller("x509::CN=u2::CN=ca", "u2");

        let result = records.create(record("u1"), &mallory).await;
        assert!(matches!(result, Err(RecordError::Unauthorized(_))));

        let unbound = ClientIdentity::from_canonical("x509::CN=u1::CN=ca", BTreeMap::new());
        assert!(records.create(record("u1"), &unbound).await.is_err());
        assert_eq!(ledger.write_count(), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_existing_id() {
        let (records, ledger) = store();
        let alice = caller("x509::CN=u1::CN=ca", "u1");
        records.create(record("u1"), &alice).await.unwrap();

        // A second certificate bound to the same id must not take over the record.
        let other = caller("x509::CN=u1-new::CN=ca", "u1");
        let result = records.create(record("u1"), &other).await;
        assert!(matches!(result, Err(RecordError::AlreadyExists(id)) if id == "u1"));

        assert_eq!(records.read("u1").await.unwrap().owner, "x509::CN=u1::CN=ca");
        assert_eq!(ledger.write_count(), 1);
    }

    #[tokio::test]
    async fn test_read_missing_and_empty_id() {
        let (records, _) = store();
        assert!(matches!(
            records.read("nobody").await,
            Err(RecordError::NotFound(_))
        ));
        assert!(matches!(
            records.read("").await,
            Err(RecordError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_by_non_owner_leaves_record_unchanged() {
        let (records, _) = store();
        let alice = caller("x509::CN=u1::CN=ca", "u1");
        let bob = caller("x509::CN=u2::CN=ca", "u1");
        records.create(record("u1"), &alice).await.unwrap();

        let patch = IdentityPatch {
            first_name: Some("B".to_string()),
            ..Default::default()
        };
        let result = records.update("u1", patch, &bob).await;
        assert!(matches!(result, Err(RecordError::Unauthorized(_))));

        assert_eq!(records.read("u1").await.unwrap().first_name, "A");
    }

    #[tokio::test]
    async fn test_update_applies_only_present_fields() {
        let (records, _) = store();
        let alice = caller("x509::CN=u1::CN=ca", "u1");
        let mut input = record("u1");
        input.email = "a@example.com".to_string();
        records.create(input, &alice).await.unwrap();

        let patch = IdentityPatch {
            last_name: Some("L".to_string()),
            phone: Some(String::new()),
            ..Default::default()
        };
        let updated = records.update("u1", patch, &alice).await.unwrap();

        assert_eq!(updated.id, "u1");
        assert_eq!(updated.owner, "x509::CN=u1::CN=ca");
        assert_eq!(updated.first_name, "A");
        assert_eq!(updated.last_name, "L");
        assert_eq!(updated.phone, "555");
        assert_eq!(updated.email, "a@example.com");
        assert_eq!(records.read("u1").await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let (records, _) = store();
        let alice = caller("x509::CN=u1::CN=ca", "u1");
        let result = records
            .update("u1", IdentityPatch::default(), &alice)
            .await;
        assert!(matches!(result, Err(RecordError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_is_owner_only() {
        let (records, _) = store();
        let alice = caller("x509::CN=u1::CN=ca", "u1");
        let bob = caller("x509::CN=u2::CN=ca", "u2");
        records.create(record("u1"), &alice).await.unwrap();

        assert!(matches!(
            records.delete("u1", &bob).await,
            Err(RecordError::Unauthorized(_))
        ));
        assert!(records.read("u1").await.is_ok());

        records.delete("u1", &alice).await.unwrap();
        assert!(matches!(
            records.read("u1").await,
            Err(RecordError::NotFound(_))
        ));
    }
}
