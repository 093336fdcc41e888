//! Named-transaction dispatch for the identity contract.
//!
//! Ledger clients invoke the contract by transaction name with string
//! arguments and receive JSON bytes back, the same shape a submitted or
//! evaluated chaincode transaction has.

use crate::{
    errors::{RecordError, Result},
    identity::ClientIdentity,
    traits::IdentityLedger,
    types::{IdentityPatch, IdentityRecord},
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Transactions exposed by [`IdentityContract`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transaction {
    CreateIdentity,
    UpdateIdentity,
    DeleteIdentity,
    ReadIdentity,
}

impl Transaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transaction::CreateIdentity => "CreateIdentity",
            Transaction::UpdateIdentity => "UpdateIdentity",
            Transaction::DeleteIdentity => "DeleteIdentity",
            Transaction::ReadIdentity => "ReadIdentity",
        }
    }

    /// Reads are evaluated; everything else must be submitted for ordering
    pub fn is_read_only(&self) -> bool {
        matches!(self, Transaction::ReadIdentity)
    }

    fn arity(&self) -> usize {
        match self {
            Transaction::UpdateIdentity => 2,
            _ => 1,
        }
    }
}

impl FromStr for Transaction {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CreateIdentity" => Ok(Transaction::CreateIdentity),
            "UpdateIdentity" => Ok(Transaction::UpdateIdentity),
            "DeleteIdentity" => Ok(Transaction::DeleteIdentity),
            "ReadIdentity" => Ok(Transaction::ReadIdentity),
            other => Err(RecordError::UnknownTransaction(other.to_string())),
        }
    }
}

/// Identity contract over an [`IdentityLedger`]
pub struct IdentityContract<L>
where
    L: IdentityLedger,
{
    records: Arc<L>,
}

impl<L> IdentityContract<L>
where
    L: IdentityLedger,
{
    pub fn new(records: Arc<L>) -> Self {
        Self { records }
    }

    /// Run transaction `tx` with string `args` on behalf of `caller`
    ///
    /// # Arguments
    ///
    /// * `CreateIdentity` - `[record_json]`
    /// * `UpdateIdentity` - `[id, patch_json]`
    /// * `DeleteIdentity` - `[id]`
    /// * `ReadIdentity` - `[id]`
    ///
    /// # Returns
    ///
    /// JSON of the resulting record, or empty bytes for a delete
    pub async fn invoke(
        &self,
        tx: Transaction,
        args: &[String],
        caller: &ClientIdentity,
    ) -> Result<Vec<u8>> {
        if args.len() != tx.arity() {
            return Err(RecordError::Validation(format!(
                "{} expects {} argument(s), got {}",
                tx.as_str(),
                tx.arity(),
                args.len()
            )));
        }
        debug!("Invoking {}", tx.as_str());

        match tx {
            Transaction::CreateIdentity => {
                let record: IdentityRecord = parse_json(&args[0])?;
                let created = self.records.create(record, caller).await?;
                Ok(serde_json::to_vec(&created)?)
            }
            Transaction::UpdateIdentity => {
                let patch: IdentityPatch = parse_json(&args[1])?;
                let updated = self.records.update(&args[0], patch, caller).await?;
                Ok(serde_json::to_vec(&updated)?)
            }
            Transaction::DeleteIdentity => {
                self.records.delete(&args[0], caller).await?;
                Ok(Vec::new())
            }
            Transaction::ReadIdentity => {
                let record = self.records.read(&args[0]).await?;
                Ok(serde_json::to_vec(&record)?)
            }
        }
    }

    /// Resolve `name` and invoke it
    pub async fn invoke_named(
        &self,
        name: &str,
        args: &[String],
        caller: &ClientIdentity,
    ) -> Result<Vec<u8>> {
        self.invoke(name.parse()?, args, caller).await
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| RecordError::Validation(format!("malformed record document: {}", e)))
}
