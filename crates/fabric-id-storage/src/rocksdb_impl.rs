//! RocksDB ledger world-state implementation.

use crate::{
    errors::{Result, StorageError},
    traits::LedgerStore,
};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, Options, DB};
use std::{path::Path, sync::Arc};
use tracing::{debug, info};

/// Column family holding record key → serialized record
pub const WORLD_STATE_CF: &str = "world_state";

fn backend(e: rocksdb::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// RocksDB-backed [`LedgerStore`]
///
/// Keys are written as their UTF-8 bytes into the [`WORLD_STATE_CF`]
/// family. Values are opaque.
pub struct RocksDbLedgerStore {
    db: Arc<DB>,
}

impl RocksDbLedgerStore {
    /// Open (or create) the world state at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf(&opts, path.as_ref(), [WORLD_STATE_CF]).map_err(backend)?;
        info!(path = %path.as_ref().display(), "World state opened");

        Ok(Self { db: Arc::new(db) })
    }

    /// Open a store backed by a throwaway directory
    ///
    /// The directory lives as long as the returned guard.
    pub fn open_temp() -> Result<(Self, tempfile::TempDir)> {
        let dir = tempfile::Builder::new().prefix("world-state-").tempdir()?;
        Self::open(dir.path()).map(|store| (store, dir))
    }

    fn world_state(&self) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(WORLD_STATE_CF)
            .ok_or_else(|| StorageError::InvalidColumnFamily(WORLD_STATE_CF.to_string()))
    }
}

#[async_trait]
impl LedgerStore for RocksDbLedgerStore {
    async fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let cf = self.world_state()?;
        self.db.get_cf(cf, key).map_err(backend)
    }

    async fn put_state(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let cf = self.world_state()?;
        self.db.put_cf(cf, key, value).map_err(backend)?;
        debug!(key, "World state written");
        Ok(())
    }

    async fn del_state(&self, key: &str) -> Result<()> {
        let cf = self.world_state()?;
        self.db.delete_cf(cf, key).map_err(backend)?;
        debug!(key, "World state key removed");
        Ok(())
    }
}
