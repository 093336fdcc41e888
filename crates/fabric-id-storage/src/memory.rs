//! In-memory store implementations.
//!
//! Used for local development and as injectable fakes in tests of the
//! issuer, record and server crates.

use crate::{
    errors::{Result, StorageError},
    traits::{validate_path, LedgerStore, SecretStore},
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct SecretVersions {
    versions: BTreeMap<u64, Option<String>>,
    deleted: bool,
}

impl SecretVersions {
    fn current(&self) -> Option<&String> {
        if self.deleted {
            return None;
        }
        self.versions.values().next_back().and_then(|v| v.as_ref())
    }

    fn is_gone(&self) -> bool {
        self.deleted || self.versions.values().all(|v| v.is_none())
    }
}

/// Versioned in-memory secret store with KV v2 semantics
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    secrets: Mutex<BTreeMap<String, SecretVersions>>,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

impl InMemorySecretStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `write` fail with a backend error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `soft_delete` and `destroy` fail
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Paths that are currently readable
    pub fn live_paths(&self) -> Vec<String> {
        let secrets = self.lock();
        secrets
            .iter()
            .filter(|(_, s)| !s.is_gone())
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Paths that still hold any undestroyed version, deleted or not
    pub fn retained_paths(&self) -> Vec<String> {
        let secrets = self.lock();
        secrets
            .iter()
            .filter(|(_, s)| s.versions.values().any(|v| v.is_some()))
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, SecretVersions>> {
        // A poisoned lock only means a panicking test thread; the map is still consistent.
        self.secrets.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_deletes(&self) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("delete rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn write(&self, path: &str, content: &str) -> Result<u64> {
        validate_path(path)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("write rejected: {}", path)));
        }

        let mut secrets = self.lock();
        let entry = secrets.entry(path.to_string()).or_default();
        let version = entry.versions.keys().next_back().copied().unwrap_or(0) + 1;
        entry.versions.insert(version, Some(content.to_string()));
        entry.deleted = false;

        debug!("Stored secret {} version {}", path, version);
        Ok(version)
    }

    async fn read(&self, path: &str) -> Result<Option<String>> {
        validate_path(path)?;
        let secrets = self.lock();
        Ok(secrets.get(path).and_then(|s| s.current().cloned()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        validate_path(prefix)?;
        let folder = format!("{}/", prefix.trim_end_matches('/'));

        let secrets = self.lock();
        let mut children = BTreeSet::new();
        for (path, secret) in secrets.range(folder.clone()..) {
            let Some(rest) = path.strip_prefix(&folder) else {
                break;
            };
            if secret.is_gone() {
                continue;
            }
            match rest.split_once('/') {
                Some((dir, _)) => children.insert(format!("{}/", dir)),
                None => children.insert(rest.to_string()),
            };
        }

        Ok(children.into_iter().collect())
    }

    async fn versions(&self, path: &str) -> Result<Vec<u64>> {
        validate_path(path)?;
        let secrets = self.lock();
        Ok(secrets
            .get(path)
            .map(|s| s.versions.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn soft_delete(&self, path: &str) -> Result<()> {
        validate_path(path)?;
        self.check_deletes()?;

        let mut secrets = self.lock();
        if let Some(secret) = secrets.get_mut(path) {
            secret.deleted = true;
        }
        Ok(())
    }

    async fn destroy(&self, path: &str, versions: &[u64]) -> Result<()> {
        validate_path(path)?;
        self.check_deletes()?;

        let mut secrets = self.lock();
        if let Some(secret) = secrets.get_mut(path) {
            for version in versions {
                if let Some(slot) = secret.versions.get_mut(version) {
                    *slot = None;
                }
            }
            if secret.versions.values().all(|v| v.is_none()) {
                secrets.remove(path);
            }
        }
        Ok(())
    }
}

/// In-memory ledger world state
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: Mutex<HashMap<String, Vec<u8>>>,
    writes: std::sync::atomic::AtomicUsize,
}

impl InMemoryLedgerStore {
    /// Create an empty world state
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put_state`/`del_state` calls served so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn put_state(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn del_state(&self, key: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.lock().remove(key);
        Ok(())
    }
}
