//! # fabric-id-storage
//!
//! Storage interfaces consumed by the credential issuer and the identity
//! record contract, with their backends:
//!
//! - [`SecretStore`]: versioned key-value secrets (Vault KV v2, in-memory)
//! - [`LedgerStore`]: ledger world state (RocksDB, in-memory)

#![warn(clippy::all)]

pub mod errors;
pub mod memory;
pub mod rocksdb_impl;
pub mod traits;
pub mod vault;

pub use errors::{Result, StorageError};
pub use memory::{InMemoryLedgerStore, InMemorySecretStore};
pub use rocksdb_impl::RocksDbLedgerStore;
pub use traits::{join_path, validate_path, LedgerStore, SecretStore};
pub use vault::{VaultConfig, VaultSecretStore};
