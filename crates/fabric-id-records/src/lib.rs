//! # fabric-id-records
//!
//! Identity records kept in the ledger world state.
//!
//! Records are keyed by a caller-assigned `id` and owned by the identity that
//! created them:
//! - creation requires the caller's certificate to carry `identity.id == id`
//! - the resolved caller identity becomes the immutable `owner`
//! - only the owner may update or delete
//!
//! The [`IdentityContract`] exposes the operations as named transactions and
//! a [`LedgerGateway`] submits or evaluates them on behalf of a forwarded
//! certificate. The certificate must match the forwarded key and be issued by
//! one of the organization's [`TrustAnchors`].

#![warn(clippy::all)]

pub mod contract;
pub mod errors;
pub mod gateway;
pub mod identity;
pub mod service;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod traits;
pub mod trust;
pub mod types;

pub use contract::{IdentityContract, Transaction};
pub use errors::{RecordError, Result};
pub use gateway::{GatewayIdentity, InProcessGateway, LedgerGateway, ATTRIBUTE_EXTENSION_OID};
pub use identity::{ClientIdentity, IDENTITY_ID_ATTRIBUTE};
pub use service::LedgerRecordStore;
pub use traits::IdentityLedger;
pub use trust::TrustAnchors;
pub use types::{IdentityPatch, IdentityRecord};
