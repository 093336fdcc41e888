//! # fabric-id-issuer
//!
//! Issues credentials for network participants and keeps their MSP bundles
//! in a secret store.
//!
//! Issuance is a saga over independent systems:
//!
//! 1. register the participant at the CA, binding `identity.id`
//! 2. enroll it into a private staging directory
//! 3. flatten the bundle and write it under `users/<username>/`
//!
//! A failed enrollment or write revokes the registration and removes any
//! stored material. Rollback failures are reported on the [`SagaReport`].

#![warn(clippy::all)]

pub mod ca;
pub mod errors;
pub mod mapper;
pub mod service;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod types;

pub use ca::{
    CertificateAuthorityClient, FabricCaCli, FabricCaConfig, Registration, StagedBundle,
};
pub use errors::{CaError, IssuerError, MapperError, Result, SagaFailure};
pub use mapper::{flatten, unflatten, Category, CredentialBundle, EntryPath, FlatSecretEntry};
pub use service::CredentialIssuer;
pub use types::{
    CompensationFailure, CredentialRequest, IssuedCredentials, SagaOutcome, SagaReport, SagaState,
};
