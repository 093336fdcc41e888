//! Issuance request and saga bookkeeping types.

use serde::Serialize;
use std::fmt;
use zeroize::Zeroizing;

/// Request to issue a credential for a new network participant
#[derive(Clone, Default)]
pub struct CredentialRequest {
    /// Enrollment id, unique per CA
    pub username: String,
    /// Enrollment secret; generated when empty
    pub password: Zeroizing<String>,
    /// Identity record id bound into the certificate
    pub user_id: String,
}

impl fmt::Debug for CredentialRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRequest")
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Enrollment id and secret of a registered participant
#[derive(Clone)]
pub struct IssuedCredentials {
    pub username: String,
    pub password: Zeroizing<String>,
}

impl fmt::Debug for IssuedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Position of an issuance saga
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaState {
    Start,
    Registered,
    Enrolled,
    Persisted,
    Compensating,
    Revoked,
}

impl SagaState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Persisted | SagaState::Revoked)
    }
}

/// Steps that completed before the saga ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SagaOutcome {
    pub registered: bool,
    pub enrolled: bool,
    pub persisted: bool,
}

/// A rollback step that failed after a saga step failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompensationFailure {
    /// Why compensation ran, e.g. `enrollment failed`
    pub reason: String,
    /// CA revocation error, if revocation failed
    pub revoke_error: Option<String>,
    /// Secret cleanup error, if removing written material failed
    pub cleanup_error: Option<String>,
}

/// Final state of one saga execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SagaReport {
    pub username: String,
    pub state: SagaState,
    pub outcome: SagaOutcome,
    pub compensation: Option<CompensationFailure>,
}

impl SagaReport {
    pub(crate) fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            state: SagaState::Start,
            outcome: SagaOutcome::default(),
            compensation: None,
        }
    }

    /// True once the saga can make no further progress
    ///
    /// Besides `Persisted` and `Revoked`, a saga whose registration was refused
    /// stops at `Start`: nothing exists at the CA or in the secret store.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal() || (self.state == SagaState::Start && !self.outcome.registered)
    }

    /// True when a rollback step failed and material may be left behind
    pub fn compensation_failed(&self) -> bool {
        self.compensation.is_some()
    }
}
