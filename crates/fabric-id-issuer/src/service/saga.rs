//! Issuance saga: register, enroll, persist, with compensation.

use crate::{
    ca::{CertificateAuthorityClient, StagedBundle},
    errors::*,
    types::*,
};
use fabric_id_storage::SecretStore;
use tracing::{error, info, warn};

use super::CredentialIssuer;

/// Compensation reason after a failed enrollment
pub const ENROLLMENT_FAILED: &str = "enrollment failed";

/// Compensation reason after a failed write to the secret store
pub const STORAGE_FAILED: &str = "storage failed";

impl<C, S> CredentialIssuer<C, S>
where
    C: CertificateAuthorityClient + ?Sized,
    S: SecretStore + ?Sized,
{
    /// Register, enroll and persist a new participant
    ///
    /// Either every step completes, or the saga compensates and ends in
    /// [`SagaState::Revoked`]. A failed registration has nothing to undo.
    pub async fn issue_and_persist(
        &self,
        request: CredentialRequest,
    ) -> std::result::Result<IssuedCredentials, SagaFailure> {
        let mut report = SagaReport::new(&request.username);

        let issued = match self.register(request).await {
            Ok(issued) => issued,
            Err(cause) => return Err(SagaFailure { cause, report }),
        };
        report.state = SagaState::Registered;
        report.outcome.registered = true;

        let staged = match self.enroll(&issued.username, &issued.password).await {
            Ok(staged) => staged,
            Err(cause) => return Err(self.abort(report, cause, ENROLLMENT_FAILED).await),
        };
        report.state = SagaState::Enrolled;
        report.outcome.enrolled = true;

        if let Err(cause) = self.persist_staged(&issued.username, staged).await {
            return Err(self.abort(report, cause, STORAGE_FAILED).await);
        }
        report.state = SagaState::Persisted;
        report.outcome.persisted = true;

        info!("Issued credentials for {}", issued.username);
        Ok(issued)
    }

    /// Enroll an already registered participant and persist its bundle
    ///
    /// A rejected enrollment leaves the registration in place. A failed
    /// write is compensated like in [`Self::issue_and_persist`].
    pub async fn enroll_and_persist(
        &self,
        username: &str,
        password: &str,
    ) -> std::result::Result<SagaReport, SagaFailure> {
        let mut report = SagaReport::new(username);
        report.state = SagaState::Registered;
        report.outcome.registered = true;

        let staged = match self.enroll(username, password).await {
            Ok(staged) => staged,
            Err(cause) => return Err(SagaFailure { cause, report }),
        };
        report.state = SagaState::Enrolled;
        report.outcome.enrolled = true;

        if let Err(cause) = self.persist_staged(username, staged).await {
            return Err(self.abort(report, cause, STORAGE_FAILED).await);
        }
        report.state = SagaState::Persisted;
        report.outcome.persisted = true;

        Ok(report)
    }

    /// Best-effort rollback: revoke at the CA, then remove stored material
    ///
    /// Failures are logged and returned, never raised.
    pub async fn compensate(&self, username: &str, reason: &str) -> Option<CompensationFailure> {
        warn!("Compensating issuance of {}: {}", username, reason);

        let revoke_error = match self.ca.revoke(username, reason).await {
            Ok(()) => None,
            Err(e) => {
                error!("Compensating revocation of {} failed: {}", username, e);
                Some(e.to_string())
            }
        };
        let cleanup_error = match self.purge_secrets(username).await {
            Ok(()) => None,
            Err(e) => {
                error!("Compensating secret cleanup of {} failed: {}", username, e);
                Some(e.to_string())
            }
        };

        if revoke_error.is_none() && cleanup_error.is_none() {
            return None;
        }
        Some(CompensationFailure {
            reason: reason.to_string(),
            revoke_error,
            cleanup_error,
        })
    }

    async fn persist_staged(&self, username: &str, staged: StagedBundle) -> Result<()> {
        let bundle = staged.load()?;
        drop(staged);
        self.persist_bundle(username, &bundle).await
    }

    async fn abort(&self, mut report: SagaReport, cause: IssuerError, reason: &str) -> SagaFailure {
        warn!("Issuance of {} failed: {}", report.username, cause);
        report.state = SagaState::Compensating;
        report.compensation = self.compensate(&report.username, reason).await;
        report.state = SagaState::Revoked;
        SagaFailure { cause, report }
    }
}
