//! Credential issuer service implementation.

use crate::{
    ca::{CertificateAuthorityClient, Registration, StagedBundle, CLIENT_ID_TYPE},
    errors::*,
    mapper::{self, Category, CredentialBundle, ISSUER_REVOCATION_PUBLIC_KEY},
    types::*,
};
use fabric_id_storage::{join_path, SecretStore};
use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

mod saga;

pub use saga::{ENROLLMENT_FAILED, STORAGE_FAILED};

/// Root of the per-user secret namespace
pub const USERS_NAMESPACE: &str = "users";

/// Certificate attribute linking a credential to an identity record
pub const IDENTITY_ID_ATTRIBUTE: &str = "identity.id";

const PASSWORD_BYTES: usize = 16;

/// Issues, stores and revokes participant credentials
pub struct CredentialIssuer<C, S>
where
    C: CertificateAuthorityClient + ?Sized,
    S: SecretStore + ?Sized,
{
    ca: Arc<C>,
    secrets: Arc<S>,
    affiliation: String,
}

impl<C, S> CredentialIssuer<C, S>
where
    C: CertificateAuthorityClient + ?Sized,
    S: SecretStore + ?Sized,
{
    /// Create an issuer registering participants under `affiliation`
    pub fn new(ca: Arc<C>, secrets: Arc<S>, affiliation: impl Into<String>) -> Self {
        Self {
            ca,
            secrets,
            affiliation: affiliation.into(),
        }
    }

    /// The secret store credentials are written to
    pub fn secrets(&self) -> &Arc<S> {
        &self.secrets
    }

    /// Register a participant, generating a password when none is given
    pub async fn register(&self, request: CredentialRequest) -> Result<IssuedCredentials> {
        user_namespace(&request.username)?;
        if request.user_id.is_empty() {
            return Err(IssuerError::Validation("user_id is required".to_string()));
        }

        let password = if request.password.is_empty() {
            generate_password()
        } else {
            request.password
        };

        let registration = Registration {
            username: request.username.clone(),
            secret: password.clone(),
            id_type: CLIENT_ID_TYPE.to_string(),
            affiliation: self.affiliation.clone(),
            attributes: vec![identity_attribute(&request.user_id)],
        };

        info!("Registering {}", request.username);
        self.ca
            .register(&registration)
            .await
            .map_err(IssuerError::Registration)?;

        Ok(IssuedCredentials {
            username: request.username,
            password,
        })
    }

    /// Enroll a registered participant into a private staging directory
    pub async fn enroll(&self, username: &str, password: &str) -> Result<StagedBundle> {
        user_namespace(username)?;
        if password.is_empty() {
            return Err(IssuerError::Validation("password is required".to_string()));
        }

        info!("Enrolling {}", username);
        self.ca
            .enroll(username, password)
            .await
            .map_err(IssuerError::Enrollment)
    }

    /// Write every artifact of `bundle` under the user's namespace
    pub async fn persist_bundle(&self, username: &str, bundle: &CredentialBundle) -> Result<()> {
        let namespace = user_namespace(username)?;
        bundle.ensure_complete()?;

        for entry in mapper::flatten(bundle) {
            let path = join_path(&[namespace.as_str(), entry.path.as_str()])
                .map_err(IssuerError::Persistence)?;
            self.secrets
                .write(&path, &mapper::encode_content(&entry.content))
                .await
                .map_err(IssuerError::Persistence)?;
            debug!("Stored {}", path);
        }

        info!("Stored credential bundle for {}", username);
        Ok(())
    }

    /// Read back the stored bundle of a participant
    pub async fn load_bundle(&self, username: &str) -> Result<CredentialBundle> {
        let namespace = user_namespace(username)?;

        let root = self.secrets.list(&namespace).await?;
        if root.is_empty() {
            return Err(IssuerError::NotFound(username.to_string()));
        }

        let mut listing = Vec::new();
        for child in root {
            match child.strip_suffix('/').and_then(Category::from_segment) {
                Some(category) => {
                    let folder = join_path(&[namespace.as_str(), category.as_str()])?;
                    listing.push(child.clone());
                    for name in self.secrets.list(&folder).await? {
                        listing.push(format!("{}{}", child, name));
                    }
                }
                None if child == ISSUER_REVOCATION_PUBLIC_KEY => listing.push(child),
                None => debug!("Ignoring {}/{}", namespace, child),
            }
        }

        let secrets = &self.secrets;
        let namespace = &namespace;
        mapper::unflatten(&listing, &Category::ALL, |path| async move {
            let key = join_path(&[namespace.as_str(), path.as_str()])?;
            Ok::<_, IssuerError>(secrets.read(&key).await?)
        })
        .await
    }

    /// Revoke a participant at the CA and remove its stored material
    ///
    /// Secrets are purged even when the CA rejects the revocation; the CA
    /// failure is still returned.
    pub async fn revoke(&self, username: &str, reason: &str) -> Result<()> {
        user_namespace(username)?;

        info!("Revoking {}: {}", username, reason);
        let revoked = self.ca.revoke(username, reason).await;
        let purged = self.purge_secrets(username).await;

        match (revoked, purged) {
            (Err(e), purged) => {
                if let Err(cleanup) = purged {
                    warn!("Secret cleanup for {} failed: {}", username, cleanup);
                }
                Err(IssuerError::Revocation(e))
            }
            (Ok(()), Err(cleanup)) => Err(IssuerError::SecretCleanup(cleanup)),
            (Ok(()), Ok(())) => {
                info!("Revoked {}", username);
                Ok(())
            }
        }
    }

    /// Soft-delete then destroy every key under the user's namespace
    pub(crate) async fn purge_secrets(
        &self,
        username: &str,
    ) -> std::result::Result<(), fabric_id_storage::StorageError> {
        let namespace = join_path(&[USERS_NAMESPACE, username])?;

        let mut pending = vec![namespace];
        let mut keys = Vec::new();
        while let Some(folder) = pending.pop() {
            for child in self.secrets.list(&folder).await? {
                let path = format!("{}/{}", folder, child);
                match path.strip_suffix('/') {
                    Some(dir) => pending.push(dir.to_string()),
                    None => keys.push(path),
                }
            }
        }

        for key in &keys {
            let versions = self.secrets.versions(key).await?;
            self.secrets.soft_delete(key).await?;
            self.secrets.destroy(key, &versions).await?;
            debug!("Destroyed {} ({} versions)", key, versions.len());
        }

        Ok(())
    }
}

/// Characters a CA enrollment id may use besides ASCII alphanumerics
const USERNAME_PUNCTUATION: &[char] = &['-', '_', '.', '@'];

/// Secret namespace of one participant
///
/// Usernames become a single path segment, so they are limited to ASCII
/// alphanumerics and [`USERNAME_PUNCTUATION`].
fn user_namespace(username: &str) -> Result<String> {
    if username.is_empty() {
        return Err(IssuerError::Validation("username is required".to_string()));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || USERNAME_PUNCTUATION.contains(&c))
    {
        return Err(IssuerError::Validation(format!(
            "invalid username: {}",
            username
        )));
    }
    join_path(&[USERS_NAMESPACE, username])
        .map_err(|_| IssuerError::Validation(format!("invalid username: {}", username)))
}

/// `identity.id=<user_id>:ecert`
fn identity_attribute(user_id: &str) -> String {
    format!("{}={}:ecert", IDENTITY_ID_ATTRIBUTE, user_id)
}

fn generate_password() -> Zeroizing<String> {
    let mut bytes = Zeroizing::new([0u8; PASSWORD_BYTES]);
    OsRng.fill_bytes(&mut bytes[..]);
    Zeroizing::new(hex::encode(&bytes[..]))
}
