//! Certificate authority client.
//!
//! The saga only depends on [`CertificateAuthorityClient`]. [`FabricCaCli`]
//! implements it by running the `fabric-ca-client` binary; a native protocol
//! client can be dropped in behind the same trait.

use crate::{
    errors::{CaError, MapperError},
    mapper::CredentialBundle,
};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;
use zeroize::Zeroizing;

pub type CaResult<T> = std::result::Result<T, CaError>;

/// Identity type of registered participants
pub const CLIENT_ID_TYPE: &str = "client";

/// A registration request
#[derive(Clone)]
pub struct Registration {
    pub username: String,
    pub secret: Zeroizing<String>,
    pub id_type: String,
    pub affiliation: String,
    /// `name=value[:ecert]` attribute specs
    pub attributes: Vec<String>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .field("id_type", &self.id_type)
            .field("affiliation", &self.affiliation)
            .field("attributes", &self.attributes)
            .finish()
    }
}

/// Enrollment output in a private staging directory
///
/// The directory is removed when this value is dropped.
#[derive(Debug)]
pub struct StagedBundle {
    dir: TempDir,
}

impl StagedBundle {
    /// Create an empty staging directory only the current user can read
    pub fn create() -> CaResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("msp-")
            .tempdir()
            .map_err(|e| CaError::Staging(e.to_string()))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Read the staged MSP directory
    pub fn load(&self) -> Result<CredentialBundle, MapperError> {
        CredentialBundle::from_msp_dir(self.path())
    }
}

/// Certificate authority operations used by the issuance saga
#[async_trait]
pub trait CertificateAuthorityClient: Send + Sync {
    /// Register an enrollment id with the CA
    async fn register(&self, registration: &Registration) -> CaResult<()>;

    /// Enroll a registered id, returning the staged credential bundle
    async fn enroll(&self, username: &str, secret: &str) -> CaResult<StagedBundle>;

    /// Revoke every certificate of an enrollment id
    async fn revoke(&self, username: &str, reason: &str) -> CaResult<()>;
}

/// Settings for the `fabric-ca-client` backend
#[derive(Debug, Clone)]
pub struct FabricCaConfig {
    /// Client binary to execute
    pub binary: PathBuf,
    /// CA endpoint, e.g. `https://test-network-org1-ca-ca.localho.st`
    pub url: Url,
    /// TLS trust root of the CA
    pub tls_cert_path: PathBuf,
    /// MSP directory of the registrar (CA admin)
    pub registrar_msp_dir: PathBuf,
    /// Upper bound for one client invocation
    pub timeout: Duration,
}

/// CA client running the `fabric-ca-client` binary
#[derive(Debug, Clone)]
pub struct FabricCaCli {
    config: FabricCaConfig,
}

impl FabricCaCli {
    pub fn new(config: FabricCaConfig) -> Self {
        Self { config }
    }

    fn enroll_url(&self, username: &str, secret: &str) -> CaResult<Url> {
        let mut url = self.config.url.clone();
        url.set_username(username)
            .and_then(|_| url.set_password(Some(secret)))
            .map_err(|_| CaError::Staging(format!("cannot embed credentials in {}", self.config.url)))?;
        Ok(url)
    }

    async fn run(
        &self,
        operation: &'static str,
        args: Vec<String>,
        secret: Option<&str>,
    ) -> CaResult<()> {
        debug!("Running fabric-ca-client {}", operation);

        let mut cmd = Command::new(&self.config.binary);
        cmd.arg(operation)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| CaError::Spawn { operation, source })?;

        let output = match timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| CaError::Spawn { operation, source })?,
            Err(_) => {
                warn!("fabric-ca-client {} timed out", operation);
                return Err(CaError::Timeout {
                    operation,
                    seconds: self.config.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            if let Some(secret) = secret.filter(|s| !s.is_empty()) {
                combined = combined.replace(secret, "****");
            }
            return Err(CaError::CommandFailed {
                operation,
                status: output.status.to_string(),
                output: combined.trim().to_string(),
            });
        }

        Ok(())
    }

    fn common_args(&self, msp_dir: &Path) -> Vec<String> {
        vec![
            "--tls.certfiles".to_string(),
            self.config.tls_cert_path.display().to_string(),
            "--mspdir".to_string(),
            msp_dir.display().to_string(),
        ]
    }
}

#[async_trait]
impl CertificateAuthorityClient for FabricCaCli {
    async fn register(&self, registration: &Registration) -> CaResult<()> {
        let mut args = vec![
            "--id.name".to_string(),
            registration.username.clone(),
            "--id.secret".to_string(),
            registration.secret.to_string(),
            "--id.type".to_string(),
            registration.id_type.clone(),
            "--id.affiliation".to_string(),
            registration.affiliation.clone(),
        ];
        if !registration.attributes.is_empty() {
            args.push("--id.attrs".to_string());
            args.push(registration.attributes.join(","));
        }
        args.push("--url".to_string());
        args.push(self.config.url.to_string());
        args.extend(self.common_args(&self.config.registrar_msp_dir));

        self.run("register", args, Some(registration.secret.as_str()))
            .await
    }

    async fn enroll(&self, username: &str, secret: &str) -> CaResult<StagedBundle> {
        let staged = StagedBundle::create()?;

        let mut args = vec![
            "--url".to_string(),
            self.enroll_url(username, secret)?.to_string(),
        ];
        args.extend(self.common_args(staged.path()));

        // On error `staged` drops here and the directory goes with it.
        self.run("enroll", args, Some(secret)).await?;
        Ok(staged)
    }

    async fn revoke(&self, username: &str, reason: &str) -> CaResult<()> {
        let mut args = vec![
            "--revoke.name".to_string(),
            username.to_string(),
            "--revoke.reason".to_string(),
            reason.to_string(),
            "--url".to_string(),
            self.config.url.to_string(),
        ];
        args.extend(self.common_args(&self.config.registrar_msp_dir));

        self.run("revoke", args, None).await
    }
}
