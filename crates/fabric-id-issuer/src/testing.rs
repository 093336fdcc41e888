//! Scripted certificate authority for tests.

use crate::{
    ca::{CaResult, CertificateAuthorityClient, Registration, StagedBundle},
    errors::CaError,
};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// One call received by [`ScriptedCa`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaCall {
    Register { username: String, attributes: Vec<String> },
    Enroll { username: String },
    Revoke { username: String, reason: String },
}

/// In-memory CA that records calls and fails on demand
///
/// Enrollment writes a minimal MSP tree into the staging directory and
/// requires the registered secret.
#[derive(Debug, Default)]
pub struct ScriptedCa {
    calls: Mutex<Vec<CaCall>>,
    registered: Mutex<BTreeSet<(String, String)>>,
    fail_register: AtomicBool,
    fail_enroll: AtomicBool,
    fail_revoke: AtomicBool,
}

impl ScriptedCa {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_enroll(&self, fail: bool) {
        self.fail_enroll.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_revoke(&self, fail: bool) {
        self.fail_revoke.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<CaCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, call: CaCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    fn rejected(operation: &'static str) -> CaError {
        CaError::CommandFailed {
            operation,
            status: "exit status: 1".to_string(),
            output: format!("scripted {} failure", operation),
        }
    }
}

#[async_trait]
impl CertificateAuthorityClient for ScriptedCa {
    async fn register(&self, registration: &Registration) -> CaResult<()> {
        self.record(CaCall::Register {
            username: registration.username.clone(),
            attributes: registration.attributes.clone(),
        });
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(Self::rejected("register"));
        }

        let mut registered = self.registered.lock().unwrap_or_else(|e| e.into_inner());
        if registered.iter().any(|(name, _)| name == &registration.username) {
            return Err(CaError::CommandFailed {
                operation: "register",
                status: "exit status: 1".to_string(),
                output: format!("identity '{}' is already registered", registration.username),
            });
        }
        registered.insert((registration.username.clone(), registration.secret.to_string()));
        Ok(())
    }

    async fn enroll(&self, username: &str, secret: &str) -> CaResult<StagedBundle> {
        self.record(CaCall::Enroll {
            username: username.to_string(),
        });
        let known = self
            .registered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&(username.to_string(), secret.to_string()));
        if self.fail_enroll.load(Ordering::SeqCst) || !known {
            return Err(Self::rejected("enroll"));
        }

        let staged = StagedBundle::create()?;
        let write = |folder: &str, file: &str, content: &str| -> std::io::Result<()> {
            let dir = staged.path().join(folder);
            std::fs::create_dir_all(&dir)?;
            std::fs::write(dir.join(file), content)
        };
        write("signcerts", "cert.pem", &format!("CERT {}", username))
            .and_then(|_| write("keystore", "priv_sk", &format!("KEY {}", username)))
            .and_then(|_| write("cacerts", "ca.pem", "CA"))
            .and_then(|_| std::fs::write(staged.path().join("IssuerRevocationPublicKey"), "REV"))
            .map_err(|e| CaError::Staging(e.to_string()))?;

        Ok(staged)
    }

    async fn revoke(&self, username: &str, reason: &str) -> CaResult<()> {
        self.record(CaCall::Revoke {
            username: username.to_string(),
            reason: reason.to_string(),
        });
        if self.fail_revoke.load(Ordering::SeqCst) {
            return Err(Self::rejected("revoke"));
        }
        Ok(())
    }
}
