use anyhow::{Context, Result};
use fabric_id_issuer::{CertificateAuthorityClient, CredentialIssuer, FabricCaCli};
use fabric_id_records::{
    IdentityContract, InProcessGateway, LedgerGateway, LedgerRecordStore, TrustAnchors,
};
use fabric_id_storage::{RocksDbLedgerStore, SecretStore, VaultSecretStore};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;

/// Credential issuer over whichever CA and secret store backends are wired in
pub type Issuer = CredentialIssuer<dyn CertificateAuthorityClient, dyn SecretStore>;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<Issuer>,
    pub gateway: Arc<dyn LedgerGateway>,
}

impl AppState {
    /// Wire the production backends from configuration
    pub async fn new(config: Config) -> Result<Self> {
        let secrets: Arc<dyn SecretStore> = Arc::new(VaultSecretStore::new(config.vault.clone())?);
        let ca: Arc<dyn CertificateAuthorityClient> = Arc::new(FabricCaCli::new(config.ca.clone()));
        let issuer = Arc::new(CredentialIssuer::new(ca, secrets, config.org.clone()));

        if let Some(parent) = config.ledger_db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let ledger = Arc::new(RocksDbLedgerStore::open(&config.ledger_db_path)?);
        let records = Arc::new(LedgerRecordStore::new(ledger));
        let trust = TrustAnchors::from_path(&config.msp_cacerts_path)
            .context("MSP_CACERTS_PATH")?;
        info!(
            "Trusting {} CA certificate(s) from {}",
            trust.len(),
            config.msp_cacerts_path.display()
        );
        let gateway: Arc<dyn LedgerGateway> = Arc::new(InProcessGateway::new(
            IdentityContract::new(records),
            config.msp_id.clone(),
            trust,
        ));

        info!(
            "Gateway ready for {} on channel {} ({})",
            config.msp_id, config.channel_name, config.chaincode_name
        );

        Ok(Self::from_parts(issuer, gateway))
    }

    /// Assemble state from already constructed services
    pub fn from_parts(issuer: Arc<Issuer>, gateway: Arc<dyn LedgerGateway>) -> Self {
        Self { issuer, gateway }
    }
}
