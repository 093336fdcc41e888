use anyhow::{Context, Result};
use fabric_id_issuer::FabricCaConfig;
use fabric_id_storage::VaultConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use zeroize::Zeroizing;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the server to
    pub bind_address: SocketAddr,

    /// MSP id of the organization whose members call the gateway
    pub msp_id: String,

    /// Organization name, used as CA affiliation
    pub org: String,

    /// `fabric-ca-client` settings
    pub ca: FabricCaConfig,

    /// Vault KV v2 settings
    pub vault: VaultConfig,

    /// CA certificates caller certificates must chain to (PEM file or directory)
    pub msp_cacerts_path: PathBuf,

    /// Path to the RocksDB world state
    pub ledger_db_path: PathBuf,

    /// Ledger channel
    pub channel_name: String,

    /// Contract name on the channel
    pub chaincode_name: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration from a variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let bind_address = var("BIND_ADDRESS", "127.0.0.1:8080")
            .parse()
            .context("BIND_ADDRESS")?;

        let msp_id = var("MSP_ID", "Org1MSP");
        let org = var("ORG", "org1");

        let namespace = var("WORKSHOP_NAMESPACE", "test-network");
        let ingress_domain = var("WORKSHOP_INGRESS_DOMAIN", "localho.st");
        let ca_url = Url::parse(&format!(
            "https://{}-{}-ca-ca.{}",
            namespace, org, ingress_domain
        ))
        .context("CA address")?;

        let ca_timeout: u64 = var("CA_COMMAND_TIMEOUT_SECONDS", "60")
            .parse()
            .context("CA_COMMAND_TIMEOUT_SECONDS")?;

        let registrar_msp_dir: PathBuf = var("RCAMSP_PATH", "/etc/rcaadmin/msp").into();
        let msp_cacerts_path = lookup("MSP_CACERTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| registrar_msp_dir.join("cacerts"));

        let ca = FabricCaConfig {
            binary: var("FABRIC_CA_CLIENT_BIN", "fabric-ca-client").into(),
            url: ca_url,
            tls_cert_path: var("TLS_CERT_PATH", "/etc/tls/tls-cert.pem").into(),
            registrar_msp_dir,
            timeout: Duration::from_secs(ca_timeout),
        };

        let token = lookup("VAULT_TOKEN")
            .filter(|t| !t.is_empty())
            .context("VAULT_TOKEN environment variable required")?;

        let vault = VaultConfig {
            address: Url::parse(&var("VAULT_ADDR", "http://127.0.0.1:8200"))
                .context("VAULT_ADDR")?,
            token: Zeroizing::new(token),
            kv_root: var("VAULT_KV_PATH", "fabric/msp"),
            timeout_secs: var("VAULT_TIMEOUT_SECONDS", "30")
                .parse()
                .context("VAULT_TIMEOUT_SECONDS")?,
        };

        Ok(Config {
            bind_address,
            msp_id,
            org,
            ca,
            vault,
            msp_cacerts_path,
            ledger_db_path: var("LEDGER_DB_PATH", "./data/world-state.db").into(),
            channel_name: var("CHANNEL_NAME", "mychannel"),
            chaincode_name: var("CHAINCODE_NAME", "identity"),
        })
    }
}
