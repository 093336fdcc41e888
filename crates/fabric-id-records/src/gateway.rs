//! Ledger gateway: submit/evaluate on behalf of a forwarded caller identity.

use crate::{
    contract::{IdentityContract, Transaction},
    errors::{RecordError, Result},
    identity::ClientIdentity,
    traits::IdentityLedger,
    trust::TrustAnchors,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rcgen::KeyPair;
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::Mutex;
use tracing::{debug, info};
use x509_parser::{certificate::X509Certificate, parse_x509_certificate, pem::parse_x509_pem};
use zeroize::Zeroizing;

/// OID of the certificate extension carrying CA-issued attributes
pub const ATTRIBUTE_EXTENSION_OID: &str = "1.2.3.4.5.6.7.8.1";

/// Identity material a gateway client forwards with each request
///
/// Construction proves possession: the private key must belong to the
/// certificate's public key.
#[derive(Clone)]
pub struct GatewayIdentity {
    cert_der: Vec<u8>,
    msp_id: String,
}

impl fmt::Debug for GatewayIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayIdentity")
            .field("msp_id", &self.msp_id)
            .field("certificate_bytes", &self.cert_der.len())
            .finish()
    }
}

impl GatewayIdentity {
    /// Build from PEM certificate and key text
    ///
    /// The key is only used to check that it belongs to the certificate and
    /// is not retained.
    pub fn new(cert_pem: String, key_pem: Zeroizing<String>, msp_id: String) -> Result<Self> {
        if msp_id.is_empty() {
            return Err(RecordError::InvalidCredentials("MSP id is empty".to_string()));
        }

        let (_, block) = parse_x509_pem(key_pem.as_bytes())
            .map_err(|e| RecordError::InvalidCredentials(format!("private key: {}", e)))?;
        if !block.label.ends_with("PRIVATE KEY") {
            return Err(RecordError::InvalidCredentials(format!(
                "expected a private key, found {}",
                block.label
            )));
        }
        let key = KeyPair::from_pem(&key_pem)
            .map_err(|e| RecordError::InvalidCredentials(format!("private key: {}", e)))?;

        let (_, block) = parse_x509_pem(cert_pem.as_bytes())
            .map_err(|e| RecordError::InvalidCredentials(format!("certificate: {}", e)))?;
        let cert_der = block.contents;
        {
            let cert = parse_certificate(&cert_der)?;
            let certified: &[u8] = &cert.public_key().subject_public_key.data;
            if key.public_key_raw() != certified {
                return Err(RecordError::InvalidCredentials(
                    "private key does not match the certificate".to_string(),
                ));
            }
        }

        Ok(Self { cert_der, msp_id })
    }

    /// Build from base64-encoded PEM certificate and key
    pub fn from_encoded(cert_b64: &str, key_b64: &str, msp_id: &str) -> Result<Self> {
        let cert_pem = decode_pem_text(cert_b64, "certificate")?;
        let key_pem = Zeroizing::new(decode_pem_text(key_b64, "private key")?);
        Self::new(cert_pem, key_pem, msp_id.to_string())
    }

    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }

    /// Derive the ledger-side caller identity from a trusted certificate
    ///
    /// The canonical identity is `x509::<subject>::<issuer>`; attributes come
    /// from the CA attribute extension when present.
    pub fn client_identity(&self, trust: &TrustAnchors) -> Result<ClientIdentity> {
        let cert = parse_certificate(&self.cert_der)?;
        trust.verify(&cert)?;

        let canonical = format!("x509::{}::{}", cert.subject(), cert.issuer());

        let mut attributes = BTreeMap::new();
        for ext in cert.extensions() {
            if ext.oid.to_id_string() == ATTRIBUTE_EXTENSION_OID {
                attributes = parse_attributes(ext.value)?;
            }
        }

        Ok(ClientIdentity::from_canonical(&canonical, attributes))
    }
}

fn parse_certificate(der: &[u8]) -> Result<X509Certificate<'_>> {
    parse_x509_certificate(der)
        .map(|(_, cert)| cert)
        .map_err(|e| RecordError::InvalidCredentials(format!("certificate: {}", e)))
}

fn decode_pem_text(encoded: &str, what: &str) -> Result<String> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| RecordError::InvalidCredentials(format!("{} encoding: {}", what, e)))?;
    String::from_utf8(bytes)
        .map_err(|_| RecordError::InvalidCredentials(format!("{} is not PEM text", what)))
}

#[derive(serde::Deserialize)]
struct AttributeDocument {
    #[serde(default)]
    attrs: BTreeMap<String, String>,
}

fn parse_attributes(raw: &[u8]) -> Result<BTreeMap<String, String>> {
    let doc: AttributeDocument = serde_json::from_slice(raw)
        .map_err(|e| RecordError::InvalidCredentials(format!("attribute extension: {}", e)))?;
    Ok(doc.attrs)
}

/// Client-side access to the identity contract
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Submit a mutating transaction for ordering and commit
    async fn submit(
        &self,
        tx: Transaction,
        args: &[String],
        identity: &GatewayIdentity,
    ) -> Result<Vec<u8>>;

    /// Evaluate a read-only transaction without committing
    async fn evaluate(
        &self,
        tx: Transaction,
        args: &[String],
        identity: &GatewayIdentity,
    ) -> Result<Vec<u8>>;
}

/// Gateway running the contract in-process
///
/// Callers must present a certificate issued by one of the organization's
/// CAs. Submits are serialized so that each transaction observes the world
/// state committed by the previous one; evaluations run concurrently.
pub struct InProcessGateway<L>
where
    L: IdentityLedger,
{
    contract: IdentityContract<L>,
    msp_id: String,
    trust: TrustAnchors,
    commit_lock: Mutex<()>,
}

impl<L> InProcessGateway<L>
where
    L: IdentityLedger,
{
    /// Gateway accepting identities of organization `msp_id` issued by `trust`
    pub fn new(
        contract: IdentityContract<L>,
        msp_id: impl Into<String>,
        trust: TrustAnchors,
    ) -> Self {
        Self {
            contract,
            msp_id: msp_id.into(),
            trust,
            commit_lock: Mutex::new(()),
        }
    }

    fn caller(&self, identity: &GatewayIdentity) -> Result<ClientIdentity> {
        if identity.msp_id() != self.msp_id {
            return Err(RecordError::InvalidCredentials(format!(
                "unknown MSP {}",
                identity.msp_id()
            )));
        }
        identity.client_identity(&self.trust)
    }
}

#[async_trait]
impl<L> LedgerGateway for InProcessGateway<L>
where
    L: IdentityLedger + 'static,
{
    async fn submit(
        &self,
        tx: Transaction,
        args: &[String],
        identity: &GatewayIdentity,
    ) -> Result<Vec<u8>> {
        if tx.is_read_only() {
            return Err(RecordError::Validation(format!(
                "{} must be evaluated, not submitted",
                tx.as_str()
            )));
        }
        let caller = self.caller(identity)?;

        let _guard = self.commit_lock.lock().await;
        let result = self.contract.invoke(tx, args, &caller).await?;
        info!("Committed transaction {}", tx.as_str());
        Ok(result)
    }

    async fn evaluate(
        &self,
        tx: Transaction,
        args: &[String],
        identity: &GatewayIdentity,
    ) -> Result<Vec<u8>> {
        if !tx.is_read_only() {
            return Err(RecordError::Validation(format!(
                "{} must be submitted, not evaluated",
                tx.as_str()
            )));
        }
        let caller = self.caller(identity)?;
        debug!("Evaluating transaction {}", tx.as_str());
        self.contract.invoke(tx, args, &caller).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestAuthority;
    use crate::{identity::IDENTITY_ID_ATTRIBUTE, service::LedgerRecordStore};
    use fabric_id_storage::InMemoryLedgerStore;
    use std::sync::Arc;

    fn gateway(
        authority: &TestAuthority,
    ) -> InProcessGateway<LedgerRecordStore<InMemoryLedgerStore>> {
        let records = LedgerRecordStore::new(Arc::new(InMemoryLedgerStore::new()));
        InProcessGateway::new(
            IdentityContract::new(Arc::new(records)),
            "Org1MSP",
            authority.trust_anchors(),
        )
    }

    fn record(id: &str) -> String {
        format!(
            r#"{{"id":"{}","firstName":"A","phone":"555","nationalID":"N1"}}"#,
            id
        )
    }

    #[test]
    fn test_client_identity_from_certificate() {
        let authority = TestAuthority::new("Org1 CA");
        let (cert, key) = authority.issue("u1", Some("u1"));
        let identity = GatewayIdentity::from_encoded(&cert, &key, "Org1MSP").unwrap();
        let client = identity
            .client_identity(&authority.trust_anchors())
            .unwrap();

        let canonical = client.resolve_id().unwrap();
        assert!(canonical.starts_with("x509::"));
        assert!(canonical.contains("CN=u1"));
        assert!(canonical.contains("CN=Org1 CA"));
        assert_eq!(client.attribute(IDENTITY_ID_ATTRIBUTE), Some("u1"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let (cert, key) = TestAuthority::new("Org1 CA").issue("u1", None);
        let identity = GatewayIdentity::from_encoded(&cert, &key, "Org1MSP").unwrap();
        let debug = format!("{:?}", identity);
        assert!(debug.contains("Org1MSP"));
        assert!(!debug.contains("PRIVATE KEY"));
    }

    #[test]
    fn test_rejects_bad_material() {
        let (cert, key) = TestAuthority::new("Org1 CA").issue("u1", None);
        assert!(matches!(
            GatewayIdentity::from_encoded("!!", &key, "Org1MSP"),
            Err(RecordError::InvalidCredentials(_))
        ));
        // Certificate where the key should be.
        assert!(GatewayIdentity::from_encoded(&cert, &cert, "Org1MSP").is_err());
        assert!(GatewayIdentity::from_encoded(&cert, &key, "").is_err());
    }

    #[test]
    fn test_key_must_match_certificate() {
        let (cert, _) = TestAuthority::new("Org1 CA").issue("u1", Some("u1"));
        let other_key = TestAuthority::unrelated_key();

        assert!(matches!(
            GatewayIdentity::from_encoded(&cert, &other_key, "Org1MSP"),
            Err(RecordError::InvalidCredentials(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_and_evaluate() {
        let authority = TestAuthority::new("Org1 CA");
        let gateway = gateway(&authority);
        let (cert, key) = authority.issue("u1", Some("u1"));
        let identity = GatewayIdentity::from_encoded(&cert, &key, "Org1MSP").unwrap();

        gateway
            .submit(Transaction::CreateIdentity, &[record("u1")], &identity)
            .await
            .unwrap();

        let read = gateway
            .evaluate(Transaction::ReadIdentity, &["u1".to_string()], &identity)
            .await
            .unwrap();
        let read: serde_json::Value = serde_json::from_slice(&read).unwrap();
        assert_eq!(read["firstName"], "A");
        assert!(read["owner"].as_str().unwrap().contains("CN=u1"));

        assert!(gateway
            .evaluate(Transaction::DeleteIdentity, &["u1".to_string()], &identity)
            .await
            .is_err());
        assert!(gateway
            .submit(Transaction::ReadIdentity, &["u1".to_string()], &identity)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_foreign_msp_rejected() {
        let authority = TestAuthority::new("Org1 CA");
        let gateway = gateway(&authority);
        let (cert, key) = authority.issue("u1", Some("u1"));
        let identity = GatewayIdentity::from_encoded(&cert, &key, "Org2MSP").unwrap();

        let result = gateway
            .evaluate(Transaction::ReadIdentity, &["u1".to_string()], &identity)
            .await;
        assert!(matches!(result, Err(RecordError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn test_untrusted_certificate_cannot_act_as_owner() {
        let authority = TestAuthority::new("Org1 CA");
        let gateway = gateway(&authority);
        let (cert, key) = authority.issue("u1", Some("u1"));
        let owner = GatewayIdentity::from_encoded(&cert, &key, "Org1MSP").unwrap();
        gateway
            .submit(Transaction::CreateIdentity, &[record("u1")], &owner)
            .await
            .unwrap();

        // Same subject, self-signed with a fresh key.
        let (forged_cert, forged_key) = TestAuthority::self_signed("u1", Some("u1"));
        let forged = GatewayIdentity::from_encoded(&forged_cert, &forged_key, "Org1MSP").unwrap();
        let result = gateway
            .submit(Transaction::DeleteIdentity, &["u1".to_string()], &forged)
            .await;
        assert!(matches!(result, Err(RecordError::InvalidCredentials(_))));

        // Same subject and issuer name, signed by a different CA key.
        let impostor = TestAuthority::new("Org1 CA");
        let (cert, key) = impostor.issue("u1", Some("u1"));
        let lookalike = GatewayIdentity::from_encoded(&cert, &key, "Org1MSP").unwrap();
        let result = gateway
            .submit(Transaction::DeleteIdentity, &["u1".to_string()], &lookalike)
            .await;
        assert!(matches!(result, Err(RecordError::InvalidCredentials(_))));

        let read = gateway
            .evaluate(Transaction::ReadIdentity, &["u1".to_string()], &owner)
            .await
            .unwrap();
        let read: serde_json::Value = serde_json::from_slice(&read).unwrap();
        assert_eq!(read["id"], "u1");
    }
}
