//! Shared fixtures for router tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use fabric_id_issuer::{testing::ScriptedCa, CertificateAuthorityClient, CredentialIssuer};
use fabric_id_records::{
    testing::TestAuthority, IdentityContract, InProcessGateway, LedgerRecordStore,
};
use fabric_id_server::{create_router, state::Issuer, AppState};
use fabric_id_storage::{InMemoryLedgerStore, InMemorySecretStore, SecretStore};
use std::sync::Arc;
use tower::ServiceExt;

pub const MSP_ID: &str = "Org1MSP";

pub struct TestApp {
    pub router: Router,
    pub ca: Arc<ScriptedCa>,
    pub secrets: Arc<InMemorySecretStore>,
    pub ledger: Arc<InMemoryLedgerStore>,
    pub authority: TestAuthority,
}

impl TestApp {
    pub fn new() -> Self {
        let ca = Arc::new(ScriptedCa::new());
        let secrets = Arc::new(InMemorySecretStore::new());
        let ledger = Arc::new(InMemoryLedgerStore::new());

        let ca_client: Arc<dyn CertificateAuthorityClient> = ca.clone();
        let secret_store: Arc<dyn SecretStore> = secrets.clone();
        let issuer: Arc<Issuer> = Arc::new(CredentialIssuer::new(ca_client, secret_store, "org1"));
        let authority = TestAuthority::new("Org1 CA");
        let records = Arc::new(LedgerRecordStore::new(ledger.clone()));
        let gateway = Arc::new(InProcessGateway::new(
            IdentityContract::new(records),
            MSP_ID,
            authority.trust_anchors(),
        ));

        let state = Arc::new(AppState::from_parts(issuer, gateway));
        Self {
            router: create_router(state),
            ca,
            secrets,
            ledger,
            authority,
        }
    }

    /// Caller holding a certificate from the organization CA
    pub fn caller(&self, common_name: &str, identity_id: &str) -> Caller {
        let (cert, key) = self.authority.issue(common_name, Some(identity_id));
        Caller { cert, key }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        read_json(response).await
    }
}

pub async fn read_json(response: Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Forwarded caller material: base64 PEM certificate and key
pub struct Caller {
    pub cert: String,
    pub key: String,
}

impl Caller {
    /// Self-signed certificate outside the organization CA
    pub fn self_signed(common_name: &str, identity_id: &str) -> Self {
        let (cert, key) = TestAuthority::self_signed(common_name, Some(identity_id));
        Self { cert, key }
    }

    /// Keep the certificate but swap in an unrelated private key
    pub fn with_foreign_key(&self) -> Self {
        Self {
            cert: self.cert.clone(),
            key: TestAuthority::unrelated_key(),
        }
    }

    pub fn sign(&self, mut request: Request<Body>) -> Request<Body> {
        let headers = request.headers_mut();
        headers.insert("x-user-cert", self.cert.parse().unwrap());
        headers.insert("x-user-key", self.key.parse().unwrap());
        headers.insert("x-user-mspid", MSP_ID.parse().unwrap());
        request
    }
}
