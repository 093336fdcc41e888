//! Certificate fixtures for gateway tests.
//!
//! Enabled for this crate's tests and through the `test-utils` feature.

use crate::trust::TrustAnchors;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, CustomExtension, DnType, IsCa, KeyPair,
    KeyUsagePurpose,
};

/// Arcs of the attribute extension OID `1.2.3.4.5.6.7.8.1`
const ATTRIBUTE_EXTENSION_ARCS: [u64; 9] = [1, 2, 3, 4, 5, 6, 7, 8, 1];

/// An organization CA issuing caller certificates
pub struct TestAuthority {
    certificate: Certificate,
    key: KeyPair,
}

impl TestAuthority {
    pub fn new(common_name: &str) -> Self {
        let mut params = CertificateParams::new(Vec::<String>::new()).expect("CA params");
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::DigitalSignature];

        let key = KeyPair::generate().expect("CA key");
        let certificate = params.self_signed(&key).expect("CA certificate");
        Self { certificate, key }
    }

    pub fn certificate_pem(&self) -> String {
        self.certificate.pem()
    }

    pub fn trust_anchors(&self) -> TrustAnchors {
        TrustAnchors::from_pem(&self.certificate_pem()).expect("CA certificate is valid PEM")
    }

    /// Issue a caller certificate, returned with its key as base64 PEM
    pub fn issue(&self, common_name: &str, identity_id: Option<&str>) -> (String, String) {
        let key = KeyPair::generate().expect("caller key");
        let certificate = leaf_params(common_name, identity_id)
            .signed_by(&key, &self.certificate, &self.key)
            .expect("caller certificate");
        encode(&certificate, &key)
    }

    /// A certificate signed by its own key, outside any CA
    pub fn self_signed(common_name: &str, identity_id: Option<&str>) -> (String, String) {
        let key = KeyPair::generate().expect("caller key");
        let certificate = leaf_params(common_name, identity_id)
            .self_signed(&key)
            .expect("caller certificate");
        encode(&certificate, &key)
    }

    /// A fresh key unrelated to any issued certificate, as base64 PEM
    pub fn unrelated_key() -> String {
        let key = KeyPair::generate().expect("key");
        BASE64.encode(key.serialize_pem())
    }
}

fn leaf_params(common_name: &str, identity_id: Option<&str>) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).expect("caller params");
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    if let Some(id) = identity_id {
        let attrs = serde_json::json!({ "attrs": { "identity.id": id } });
        params.custom_extensions = vec![CustomExtension::from_oid_content(
            &ATTRIBUTE_EXTENSION_ARCS,
            attrs.to_string().into_bytes(),
        )];
    }
    params
}

fn encode(certificate: &Certificate, key: &KeyPair) -> (String, String) {
    (
        BASE64.encode(certificate.pem()),
        BASE64.encode(key.serialize_pem()),
    )
}
