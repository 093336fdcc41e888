//! Submitting-caller identity as presented by the ledger runtime.

use crate::errors::{RecordError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::collections::BTreeMap;

/// Certificate attribute binding a caller to an identity record id
pub const IDENTITY_ID_ATTRIBUTE: &str = "identity.id";

/// Identity of the caller submitting a transaction
///
/// `encoded_id` is the opaque, already-authenticated identity blob handed over
/// by the ledger runtime. Its decoded form is the canonical identity string
/// stored as a record owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    encoded_id: String,
    attributes: BTreeMap<String, String>,
}

impl ClientIdentity {
    /// Wrap an encoded identity blob and the caller's certificate attributes
    pub fn new(encoded_id: impl Into<String>, attributes: BTreeMap<String, String>) -> Self {
        Self {
            encoded_id: encoded_id.into(),
            attributes,
        }
    }

    /// Build the encoded blob for a canonical identity string
    pub fn from_canonical(canonical: &str, attributes: BTreeMap<String, String>) -> Self {
        Self::new(BASE64.encode(canonical), attributes)
    }

    /// The encoded identity blob
    pub fn encoded_id(&self) -> &str {
        &self.encoded_id
    }

    /// Decode the identity blob into its canonical string
    pub fn resolve_id(&self) -> Result<String> {
        let bytes = BASE64
            .decode(self.encoded_id.as_bytes())
            .map_err(|e| RecordError::IdentityResolution(format!("invalid encoding: {}", e)))?;
        let id = String::from_utf8(bytes)
            .map_err(|e| RecordError::IdentityResolution(format!("invalid utf-8: {}", e)))?;
        if id.is_empty() {
            return Err(RecordError::IdentityResolution("empty identity".to_string()));
        }
        Ok(id)
    }

    /// Value of a certificate attribute, if present
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Fail with `Unauthorized` unless attribute `name` equals `expected`
    pub fn assert_attribute_value(&self, name: &str, expected: &str) -> Result<()> {
        match self.attribute(name) {
            Some(value) if value == expected => Ok(()),
            Some(value) => Err(RecordError::Unauthorized(format!(
                "attribute {} is {}, expected {}",
                name, value, expected
            ))),
            None => Err(RecordError::Unauthorized(format!(
                "attribute {} not present",
                name
            ))),
        }
    }
}
