//! Certificate authorities the gateway accepts caller certificates from.

use crate::errors::{RecordError, Result};
use std::path::Path;
use tracing::{debug, warn};
use x509_parser::{certificate::X509Certificate, parse_x509_certificate, pem::Pem};

/// DER certificates of the organization's CAs
///
/// A caller certificate is trusted when it is within its validity period and
/// its signature verifies against one of these CAs.
#[derive(Debug, Clone)]
pub struct TrustAnchors {
    certificates: Vec<Vec<u8>>,
}

impl TrustAnchors {
    /// Read every `CERTIFICATE` block from PEM text
    pub fn from_pem(pem: &str) -> Result<Self> {
        let mut certificates = Vec::new();
        for block in Pem::iter_from_buffer(pem.as_bytes()) {
            let block = block.map_err(|e| anchor_error(format!("PEM: {}", e)))?;
            if block.label != "CERTIFICATE" {
                continue;
            }
            parse_x509_certificate(&block.contents)
                .map_err(|e| anchor_error(format!("CA certificate: {}", e)))?;
            certificates.push(block.contents);
        }

        if certificates.is_empty() {
            return Err(anchor_error("no CA certificate found".to_string()));
        }
        Ok(Self { certificates })
    }

    /// Load from a PEM file or from a directory of PEM files (an MSP `cacerts`)
    pub fn from_path(path: &Path) -> Result<Self> {
        let io = |e: std::io::Error| anchor_error(format!("{}: {}", path.display(), e));

        let mut pem = String::new();
        if path.is_dir() {
            let mut files: Vec<_> = std::fs::read_dir(path)
                .map_err(io)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            files.sort();
            for file in files {
                pem.push_str(&std::fs::read_to_string(&file).map_err(io)?);
                pem.push('\n');
            }
        } else {
            pem = std::fs::read_to_string(path).map_err(io)?;
        }

        let anchors = Self::from_pem(&pem)?;
        debug!(
            "Loaded {} CA certificate(s) from {}",
            anchors.len(),
            path.display()
        );
        Ok(anchors)
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Check that `cert` is currently valid and signed by a trusted CA
    pub fn verify(&self, cert: &X509Certificate<'_>) -> Result<()> {
        if !cert.validity().is_valid() {
            return Err(RecordError::InvalidCredentials(
                "certificate is expired or not yet valid".to_string(),
            ));
        }

        for der in &self.certificates {
            let Ok((_, ca)) = parse_x509_certificate(der) else {
                continue;
            };
            if ca.subject().as_raw() != cert.issuer().as_raw() {
                continue;
            }
            if cert.verify_signature(Some(ca.public_key())).is_ok() {
                return Ok(());
            }
        }

        warn!("Rejected certificate for {} issued by {}", cert.subject(), cert.issuer());
        Err(RecordError::InvalidCredentials(
            "certificate is not issued by a trusted CA".to_string(),
        ))
    }
}

fn anchor_error(message: String) -> RecordError {
    RecordError::InvalidCredentials(format!("trust anchors: {}", message))
}
