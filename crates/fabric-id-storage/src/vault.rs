//! HashiCorp Vault KV v2 secret store.
//!
//! Maps logical paths onto the KV v2 HTTP API under a configurable mount
//! root (`kv_root`):
//!
//! | operation     | request                                  |
//! |---------------|------------------------------------------|
//! | `write`       | `POST   /v1/<kv_root>/data/<path>`       |
//! | `read`        | `GET    /v1/<kv_root>/data/<path>`       |
//! | `list`        | `GET    /v1/<kv_root>/metadata/<path>?list=true` |
//! | `versions`    | `GET    /v1/<kv_root>/metadata/<path>`   |
//! | `soft_delete` | `DELETE /v1/<kv_root>/metadata/<path>`   |
//! | `destroy`     | `POST   /v1/<kv_root>/destroy/<path>`    |
//!
//! Secret values are stored as a single `content` field.

use crate::{
    errors::{Result, StorageError},
    traits::{validate_path, SecretStore},
};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;
use zeroize::Zeroizing;

const TOKEN_HEADER: &str = "X-Vault-Token";

/// Field holding the secret value inside the KV v2 data map
pub const CONTENT_FIELD: &str = "content";

/// Connection settings for [`VaultSecretStore`]
#[derive(Clone)]
pub struct VaultConfig {
    /// Vault server address, e.g. `http://127.0.0.1:8200`
    pub address: Url,
    /// Client token
    pub token: Zeroizing<String>,
    /// KV v2 mount root, e.g. `fabric/msp`
    pub kv_root: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("address", &self.address.as_str())
            .field("token", &"[REDACTED]")
            .field("kv_root", &self.kv_root)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct WriteData {
    version: u64,
}

#[derive(Debug, Deserialize)]
struct ReadData {
    data: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ListData {
    keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MetadataData {
    #[serde(default)]
    versions: HashMap<String, serde_json::Value>,
}

/// Vault KV v2 backed [`SecretStore`]
#[derive(Clone)]
pub struct VaultSecretStore {
    http: reqwest::Client,
    address: Url,
    token: Zeroizing<String>,
    kv_root: String,
}

impl fmt::Debug for VaultSecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultSecretStore")
            .field("address", &self.address.as_str())
            .field("kv_root", &self.kv_root)
            .finish_non_exhaustive()
    }
}

impl VaultSecretStore {
    /// Build a store from configuration
    pub fn new(config: VaultConfig) -> Result<Self> {
        let kv_root = config.kv_root.trim_matches('/').to_string();
        validate_path(&kv_root)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            address: config.address,
            token: config.token,
            kv_root,
        })
    }

    /// Build `/v1/<kv_root>/<namespace>/<path>` one segment at a time
    ///
    /// Every segment is percent-encoded, so `?`, `#` or `%` in a path stay
    /// part of the key. A trailing `/` on `path` is kept.
    fn endpoint(&self, namespace: &str, path: &str) -> Result<Url> {
        validate_path(path)?;

        let mut url = self.address.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::InvalidPath(self.address.to_string()))?;
            segments
                .pop_if_empty()
                .push("v1")
                .extend(self.kv_root.split('/'))
                .push(namespace)
                .extend(path.split('/'));
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header(TOKEN_HEADER, self.token.as_str())
    }

    async fn check(
        response: reqwest::Response,
        operation: &str,
        path: &str,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Backend(format!(
            "{} {} failed with status {}: {}",
            operation,
            path,
            status.as_u16(),
            body.trim()
        )))
    }
}

#[async_trait]
impl SecretStore for VaultSecretStore {
    async fn write(&self, path: &str, content: &str) -> Result<u64> {
        let url = self.endpoint("data", path)?;
        let response = self
            .request(Method::POST, url)
            .json(&json!({ "data": { CONTENT_FIELD: content } }))
            .send()
            .await?;
        let response = Self::check(response, "write", path).await?;

        let envelope: Envelope<WriteData> = response
            .json()
            .await
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        let version = envelope.data.map(|d| d.version).ok_or_else(|| {
            StorageError::Deserialization(format!("write {} returned no version", path))
        })?;

        debug!("Wrote secret {} version {}", path, version);
        Ok(version)
    }

    async fn read(&self, path: &str) -> Result<Option<String>> {
        let url = self.endpoint("data", path)?;
        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response, "read", path).await?;

        let envelope: Envelope<ReadData> = response
            .json()
            .await
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;

        // A deleted or destroyed version has a null data map.
        let Some(data) = envelope.data.and_then(|d| d.data) else {
            return Ok(None);
        };

        match data.get(CONTENT_FIELD) {
            Some(serde_json::Value::String(content)) => Ok(Some(content.clone())),
            _ => Err(StorageError::Deserialization(format!(
                "secret {} has no string {} field",
                path, CONTENT_FIELD
            ))),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut url = self.endpoint("metadata", prefix)?;
        url.query_pairs_mut().append_pair("list", "true");

        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = Self::check(response, "list", prefix).await?;

        let envelope: Envelope<ListData> = response
            .json()
            .await
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;

        let mut keys = envelope.data.map(|d| d.keys).unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn versions(&self, path: &str) -> Result<Vec<u64>> {
        let url = self.endpoint("metadata", path)?;
        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = Self::check(response, "metadata", path).await?;

        let envelope: Envelope<MetadataData> = response
            .json()
            .await
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;

        let mut versions = envelope
            .data
            .map(|d| d.versions)
            .unwrap_or_default()
            .keys()
            .map(|v| {
                v.parse::<u64>()
                    .map_err(|_| StorageError::Deserialization(format!("bad version {:?}", v)))
            })
            .collect::<Result<Vec<_>>>()?;
        versions.sort_unstable();
        Ok(versions)
    }

    async fn soft_delete(&self, path: &str) -> Result<()> {
        let url = self.endpoint("metadata", path)?;
        let response = self.request(Method::DELETE, url).send().await?;
        Self::check(response, "delete", path).await?;

        debug!("Soft-deleted secret {}", path);
        Ok(())
    }

    async fn destroy(&self, path: &str, versions: &[u64]) -> Result<()> {
        let url = self.endpoint("destroy", path)?;
        let response = self
            .request(Method::POST, url)
            .json(&json!({ "versions": versions }))
            .send()
            .await?;
        Self::check(response, "destroy", path).await?;

        debug!("Destroyed secret {} versions {:?}", path, versions);
        Ok(())
    }

    async fn health(&self) -> Result<()> {
        let url = self
            .address
            .join("v1/sys/health")
            .map_err(|e| StorageError::InvalidPath(e.to_string()))?;
        let response = self.http.get(url).send().await?;
        Self::check(response, "health", "sys/health").await?;
        Ok(())
    }
}
