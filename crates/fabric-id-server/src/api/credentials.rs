use axum::{
    extract::{Path, State},
    response::Json,
};
use fabric_id_issuer::{flatten, mapper::encode_content, CredentialRequest, IssuedCredentials};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::{error::ApiError, state::AppState};

/// Reason recorded at the CA for operator-initiated revocation
pub const ADMIN_REVOCATION: &str = "admin revocation";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub user_id: String,
}

impl RegisterRequest {
    fn into_credential_request(self) -> Result<CredentialRequest, ApiError> {
        if self.username.is_empty() || self.user_id.is_empty() {
            return Err(ApiError::InvalidRequest(
                "username and user_id are required".to_string(),
            ));
        }
        Ok(CredentialRequest {
            username: self.username,
            password: Zeroizing::new(self.password.unwrap_or_default()),
            user_id: self.user_id,
        })
    }
}

#[derive(Deserialize)]
pub struct EnrollRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct CredentialsResponse {
    pub username: String,
    pub password: String,
    pub message: &'static str,
}

impl CredentialsResponse {
    fn new(issued: IssuedCredentials, message: &'static str) -> Self {
        Self {
            username: issued.username,
            password: issued.password.as_str().to_owned(),
            message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub username: String,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MspResponse {
    pub username: String,
    /// Base64 content keyed by bundle path
    pub msp: BTreeMap<String, String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/credentials/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<CredentialsResponse>, ApiError> {
    let request = req.into_credential_request()?;
    let issued = state.issuer.register(request).await?;

    Ok(Json(CredentialsResponse::new(
        issued,
        "User registered successfully",
    )))
}

/// POST /v1/credentials/enroll
pub async fn enroll(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EnrollRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let password = Zeroizing::new(req.password);
    if req.username.is_empty() || password.is_empty() {
        return Err(ApiError::InvalidRequest(
            "username and password are required".to_string(),
        ));
    }

    // Run detached so a dropped connection cannot interrupt compensation.
    let issuer = state.issuer.clone();
    let username = req.username.clone();
    tokio::spawn(async move { issuer.enroll_and_persist(&username, &password).await })
        .await
        .map_err(|e| ApiError::Internal(e.into()))??;

    Ok(Json(StatusResponse {
        username: req.username,
        message: "User enrolled and MSP stored successfully",
    }))
}

/// POST /v1/credentials
pub async fn issue(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<CredentialsResponse>, ApiError> {
    let request = req.into_credential_request()?;

    let issuer = state.issuer.clone();
    let issued = tokio::spawn(async move { issuer.issue_and_persist(request).await })
        .await
        .map_err(|e| ApiError::Internal(e.into()))??;

    Ok(Json(CredentialsResponse::new(
        issued,
        "User registered, enrolled and MSP stored successfully",
    )))
}

/// DELETE /v1/credentials/:username
pub async fn revoke(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.issuer.revoke(&username, ADMIN_REVOCATION).await?;

    Ok(Json(StatusResponse {
        username,
        message: "User revoked and MSP removed successfully",
    }))
}

/// GET /v1/credentials/:username/msp
pub async fn get_msp(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<MspResponse>, ApiError> {
    let bundle = state.issuer.load_bundle(&username).await?;

    let msp = flatten(&bundle)
        .into_iter()
        .map(|entry| (entry.path, encode_content(&entry.content)))
        .collect();

    Ok(Json(MspResponse { username, msp }))
}
