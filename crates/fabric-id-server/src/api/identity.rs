use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use fabric_id_records::{IdentityPatch, IdentityRecord, Transaction};
use serde::Serialize;
use std::sync::Arc;

use crate::{error::ApiError, extractors::CallerIdentity, state::AppState};

#[derive(Debug, Serialize)]
pub struct DeleteIdentityResponse {
    pub id: String,
    pub message: &'static str,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|e| ApiError::Internal(e.into()))
}

fn record_from(bytes: &[u8]) -> Result<IdentityRecord, ApiError> {
    serde_json::from_slice(bytes).map_err(|e| ApiError::Internal(e.into()))
}

/// POST /v1/identity
pub async fn create_identity(
    State(state): State<Arc<AppState>>,
    CallerIdentity(identity): CallerIdentity,
    Json(record): Json<IdentityRecord>,
) -> Result<(StatusCode, Json<IdentityRecord>), ApiError> {
    if let Some(field) = record.first_missing_field() {
        return Err(ApiError::InvalidRequest(format!("{} is required", field)));
    }

    let result = state
        .gateway
        .submit(Transaction::CreateIdentity, &[to_json(&record)?], &identity)
        .await?;

    Ok((StatusCode::CREATED, Json(record_from(&result)?)))
}

/// GET /v1/identity/:id
pub async fn get_identity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    CallerIdentity(identity): CallerIdentity,
) -> Result<Json<IdentityRecord>, ApiError> {
    let result = state
        .gateway
        .evaluate(Transaction::ReadIdentity, &[id], &identity)
        .await?;

    Ok(Json(record_from(&result)?))
}

/// PUT /v1/identity/:id
pub async fn update_identity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    CallerIdentity(identity): CallerIdentity,
    Json(patch): Json<IdentityPatch>,
) -> Result<Json<IdentityRecord>, ApiError> {
    let result = state
        .gateway
        .submit(Transaction::UpdateIdentity, &[id, to_json(&patch)?], &identity)
        .await?;

    Ok(Json(record_from(&result)?))
}

/// DELETE /v1/identity/:id
pub async fn delete_identity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    CallerIdentity(identity): CallerIdentity,
) -> Result<Json<DeleteIdentityResponse>, ApiError> {
    state
        .gateway
        .submit(Transaction::DeleteIdentity, &[id.clone()], &identity)
        .await?;

    Ok(Json(DeleteIdentityResponse {
        id,
        message: "Identity deleted",
    }))
}
