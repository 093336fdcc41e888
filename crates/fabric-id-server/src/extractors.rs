use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use fabric_id_records::GatewayIdentity;

use crate::error::ApiError;

/// Base64 PEM certificate of the caller
pub const USER_CERT_HEADER: &str = "x-user-cert";
/// Base64 PEM private key of the caller
pub const USER_KEY_HEADER: &str = "x-user-key";
/// MSP id of the caller
pub const USER_MSPID_HEADER: &str = "x-user-mspid";

/// Caller identity forwarded with a gateway request
///
/// Rejects with 400 when a header is missing and 401 when the material
/// cannot be used as an identity.
pub struct CallerIdentity(pub GatewayIdentity);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::InvalidRequest(format!("missing {} header", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let cert = header(parts, USER_CERT_HEADER)?;
        let key = header(parts, USER_KEY_HEADER)?;
        let msp_id = header(parts, USER_MSPID_HEADER)?;

        let identity = GatewayIdentity::from_encoded(cert, key, msp_id).map_err(|e| {
            tracing::warn!("Rejected caller identity: {}", e);
            ApiError::Unauthorized(e.to_string())
        })?;

        Ok(CallerIdentity(identity))
    }
}
