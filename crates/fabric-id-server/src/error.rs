use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fabric_id_issuer::{IssuerError, MapperError, SagaFailure};
use fabric_id_records::RecordError;
use serde::Serialize;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A CA, secret store or ledger call failed
    #[error("Upstream failure: {message}")]
    Upstream {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg, None),
            ApiError::Upstream { message, details } => {
                tracing::warn!("Upstream failure: {}", message);
                (StatusCode::BAD_GATEWAY, "UPSTREAM_FAILURE", message, details)
            }
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: ErrorDetails {
                code: code.to_string(),
                message,
                details,
            },
        });

        (status, body).into_response()
    }
}

impl ApiError {
    fn upstream(message: String) -> Self {
        ApiError::Upstream {
            message,
            details: None,
        }
    }
}

impl From<RecordError> for ApiError {
    fn from(error: RecordError) -> Self {
        let message = error.to_string();
        match error {
            RecordError::Validation(_) | RecordError::UnknownTransaction(_) => {
                ApiError::InvalidRequest(message)
            }
            RecordError::AlreadyExists(_) => ApiError::Conflict(message),
            RecordError::NotFound(_) => ApiError::NotFound(message),
            RecordError::Unauthorized(_) => ApiError::Forbidden(message),
            RecordError::IdentityResolution(_) | RecordError::InvalidCredentials(_) => {
                ApiError::Unauthorized(message)
            }
            RecordError::Ledger(_) => ApiError::upstream(message),
            RecordError::Serialization(_) => ApiError::Internal(anyhow::Error::new(error)),
        }
    }
}

impl From<IssuerError> for ApiError {
    fn from(error: IssuerError) -> Self {
        let message = error.to_string();
        match error {
            IssuerError::Validation(_) => ApiError::InvalidRequest(message),
            IssuerError::NotFound(_) => ApiError::NotFound(message),
            IssuerError::Mapper(MapperError::Io(_)) => {
                ApiError::Internal(anyhow::Error::new(error))
            }
            IssuerError::Registration(_)
            | IssuerError::Enrollment(_)
            | IssuerError::Revocation(_)
            | IssuerError::Persistence(_)
            | IssuerError::SecretCleanup(_)
            | IssuerError::Storage(_)
            | IssuerError::Mapper(_) => ApiError::upstream(message),
        }
    }
}

impl From<SagaFailure> for ApiError {
    fn from(failure: SagaFailure) -> Self {
        let report = failure.report;
        match ApiError::from(failure.cause) {
            ApiError::Upstream { message, .. } => ApiError::Upstream {
                message,
                details: Some(serde_json::json!({
                    "state": report.state,
                    "compensation_failed": report.compensation_failed(),
                    "compensation": report.compensation,
                })),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_id_issuer::{CaError, CompensationFailure, SagaOutcome, SagaReport, SagaState};

    async fn body(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_record_error_statuses() {
        let cases = [
            (RecordError::Validation("phone is required".into()), StatusCode::BAD_REQUEST),
            (RecordError::AlreadyExists("u1".into()), StatusCode::CONFLICT),
            (RecordError::NotFound("u1".into()), StatusCode::NOT_FOUND),
            (RecordError::Unauthorized("not owner".into()), StatusCode::FORBIDDEN),
            (RecordError::InvalidCredentials("bad pem".into()), StatusCode::UNAUTHORIZED),
        ];
        for (error, expected) in cases {
            let (status, _) = body(error.into()).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn test_saga_failure_body_flags_compensation() {
        let failure = SagaFailure {
            cause: IssuerError::Enrollment(CaError::Timeout {
                operation: "enroll",
                seconds: 60,
            }),
            report: SagaReport {
                username: "u1".into(),
                state: SagaState::Revoked,
                outcome: SagaOutcome {
                    registered: true,
                    ..Default::default()
                },
                compensation: Some(CompensationFailure {
                    reason: "enrollment failed".into(),
                    revoke_error: Some("CA down".into()),
                    cleanup_error: None,
                }),
            },
        };

        let (status, json) = body(failure.into()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["error"]["code"], "UPSTREAM_FAILURE");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Enrollment failed"));
        assert_eq!(json["error"]["details"]["state"], "revoked");
        assert_eq!(json["error"]["details"]["compensation_failed"], true);
    }
}
