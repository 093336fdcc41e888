//! # fabric-id-server
//!
//! HTTP surface of the enrollment service and the identity gateway.
//!
//! Enrollment routes drive the credential issuer; identity routes forward
//! the caller's certificate, key and MSP id with every request and submit
//! or evaluate contract transactions on the caller's behalf.

#![warn(clippy::all)]

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

pub mod api;
pub mod config;
pub mod error;
pub mod extractors;
pub mod state;

pub use config::Config;
pub use state::AppState;

/// Build the router over shared application state
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health checks
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))

        // Credential enrollment
        .route("/v1/credentials", post(api::credentials::issue))
        .route("/v1/credentials/register", post(api::credentials::register))
        .route("/v1/credentials/enroll", post(api::credentials::enroll))
        .route("/v1/credentials/:username", delete(api::credentials::revoke))
        .route("/v1/credentials/:username/msp", get(api::credentials::get_msp))

        // Identity records
        .route("/v1/identity", post(api::identity::create_identity))
        .route(
            "/v1/identity/:id",
            get(api::identity::get_identity)
                .put(api::identity::update_identity)
                .delete(api::identity::delete_identity),
        )

        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
