//! Defines the HTTP routes for credential issuance and verification.

use super::handlers::{issue_credential, verify_credential};
use crate::auth::middleware::{organizer_auth, staff_auth};
use axum::{Router, middleware, routing::post};

pub fn credential_router() -> Router {
    Router::new()
        .route(
            "/issue",
            post(issue_credential).layer(middleware::from_fn(organizer_auth)),
        )
        .route("/verify", post(verify_credential))
        .layer(middleware::from_fn(staff_auth))
}
