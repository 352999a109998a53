//! Handler functions for credential API endpoints.

use crate::api::common::{ApiError, ApiResponse, service_error_to_http, validate_request};
use crate::credentials::CredentialPayload;
use crate::services::credential_service::{CredentialService, IssueCredential, IssuedCredential};
use crate::utils::jwt::StaffClaims;
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyCredentialRequest {
    /// A bare token or the full scanned envelope.
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

/// Issues a QR credential for a guest on an event's list.
#[axum::debug_handler]
pub async fn issue_credential(
    Extension(service): Extension<Arc<CredentialService>>,
    Extension(claims): Extension<StaffClaims>,
    Json(payload): Json<IssueCredential>,
) -> Result<(StatusCode, Json<ApiResponse<IssuedCredential>>), ApiError> {
    validate_request(&payload)?;

    tracing::info!(
        "Issuing credential for guest {} of event {} (requested by {})",
        payload.guest_id,
        payload.event_id,
        claims.staff_id()
    );

    let issued = service
        .issue_for_guest(payload)
        .await
        .map_err(service_error_to_http)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(issued, "Credential issued successfully")),
    ))
}

/// Verifies a token without admitting anyone.
#[axum::debug_handler]
pub async fn verify_credential(
    Extension(service): Extension<Arc<CredentialService>>,
    Json(payload): Json<VerifyCredentialRequest>,
) -> Result<Json<ApiResponse<CredentialPayload>>, ApiError> {
    validate_request(&payload)?;

    let verified = service
        .verify_token(&payload.token)
        .map_err(service_error_to_http)?;

    Ok(Json(ApiResponse::success(verified, "Credential is valid")))
}
