//! Handler functions for scanning session endpoints.

use crate::api::common::{ApiError, ApiResponse, service_error_to_http, validate_request};
use crate::errors::ServiceError;
use crate::services::checkin::{
    CheckInCoordinator, FeedStatus, ScanPhase, ScanReport, ScanSessionRegistry, SessionSnapshot,
};
use crate::utils::jwt::StaffClaims;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    #[validate(length(min = 1, max = 128, message = "Event ID is required"))]
    pub event_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DecodeRequest {
    /// Raw text decoded from the QR image.
    #[validate(length(min = 1, max = 8192, message = "Decoded text must be between 1-8192 characters"))]
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenedSession {
    pub session_id: String,
    pub session: SessionSnapshot,
}

/// Whether a decode was processed or dropped because the session was busy.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStatus {
    Processed,
    Ignored,
}

#[derive(Debug, Serialize)]
pub struct DecodeResponse {
    pub status: DecodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ScanReport>,
    pub phase: ScanPhase,
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub queued: bool,
}

/// Resolves a session owned by the calling staff member.
fn owned_session(
    registry: &ScanSessionRegistry,
    id: &str,
    claims: &StaffClaims,
) -> Result<Arc<CheckInCoordinator>, ApiError> {
    let coordinator = registry.get(id).map_err(service_error_to_http)?;
    if coordinator.staff_id() != claims.staff_id() {
        return Err(service_error_to_http(ServiceError::not_found(
            "Scan session",
            id,
        )));
    }
    Ok(coordinator)
}

/// Opens a scanning session bound to an event.
#[axum::debug_handler]
pub async fn open_session(
    Extension(registry): Extension<Arc<ScanSessionRegistry>>,
    Extension(claims): Extension<StaffClaims>,
    Json(payload): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OpenedSession>>), ApiError> {
    validate_request(&payload)?;

    let (session_id, coordinator) = registry
        .open(&payload.event_id, claims.staff_id())
        .await
        .map_err(service_error_to_http)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            OpenedSession {
                session_id,
                session: coordinator.snapshot(),
            },
            "Scan session opened",
        )),
    ))
}

/// Current state of a session, after applying a due cool-down.
#[axum::debug_handler]
pub async fn get_session(
    Extension(registry): Extension<Arc<ScanSessionRegistry>>,
    Extension(claims): Extension<StaffClaims>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SessionSnapshot>>, ApiError> {
    let coordinator = owned_session(&registry, &id, &claims)?;
    coordinator.poll();
    Ok(Json(ApiResponse::ok(coordinator.snapshot())))
}

#[axum::debug_handler]
pub async fn start_session(
    Extension(registry): Extension<Arc<ScanSessionRegistry>>,
    Extension(claims): Extension<StaffClaims>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ScanPhase>>, ApiError> {
    let coordinator = owned_session(&registry, &id, &claims)?;
    Ok(Json(ApiResponse::ok(coordinator.start())))
}

#[axum::debug_handler]
pub async fn stop_session(
    Extension(registry): Extension<Arc<ScanSessionRegistry>>,
    Extension(claims): Extension<StaffClaims>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ScanPhase>>, ApiError> {
    let coordinator = owned_session(&registry, &id, &claims)?;
    Ok(Json(ApiResponse::ok(coordinator.stop())))
}

#[axum::debug_handler]
pub async fn restart_session(
    Extension(registry): Extension<Arc<ScanSessionRegistry>>,
    Extension(claims): Extension<StaffClaims>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ScanPhase>>, ApiError> {
    let coordinator = owned_session(&registry, &id, &claims)?;
    Ok(Json(ApiResponse::ok(coordinator.restart())))
}

/// Dismisses the result on screen without waiting for the cool-down.
#[axum::debug_handler]
pub async fn next_scan(
    Extension(registry): Extension<Arc<ScanSessionRegistry>>,
    Extension(claims): Extension<StaffClaims>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ScanPhase>>, ApiError> {
    let coordinator = owned_session(&registry, &id, &claims)?;
    Ok(Json(ApiResponse::ok(coordinator.scan_next())))
}

/// Submits one decoded QR string and waits for the verdict.
#[axum::debug_handler]
pub async fn decode(
    Extension(registry): Extension<Arc<ScanSessionRegistry>>,
    Extension(claims): Extension<StaffClaims>,
    Path(id): Path<String>,
    Json(payload): Json<DecodeRequest>,
) -> Result<Json<ApiResponse<DecodeResponse>>, ApiError> {
    validate_request(&payload)?;

    let coordinator = owned_session(&registry, &id, &claims)?;
    coordinator.poll();

    // Spawned so a client disconnect cannot cancel a check-in mid-commit.
    let report = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.submit(&payload.text).await }
    })
    .await
    .map_err(|e| {
        service_error_to_http(ServiceError::internal_error(format!(
            "Scan task failed: {}",
            e
        )))
    })?;

    let response = DecodeResponse {
        status: if report.is_some() {
            DecodeStatus::Processed
        } else {
            DecodeStatus::Ignored
        },
        report,
        phase: coordinator.phase(),
    };
    Ok(Json(ApiResponse::ok(response)))
}

/// Queues decoded text for the session's background scan loop.
#[axum::debug_handler]
pub async fn feed(
    Extension(registry): Extension<Arc<ScanSessionRegistry>>,
    Extension(claims): Extension<StaffClaims>,
    Path(id): Path<String>,
    Json(payload): Json<DecodeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FeedResponse>>), ApiError> {
    validate_request(&payload)?;
    owned_session(&registry, &id, &claims)?;

    let status = registry
        .feed(&id, payload.text)
        .map_err(service_error_to_http)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::ok(FeedResponse {
            queued: status == FeedStatus::Queued,
        })),
    ))
}

/// Stops and discards a session.
#[axum::debug_handler]
pub async fn close_session(
    Extension(registry): Extension<Arc<ScanSessionRegistry>>,
    Extension(claims): Extension<StaffClaims>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    owned_session(&registry, &id, &claims)?;
    registry.close(&id).map_err(service_error_to_http)?;
    Ok(Json(ApiResponse::success((), "Scan session closed")))
}
