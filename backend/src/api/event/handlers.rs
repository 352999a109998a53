//! Handler functions for event management API endpoints.

use crate::api::common::{ApiError, ApiResponse, service_error_to_http, validate_request};
use crate::database::models::{CreateEvent, CreateGuest, Event, Guest};
use crate::errors::ServiceError;
use crate::repositories::event_repository::EventRepository;
use crate::repositories::guest_repository::GuestRepository;
use crate::utils::jwt::StaffClaims;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use validator::Validate;

/// Guest list entry; the event comes from the path.
#[derive(Debug, Deserialize, Validate)]
pub struct AddGuestRequest {
    #[validate(length(min = 1, max = 128, message = "Guest ID must be between 1-128 characters"))]
    pub id: String,
    #[validate(length(min = 1, max = 255, message = "Guest name must be between 1-255 characters"))]
    pub name: String,
    #[validate(email(message = "Must be a valid email"))]
    pub email: Option<String>,
}

/// Registers a new event.
#[axum::debug_handler]
pub async fn create_event(
    Extension(pool): Extension<SqlitePool>,
    Extension(claims): Extension<StaffClaims>,
    Json(payload): Json<CreateEvent>,
) -> Result<(StatusCode, Json<ApiResponse<Event>>), ApiError> {
    validate_request(&payload)?;

    let repo = EventRepository::new(pool);
    let existing = repo
        .get_event_by_id(payload.id.trim())
        .await
        .map_err(|e| service_error_to_http(e.into()))?;
    if existing.is_some() {
        return Err(service_error_to_http(ServiceError::invalid_operation(
            format!("Event '{}' already exists", payload.id.trim()),
        )));
    }

    let event = repo
        .create_event(payload)
        .await
        .map_err(|e| service_error_to_http(e.into()))?;

    tracing::info!("Event {} created by {}", event.id, claims.staff_id());
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(event, "Event created successfully")),
    ))
}

/// Retrieves a specific event by ID.
#[axum::debug_handler]
pub async fn get_event_by_id(
    Extension(pool): Extension<SqlitePool>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Event>>, ApiError> {
    let event = EventRepository::new(pool)
        .get_event_by_id(&id)
        .await
        .map_err(|e| service_error_to_http(e.into()))?
        .ok_or_else(|| service_error_to_http(ServiceError::not_found("Event", &id)))?;

    Ok(Json(ApiResponse::success(
        event,
        "Event retrieved successfully",
    )))
}

/// Adds a guest to an event's list.
#[axum::debug_handler]
pub async fn add_guest(
    Extension(pool): Extension<SqlitePool>,
    Path(event_id): Path<String>,
    Json(payload): Json<AddGuestRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Guest>>), ApiError> {
    validate_request(&payload)?;

    if EventRepository::new(pool.clone())
        .get_event_by_id(&event_id)
        .await
        .map_err(|e| service_error_to_http(e.into()))?
        .is_none()
    {
        return Err(service_error_to_http(ServiceError::not_found(
            "Event", &event_id,
        )));
    }

    let guests = GuestRepository::new(pool);
    let guest_id = payload.id.trim().to_string();
    if guests
        .get_guest_by_id(&event_id, &guest_id)
        .await
        .map_err(|e| service_error_to_http(e.into()))?
        .is_some()
    {
        return Err(service_error_to_http(ServiceError::invalid_operation(
            format!("Guest '{}' is already on the list", guest_id),
        )));
    }

    let guest = guests
        .create_guest(CreateGuest {
            id: guest_id,
            event_id,
            name: payload.name,
            email: payload.email,
        })
        .await
        .map_err(|e| service_error_to_http(e.into()))?;

    tracing::info!("Guest {} added to event {}", guest.id, guest.event_id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(guest, "Guest added successfully")),
    ))
}

/// Retrieves a guest, including their check-in state.
#[axum::debug_handler]
pub async fn get_guest(
    Extension(pool): Extension<SqlitePool>,
    Path((event_id, guest_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Guest>>, ApiError> {
    let guest = GuestRepository::new(pool)
        .get_guest_by_id(&event_id, &guest_id)
        .await
        .map_err(|e| service_error_to_http(e.into()))?
        .ok_or_else(|| service_error_to_http(ServiceError::not_found("Guest", &guest_id)))?;

    Ok(Json(ApiResponse::success(
        guest,
        "Guest retrieved successfully",
    )))
}
