//! Defines the HTTP routes for event management.

use super::handlers::{add_guest, create_event, get_event_by_id, get_guest};
use crate::auth::middleware::{organizer_auth, staff_auth};
use axum::{
    Router, middleware,
    routing::{get, post},
};

pub fn event_router() -> Router {
    Router::new()
        .route(
            "/",
            post(create_event).layer(middleware::from_fn(organizer_auth)),
        )
        .route("/{id}", get(get_event_by_id))
        .route(
            "/{id}/guests",
            post(add_guest).layer(middleware::from_fn(organizer_auth)),
        )
        .route("/{id}/guests/{guest_id}", get(get_guest))
        .layer(middleware::from_fn(staff_auth))
}
