//! Defines the HTTP routes for scanning sessions.

use super::handlers::{
    close_session, decode, feed, get_session, next_scan, open_session, restart_session,
    start_session, stop_session,
};
use crate::auth::middleware::staff_auth;
use axum::{
    Router, middleware,
    routing::{get, post},
};

pub fn scan_router() -> Router {
    Router::new()
        .route("/sessions", post(open_session))
        .route("/sessions/{id}", get(get_session).delete(close_session))
        .route("/sessions/{id}/start", post(start_session))
        .route("/sessions/{id}/stop", post(stop_session))
        .route("/sessions/{id}/restart", post(restart_session))
        .route("/sessions/{id}/next", post(next_scan))
        .route("/sessions/{id}/decode", post(decode))
        .route("/sessions/{id}/feed", post(feed))
        .layer(middleware::from_fn(staff_auth))
}
