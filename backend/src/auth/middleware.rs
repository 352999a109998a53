//! Middleware for protecting staff routes and handling authorization.
//!
//! Tokens are validated with the shared `JwtUtils` placed in the request
//! extensions at router construction; the decoded `StaffClaims` are inserted
//! back into the extensions for handlers.

use crate::utils::jwt::{JwtUtils, StaffClaims};
use axum::{
    extract::Request,
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Role allowed to manage events and guest lists.
pub const ORGANIZER_ROLE: &str = "organizer";

/// Staff JWT authentication middleware
pub async fn staff_auth(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let jwt_utils = request
        .extensions()
        .get::<Arc<JwtUtils>>()
        .cloned()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    match jwt_utils.validate_token(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::debug!("Rejected staff token: {}", e);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Organizer role authorization middleware; runs after `staff_auth`.
pub async fn organizer_auth(request: Request, next: Next) -> Result<Response, StatusCode> {
    let claims = request
        .extensions()
        .get::<StaffClaims>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if claims.role() != ORGANIZER_ROLE {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}
