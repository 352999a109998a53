//! Central module for organizing the application's API endpoints.
//!
//! This module acts as a top-level container for the API domains (events,
//! credentials, scanning) and assembles them into the application router.

pub mod common;
pub mod credential;
pub mod event;
pub mod scan;

use crate::api::common::ApiResponse;
use crate::services::checkin::ScanSessionRegistry;
use crate::services::credential_service::CredentialService;
use crate::utils::jwt::JwtUtils;
use axum::{Extension, Router, response::Json, routing::get};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared handles the handlers pull out of request extensions.
#[derive(Clone)]
pub struct AppContext {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtUtils>,
    pub credentials: Arc<CredentialService>,
    pub scans: Arc<ScanSessionRegistry>,
}

/// Builds the full application router.
pub fn app(context: AppContext) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .nest("/api/events", event::routes::event_router())
        .nest("/api/credentials", credential::routes::credential_router())
        .nest("/api/scan", scan::routes::scan_router())
        .layer(Extension(context.pool))
        .layer(Extension(context.jwt))
        .layer(Extension(context.credentials))
        .layer(Extension(context.scans))
}

async fn root_handler() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(
        serde_json::json!({
            "service": "Check-in Backend",
            "version": env!("CARGO_PKG_VERSION")
        }),
        "Welcome to the check-in API",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::middleware::ORGANIZER_ROLE;
    use crate::database::Database;
    use crate::repositories::event_repository::EventRepository;
    use crate::repositories::guest_repository::GuestRepository;
    use crate::services::checkin::ScanSettings;
    use crate::services::test_support::test_codec;
    use crate::utils::clock::SystemClock;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct Harness {
        app: Router,
        jwt: Arc<JwtUtils>,
    }

    impl Harness {
        async fn new() -> Self {
            let db = Database::in_memory().await.unwrap();
            let pool = db.pool().clone();
            let codec = test_codec();
            let guests = Arc::new(GuestRepository::new(pool.clone()));
            let events = Arc::new(EventRepository::new(pool.clone()));
            let clock = Arc::new(SystemClock);
            let jwt = Arc::new(JwtUtils::new("router-test-secret"));

            let app = app(AppContext {
                pool,
                jwt: jwt.clone(),
                credentials: Arc::new(CredentialService::new(
                    codec.clone(),
                    guests.clone(),
                    clock.clone(),
                )),
                scans: Arc::new(ScanSessionRegistry::new(
                    codec,
                    guests,
                    events,
                    clock,
                    ScanSettings::default(),
                )),
            });
            Self { app, jwt }
        }

        fn token(&self, staff_id: &str, role: &str) -> String {
            self.jwt
                .generate_token(staff_id, role, chrono::Duration::hours(1))
                .unwrap()
        }

        async fn call(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let body = match body {
                Some(json) => {
                    request = request.header(header::CONTENT_TYPE, "application/json");
                    Body::from(json.to_string())
                }
                None => Body::empty(),
            };

            let response = self
                .app
                .clone()
                .oneshot(request.body(body).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }

        async fn seed_guest(&self, organizer: &str) {
            let (status, _) = self
                .call(
                    "POST",
                    "/api/events",
                    Some(organizer),
                    Some(json!({ "id": "EVT_1", "name": "Gala" })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);

            let (status, _) = self
                .call(
                    "POST",
                    "/api/events/EVT_1/guests",
                    Some(organizer),
                    Some(json!({ "id": "GST_1", "name": "Ada" })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }
    }

    #[tokio::test]
    async fn requests_without_a_staff_token_are_refused() {
        let harness = Harness::new().await;
        let (status, _) = harness
            .call("POST", "/api/scan/sessions", None, Some(json!({ "eventId": "EVT_1" })))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = harness
            .call("GET", "/api/events/EVT_1", Some("not-a-jwt"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn scanners_cannot_manage_events() {
        let harness = Harness::new().await;
        let scanner = harness.token("STAFF_2", "scanner");
        let (status, _) = harness
            .call(
                "POST",
                "/api/events",
                Some(&scanner),
                Some(json!({ "id": "EVT_1", "name": "Gala" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn issued_credentials_admit_a_guest_once() {
        let harness = Harness::new().await;
        let organizer = harness.token("ORG_1", ORGANIZER_ROLE);
        let scanner = harness.token("STAFF_2", "scanner");
        harness.seed_guest(&organizer).await;

        let (status, issued) = harness
            .call(
                "POST",
                "/api/credentials/issue",
                Some(&organizer),
                Some(json!({ "eventId": "EVT_1", "guestId": "GST_1" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let qr = issued["data"]["qrPayload"].as_str().unwrap().to_string();

        let (status, opened) = harness
            .call(
                "POST",
                "/api/scan/sessions",
                Some(&scanner),
                Some(json!({ "eventId": "EVT_1" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(opened["data"]["session"]["phase"], "scanning");
        let session = opened["data"]["sessionId"].as_str().unwrap().to_string();
        let decode_uri = format!("/api/scan/sessions/{session}/decode");

        let (status, first) = harness
            .call("POST", &decode_uri, Some(&scanner), Some(json!({ "text": qr })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["data"]["status"], "processed");
        assert_eq!(first["data"]["report"]["outcome"], "admitted");
        assert_eq!(first["data"]["report"]["guest"]["checked_in_by"], "STAFF_2");

        // The result is still on screen.
        let (_, ignored) = harness
            .call("POST", &decode_uri, Some(&scanner), Some(json!({ "text": qr })))
            .await;
        assert_eq!(ignored["data"]["status"], "ignored");

        let (status, phase) = harness
            .call("POST", &format!("/api/scan/sessions/{session}/next"), Some(&scanner), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(phase["data"]["phase"], "scanning");

        let (_, second) = harness
            .call("POST", &decode_uri, Some(&scanner), Some(json!({ "text": qr })))
            .await;
        assert_eq!(second["data"]["report"]["outcome"], "already_admitted");

        let (_, guest) = harness
            .call("GET", "/api/events/EVT_1/guests/GST_1", Some(&scanner), None)
            .await;
        assert_eq!(guest["data"]["checked_in"], true);
        assert_eq!(guest["data"]["checked_in_by"], "STAFF_2");

        let (status, _) = harness
            .call(
                "POST",
                "/api/credentials/issue",
                Some(&organizer),
                Some(json!({ "eventId": "EVT_1", "guestId": "GST_1" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn verify_reports_tampering() {
        let harness = Harness::new().await;
        let organizer = harness.token("ORG_1", ORGANIZER_ROLE);
        harness.seed_guest(&organizer).await;

        let (_, issued) = harness
            .call(
                "POST",
                "/api/credentials/issue",
                Some(&organizer),
                Some(json!({ "eventId": "EVT_1", "guestId": "GST_1" })),
            )
            .await;
        let token = issued["data"]["token"].as_str().unwrap().to_string();

        let (status, verified) = harness
            .call("POST", "/api/credentials/verify", Some(&organizer), Some(json!({ "token": token })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(verified["data"]["guestId"], "GST_1");
        assert_eq!(verified["data"]["used"], false);

        let mut tampered = token.clone();
        let last = if tampered.ends_with('0') { '1' } else { '0' };
        tampered.pop();
        tampered.push(last);
        let (status, rejected) = harness
            .call("POST", "/api/credentials/verify", Some(&organizer), Some(json!({ "token": tampered })))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(rejected["error"]["error_type"], "integrity_error");
    }

    #[tokio::test]
    async fn sessions_are_private_to_their_owner() {
        let harness = Harness::new().await;
        let organizer = harness.token("ORG_1", ORGANIZER_ROLE);
        let scanner = harness.token("STAFF_2", "scanner");
        let intruder = harness.token("STAFF_3", "scanner");
        harness.seed_guest(&organizer).await;

        let (_, opened) = harness
            .call("POST", "/api/scan/sessions", Some(&scanner), Some(json!({ "eventId": "EVT_1" })))
            .await;
        let session = opened["data"]["sessionId"].as_str().unwrap().to_string();
        let uri = format!("/api/scan/sessions/{session}");

        let (status, _) = harness.call("GET", &uri, Some(&intruder), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = harness.call("DELETE", &uri, Some(&scanner), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = harness.call("GET", &uri, Some(&scanner), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sessions_need_an_existing_event() {
        let harness = Harness::new().await;
        let scanner = harness.token("STAFF_2", "scanner");
        let (status, body) = harness
            .call("POST", "/api/scan/sessions", Some(&scanner), Some(json!({ "eventId": "EVT_9" })))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["error_type"], "not_found");
    }
}
