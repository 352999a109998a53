//! Credential business logic service.
//!
//! Issues check-in credentials for guests on an event's list and verifies
//! tokens outside a scanning session (support desk, re-print checks).

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::credentials::{CredentialPayload, IssueRequest, TokenCodec, envelope};
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::GuestStore;
use crate::utils::clock::Clock;

/// Longest lifetime a credential may be issued with: 30 days.
pub const MAX_LIFETIME_HOURS: u32 = 24 * 30;

/// Issuance request as accepted from the organizer back office.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IssueCredential {
    #[validate(length(min = 1, max = 128, message = "Event ID is required"))]
    pub event_id: String,
    #[validate(length(min = 1, max = 128, message = "Guest ID is required"))]
    pub guest_id: String,
    #[validate(range(min = 1, max = 720, message = "Lifetime must be between 1-720 hours"))]
    pub lifetime_hours: Option<u32>,
}

/// A credential ready to be rendered as a QR code.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCredential {
    pub token: String,
    /// The envelope JSON to encode in the QR image.
    pub qr_payload: String,
    pub event_id: String,
    pub guest_id: String,
    pub issued_at_millis: i64,
    pub expires_at_millis: i64,
}

pub struct CredentialService {
    codec: Arc<TokenCodec>,
    guests: Arc<dyn GuestStore>,
    clock: Arc<dyn Clock>,
}

impl CredentialService {
    pub fn new(codec: Arc<TokenCodec>, guests: Arc<dyn GuestStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            codec,
            guests,
            clock,
        }
    }

    /// Issues a credential for a guest on the event's list.
    ///
    /// Re-issuing to a guest who has not been admitted yet is allowed; the
    /// old token stays valid until it expires.
    ///
    /// # Errors
    /// Returns `ServiceError` for:
    /// - Validation failures
    /// - Unknown guest
    /// - A guest who is already checked in
    pub async fn issue_for_guest(&self, request: IssueCredential) -> ServiceResult<IssuedCredential> {
        if let Err(validation_errors) = request.validate() {
            let error_messages: Vec<String> = validation_errors
                .field_errors()
                .into_iter()
                .flat_map(|(field, errors)| {
                    errors.iter().map(move |error| {
                        format!(
                            "{}: {}",
                            field,
                            error.message.as_ref().unwrap_or(&"Invalid value".into())
                        )
                    })
                })
                .collect();

            return Err(ServiceError::validation(error_messages.join(", ")));
        }

        let event_id = request.event_id.trim();
        let guest_id = request.guest_id.trim();

        let guest = self
            .guests
            .get_guest(event_id, guest_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Guest", guest_id))?;

        if guest.checked_in {
            return Err(ServiceError::invalid_operation(format!(
                "Guest '{}' is already checked in to event '{}'",
                guest.id, guest.event_id
            )));
        }

        let mut issue = IssueRequest::new(&guest.id, &guest.event_id);
        if let Some(hours) = request.lifetime_hours {
            issue = issue.with_lifetime_hours(hours);
        }

        let now = self.clock.now_millis();
        let issued = self.codec.issue(&issue, now)?;
        let qr_payload = envelope::pack(&issued.token, &guest.event_id, &guest.id, now)?;

        info!(
            event_id = %guest.event_id,
            guest_id = %guest.id,
            expires_at = issued.payload.expires_at_millis,
            "credential issued"
        );

        Ok(IssuedCredential {
            token: issued.token,
            qr_payload,
            event_id: issued.payload.event_id,
            guest_id: issued.payload.guest_id,
            issued_at_millis: issued.payload.issued_at_millis,
            expires_at_millis: issued.payload.expires_at_millis,
        })
    }

    /// Verifies a token, or the envelope text it was scanned as.
    pub fn verify_token(&self, text: &str) -> ServiceResult<CredentialPayload> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::validation("Token is required"));
        }

        let token = if text.starts_with('{') {
            envelope::unpack(text)?.token
        } else {
            text.to_string()
        };

        Ok(self.codec.verify(&token, self.clock.now_millis())?)
    }
}
