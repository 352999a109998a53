//! The JSON document rendered into the QR image.
//!
//! ```json
//! { "token": "<wire-token>", "app": "qr-events", "version": "1.0",
//!   "timestamp": 1700000000000, "eventId": "EVT_1", "guestId": "GST_1" }
//! ```
//!
//! The plaintext ids are display hints. Admission decisions only ever use the
//! ids recovered from the verified token.

use serde::{Deserialize, Serialize};

use crate::errors::{CredentialError, CredentialResult};
use crate::utils::deserialize_optional_id;

/// App tag that marks a QR code as one of ours.
pub const APP_TAG: &str = "qr-events";
pub const ENVELOPE_VERSION: &str = "1.0";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingEnvelope<'a> {
    token: &'a str,
    app: &'static str,
    version: &'static str,
    timestamp: i64,
    event_id: &'a str,
    guest_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomingEnvelope {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    app: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    event_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    guest_id: Option<String>,
}

/// What a scanned envelope carries, before any cryptographic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackedEnvelope {
    pub token: String,
    pub event_id: Option<String>,
    pub guest_id: Option<String>,
}

/// Wraps a token into the envelope JSON encoded in the QR image.
pub fn pack(
    token: &str,
    event_id: &str,
    guest_id: &str,
    now_millis: i64,
) -> CredentialResult<String> {
    let envelope = OutgoingEnvelope {
        token,
        app: APP_TAG,
        version: ENVELOPE_VERSION,
        timestamp: now_millis,
        event_id: event_id.trim(),
        guest_id: guest_id.trim(),
    };
    serde_json::to_string(&envelope).map_err(|e| CredentialError::Crypto(e.to_string()))
}

/// Parses scanned text into an envelope.
///
/// Cheap structural checks only: non-JSON text, a missing token or a foreign
/// app tag are rejected here without touching the cipher.
pub fn unpack(text: &str) -> CredentialResult<UnpackedEnvelope> {
    let envelope: IncomingEnvelope = serde_json::from_str(text)
        .map_err(|e| CredentialError::MalformedEnvelope(format!("not a check-in QR code: {}", e)))?;

    let token = envelope
        .token
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| CredentialError::MalformedEnvelope("missing token".to_string()))?;

    match envelope.app.as_deref() {
        Some(APP_TAG) => {}
        Some(other) => {
            return Err(CredentialError::MalformedEnvelope(format!(
                "QR code belongs to app '{}'",
                other
            )));
        }
        None => {
            return Err(CredentialError::MalformedEnvelope(
                "missing app tag".to_string(),
            ));
        }
    }

    Ok(UnpackedEnvelope {
        token: token.trim().to_string(),
        event_id: envelope.event_id,
        guest_id: envelope.guest_id,
    })
}
