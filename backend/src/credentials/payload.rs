//! The record sealed inside every check-in token.
//!
//! On the wire (after decryption) a version 1.0 payload reads
//! `{ guestId, eventId, timestamp, expires, used, version }`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{CredentialError, CredentialResult};
use crate::utils::deserialize_id;

/// Current payload schema version.
pub const SCHEMA_VERSION: &str = "1.0";

pub const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Lifetime used when the issuer does not ask for one.
pub const DEFAULT_LIFETIME_HOURS: u32 = 24;

/// Fields every payload must carry, by wire name.
const REQUIRED_FIELDS: [&str; 4] = ["guestId", "eventId", "timestamp", "expires"];

/// Decrypted token contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CredentialPayload {
    #[serde(deserialize_with = "deserialize_id")]
    pub guest_id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub event_id: String,
    #[serde(rename = "timestamp")]
    pub issued_at_millis: i64,
    #[serde(rename = "expires")]
    pub expires_at_millis: i64,
    /// Always false. Single use is enforced on the guest record.
    #[serde(default)]
    pub used: bool,
    #[serde(rename = "version", default = "current_version")]
    pub schema_version: String,
}

fn current_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// Payload layouts this build understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadSchema {
    V1,
}

impl PayloadSchema {
    /// Payloads without a version predate versioning and share the 1.0 layout.
    fn detect(fields: &Map<String, Value>) -> CredentialResult<Self> {
        match fields.get("version") {
            None | Some(Value::Null) => Ok(PayloadSchema::V1),
            Some(Value::String(v)) if v == SCHEMA_VERSION => Ok(PayloadSchema::V1),
            Some(other) => Err(CredentialError::MalformedToken(format!(
                "unsupported payload version {}",
                other
            ))),
        }
    }
}

impl CredentialPayload {
    /// Builds a fresh payload. Ids are trimmed.
    pub fn new(
        guest_id: &str,
        event_id: &str,
        issued_at_millis: i64,
        lifetime_hours: u32,
    ) -> CredentialResult<Self> {
        let guest_id = guest_id.trim();
        let event_id = event_id.trim();
        if guest_id.is_empty() {
            return Err(CredentialError::Validation("guest id is required".to_string()));
        }
        if event_id.is_empty() {
            return Err(CredentialError::Validation("event id is required".to_string()));
        }
        if lifetime_hours == 0 {
            return Err(CredentialError::Validation(
                "lifetime must be at least one hour".to_string(),
            ));
        }

        let expires_at_millis = issued_at_millis
            .checked_add(i64::from(lifetime_hours) * MILLIS_PER_HOUR)
            .ok_or_else(|| CredentialError::Validation("lifetime is out of range".to_string()))?;

        Ok(Self {
            guest_id: guest_id.to_string(),
            event_id: event_id.to_string(),
            issued_at_millis,
            expires_at_millis,
            used: false,
            schema_version: SCHEMA_VERSION.to_string(),
        })
    }

    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        now_millis > self.expires_at_millis
    }

    pub(crate) fn to_json(&self) -> CredentialResult<String> {
        serde_json::to_string(self).map_err(|e| CredentialError::Crypto(e.to_string()))
    }

    /// Parses decrypted JSON, checking required fields and the schema version.
    pub(crate) fn from_json(json: &str) -> CredentialResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| CredentialError::MalformedToken(format!("payload is not JSON: {}", e)))?;
        let Value::Object(fields) = value else {
            return Err(CredentialError::MalformedToken(
                "payload is not a JSON object".to_string(),
            ));
        };

        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|name| fields.get(*name).is_none_or(Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(CredentialError::MalformedToken(format!(
                "missing fields: {}",
                missing.join(", ")
            )));
        }

        let payload = match PayloadSchema::detect(&fields)? {
            PayloadSchema::V1 => serde_json::from_value::<CredentialPayload>(Value::Object(fields))
                .map_err(|e| CredentialError::MalformedToken(e.to_string()))?,
        };

        if payload.expires_at_millis <= payload.issued_at_millis {
            return Err(CredentialError::MalformedToken(
                "payload expires before it was issued".to_string(),
            ));
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_payload_computes_expiry_from_hours() {
        let payload = CredentialPayload::new(" GST_1 ", "EVT_1\t", 1_000, 2).unwrap();
        assert_eq!(payload.guest_id, "GST_1");
        assert_eq!(payload.event_id, "EVT_1");
        assert_eq!(payload.expires_at_millis, 1_000 + 2 * MILLIS_PER_HOUR);
        assert!(!payload.used);
        assert_eq!(payload.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let payload = CredentialPayload::new("GST_1", "EVT_1", 5, 1).unwrap();
        let value: Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "guestId": "GST_1",
                "eventId": "EVT_1",
                "timestamp": 5,
                "expires": 5 + MILLIS_PER_HOUR,
                "used": false,
                "version": "1.0"
            })
        );
    }

    #[test]
    fn missing_fields_are_listed() {
        let error = CredentialPayload::from_json(r#"{"guestId":"GST_1"}"#).unwrap_err();
        match error {
            CredentialError::MalformedToken(message) => {
                assert!(message.contains("eventId"));
                assert!(message.contains("timestamp"));
                assert!(message.contains("expires"));
                assert!(!message.contains("guestId"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unversioned_payloads_read_as_current_schema() {
        let payload = CredentialPayload::from_json(
            r#"{"guestId":" 7 ","eventId":12,"timestamp":1,"expires":2}"#,
        )
        .unwrap();
        assert_eq!(payload.guest_id, "7");
        assert_eq!(payload.event_id, "12");
        assert_eq!(payload.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn unknown_versions_and_fields_are_rejected() {
        let future = r#"{"guestId":"g","eventId":"e","timestamp":1,"expires":2,"version":"2.0"}"#;
        assert!(matches!(
            CredentialPayload::from_json(future),
            Err(CredentialError::MalformedToken(_))
        ));

        let extra = r#"{"guestId":"g","eventId":"e","timestamp":1,"expires":2,"seat":"A1"}"#;
        assert!(matches!(
            CredentialPayload::from_json(extra),
            Err(CredentialError::MalformedToken(_))
        ));
    }

    #[test]
    fn rejects_inverted_lifetime() {
        let inverted = r#"{"guestId":"g","eventId":"e","timestamp":10,"expires":10}"#;
        assert!(matches!(
            CredentialPayload::from_json(inverted),
            Err(CredentialError::MalformedToken(_))
        ));
    }
}
