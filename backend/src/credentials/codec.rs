//! Issues and verifies check-in tokens.
//!
//! A token is `base64(nonce || AES-256-GCM(payload JSON)) + "." + hex(HMAC-SHA256)`
//! where the MAC covers the base64 ciphertext segment exactly as transmitted.
//! Verification checks the MAC before it touches the cipher.

use crate::config::CryptoConfig;
use crate::credentials::payload::{CredentialPayload, DEFAULT_LIFETIME_HOURS};
use crate::errors::{CredentialError, CredentialResult};
use crate::utils::crypto::{IntegrityStamper, SymmetricCipher};

const SEPARATOR: char = '.';

/// Input for [`TokenCodec::issue`].
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub guest_id: String,
    pub event_id: String,
    /// Defaults to 24 hours.
    pub lifetime_hours: Option<u32>,
}

impl IssueRequest {
    pub fn new(guest_id: impl Into<String>, event_id: impl Into<String>) -> Self {
        Self {
            guest_id: guest_id.into(),
            event_id: event_id.into(),
            lifetime_hours: None,
        }
    }

    pub fn with_lifetime_hours(mut self, hours: u32) -> Self {
        self.lifetime_hours = Some(hours);
        self
    }
}

/// A freshly issued token together with the payload it seals.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub payload: CredentialPayload,
}

/// Seals payloads into tokens and opens them again.
#[derive(Clone)]
pub struct TokenCodec {
    cipher: SymmetricCipher,
    stamper: IntegrityStamper,
}

impl TokenCodec {
    pub fn new(config: &CryptoConfig) -> CredentialResult<Self> {
        let cipher = SymmetricCipher::new(config.cipher_key())
            .map_err(|e| CredentialError::Crypto(e.to_string()))?;
        let stamper = IntegrityStamper::new(config.mac_key())
            .map_err(|e| CredentialError::Crypto(e.to_string()))?;
        Ok(Self { cipher, stamper })
    }

    /// Issues a token for a guest, valid from `now_millis` for the requested lifetime.
    pub fn issue(&self, request: &IssueRequest, now_millis: i64) -> CredentialResult<IssuedToken> {
        let payload = CredentialPayload::new(
            &request.guest_id,
            &request.event_id,
            now_millis,
            request.lifetime_hours.unwrap_or(DEFAULT_LIFETIME_HOURS),
        )?;

        let token = self.seal(&payload.to_json()?)?;
        tracing::debug!(
            event_id = %payload.event_id,
            guest_id = %payload.guest_id,
            expires_at = payload.expires_at_millis,
            "issued check-in token"
        );

        Ok(IssuedToken { token, payload })
    }

    /// Verifies a token and returns its payload.
    ///
    /// # Errors
    /// - `MalformedToken` for anything but two non-empty segments, or a payload that fails the schema
    /// - `Integrity` when the MAC does not match
    /// - `Decryption` when the ciphertext cannot be opened
    /// - `Expired` when `now_millis` is past the expiry
    pub fn verify(&self, token: &str, now_millis: i64) -> CredentialResult<CredentialPayload> {
        let (ciphertext, stamp) = split_token(token)?;

        if !self.stamper.verify(ciphertext.as_bytes(), stamp) {
            return Err(CredentialError::Integrity);
        }

        let plaintext = self
            .cipher
            .decrypt(ciphertext)
            .map_err(|_| CredentialError::Decryption)?;
        if plaintext.is_empty() {
            return Err(CredentialError::Decryption);
        }

        let payload = CredentialPayload::from_json(&plaintext)?;

        if payload.is_expired_at(now_millis) {
            return Err(CredentialError::Expired {
                expired_at_millis: payload.expires_at_millis,
            });
        }

        Ok(payload)
    }

    fn seal(&self, plaintext: &str) -> CredentialResult<String> {
        let ciphertext = self
            .cipher
            .encrypt(plaintext)
            .map_err(|e| CredentialError::Crypto(e.to_string()))?;
        let stamp = self.stamper.stamp(ciphertext.as_bytes());
        Ok(format!("{ciphertext}{SEPARATOR}{stamp}"))
    }
}

fn split_token(token: &str) -> CredentialResult<(&str, &str)> {
    let mut parts = token.split(SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(ciphertext), Some(stamp), None) if !ciphertext.is_empty() && !stamp.is_empty() => {
            Ok((ciphertext, stamp))
        }
        _ => Err(CredentialError::MalformedToken(
            "expected '<ciphertext>.<mac>'".to_string(),
        )),
    }
}
