//! Global application error types and handlers.
//!
//! `CredentialError` covers everything that can go wrong between issuing a
//! credential and admitting a guest with it. `ServiceError` is the error the
//! HTTP-facing services speak, mapped to responses in `api::common`.

use thiserror::Error;

/// Failures of the credential protocol and the check-in transition.
///
/// Every variant is fail-closed: a scan that produces any of these is
/// rejected and the guest record is left untouched.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Issuance input was rejected.
    #[error("invalid credential request: {0}")]
    Validation(String),
    /// The cipher or MAC primitive failed while issuing.
    #[error("credential crypto failure: {0}")]
    Crypto(String),
    /// The token is structurally invalid or its payload does not match the schema.
    #[error("malformed token: {0}")]
    MalformedToken(String),
    /// The scanned text is not a check-in envelope.
    #[error("malformed QR: {0}")]
    MalformedEnvelope(String),
    /// MAC mismatch: the token was tampered with or sealed under other keys.
    #[error("token integrity check failed")]
    Integrity,
    /// The ciphertext could not be opened.
    #[error("token could not be decrypted")]
    Decryption,
    /// The token is past its expiry time.
    #[error("token expired at {expired_at_millis}")]
    Expired { expired_at_millis: i64 },
    /// The token belongs to a different event than the scanning session.
    #[error("wrong event: token is for event '{found}', session is bound to '{expected}'")]
    EventMismatch { expected: String, found: String },
    /// No guest with this id exists in the event.
    #[error("guest not found: '{guest_id}' in event '{event_id}'")]
    GuestNotFound { event_id: String, guest_id: String },
    /// The guest store could not be reached or failed mid-operation.
    #[error("guest store unavailable: {0}")]
    Store(#[source] anyhow::Error),
}

impl CredentialError {
    /// Stable machine-readable name of the failure, used in scan reports and API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            CredentialError::Validation(_) => "validation_error",
            CredentialError::Crypto(_) => "crypto_error",
            CredentialError::MalformedToken(_) => "malformed_token",
            CredentialError::MalformedEnvelope(_) => "malformed_envelope",
            CredentialError::Integrity => "integrity_error",
            CredentialError::Decryption => "decryption_error",
            CredentialError::Expired { .. } => "expired_token",
            CredentialError::EventMismatch { .. } => "event_mismatch",
            CredentialError::GuestNotFound { .. } => "guest_not_found",
            CredentialError::Store(_) => "store_error",
        }
    }
}

pub type CredentialResult<T> = Result<T, CredentialError>;

/// Generic service error that can be used across all entities
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{entity} not found: {identifier}")]
    NotFound { entity: String, identifier: String },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Credential rejected: {source}")]
    Credential {
        #[from]
        source: CredentialError,
    },

    #[error("Database error: {source}")]
    Database {
        #[from]
        source: anyhow::Error,
    },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    // Helper constructors for common patterns

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            identifier: identifier.into(),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}
