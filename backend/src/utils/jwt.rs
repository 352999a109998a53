//! JWT utilities for identifying the staff member behind a request.
//!
//! Staff tokens are minted by the organizer back office; this service only
//! validates them and reads the acting staff id used for `checked_in_by`.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// JWT claims identifying a staff member.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StaffClaims {
    /// Staff user ID
    pub sub: String,
    /// Staff role, e.g. "scanner" or "organizer"
    #[serde(default)]
    pub role: String,
    /// Token expiration timestamp
    pub exp: usize,
    /// Token issued at timestamp
    pub iat: usize,
}

impl StaffClaims {
    pub fn staff_id(&self) -> &str {
        &self.sub
    }

    pub fn role(&self) -> &str {
        &self.role
    }
}

/// JWT token utility for validating staff tokens.
pub struct JwtUtils {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtUtils {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        JwtUtils {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Generate a staff token valid for `lifetime`.
    pub fn generate_token(
        &self,
        staff_id: impl Into<String>,
        role: impl Into<String>,
        lifetime: Duration,
    ) -> Result<String, ServiceError> {
        let now = Utc::now();
        let exp = now + lifetime;

        let claims = StaffClaims {
            sub: staff_id.into(),
            role: role.into(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::internal_error(format!("Token generation failed: {}", e)))
    }

    /// Validate and decode a staff token.
    pub fn validate_token(&self, token: &str) -> Result<StaffClaims, ServiceError> {
        let claims = decode::<StaffClaims>(token, &self.decoding_key, &self.validation)
            .map(|token_data| token_data.claims)
            .map_err(|e| ServiceError::validation(format!("Token validation failed: {}", e)))?;

        if claims.sub.trim().is_empty() {
            return Err(ServiceError::validation("Token has no staff id"));
        }

        Ok(claims)
    }
}
