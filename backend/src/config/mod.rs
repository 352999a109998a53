//! Central module for application-wide configuration settings.
//!
//! This module handles loading and managing configuration parameters such as
//! the database URL, server port, scanning behaviour and the credential keys.
//! Everything is read once at startup; a missing secret is a fatal error.

use anyhow::{Context, Result, bail};
use base64::{Engine as _, engine::general_purpose};
use std::env;
use std::fmt;
use std::time::Duration;

/// Length of the AES-256 key in bytes.
pub const CIPHER_KEY_LEN: usize = 32;
/// Shortest accepted HMAC key in bytes.
pub const MIN_MAC_KEY_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub jwt_secret: String,
    pub server_port: u16,
    pub scan_cooldown_ms: u64,
    pub scan_history_limit: usize,
    pub scan_session_idle_seconds: u64,
    pub crypto: CryptoConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .context("DB_MAX_CONNECTIONS must be a valid number")?;

        let acquire_timeout_seconds = env::var("DB_ACQUIRE_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<u64>()
            .context("DB_ACQUIRE_TIMEOUT_SECONDS must be a valid number")?;

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET not set")?;

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("SERVER_PORT must be a valid number")?;

        let scan_cooldown_ms = env::var("SCAN_COOLDOWN_MS")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u64>()
            .context("SCAN_COOLDOWN_MS must be a valid number")?;

        let scan_history_limit = env::var("SCAN_HISTORY_LIMIT")
            .unwrap_or_else(|_| "20".to_string())
            .parse::<usize>()
            .context("SCAN_HISTORY_LIMIT must be a valid number")?;

        let scan_session_idle_seconds = env::var("SCAN_SESSION_IDLE_SECONDS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse::<u64>()
            .context("SCAN_SESSION_IDLE_SECONDS must be a valid number")?;

        let crypto = CryptoConfig::from_env()?;

        Ok(Config {
            database_url,
            max_connections,
            acquire_timeout_seconds,
            jwt_secret,
            server_port,
            scan_cooldown_ms,
            scan_history_limit,
            scan_session_idle_seconds,
            crypto,
        })
    }

    pub fn scan_cooldown(&self) -> Duration {
        Duration::from_millis(self.scan_cooldown_ms)
    }

    pub fn scan_session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_session_idle_seconds)
    }
}

/// Keys used to seal and authenticate check-in credentials.
///
/// The cipher key and the MAC key are independent secrets. There is no
/// default for either: a process without them cannot issue or verify.
#[derive(Clone)]
pub struct CryptoConfig {
    cipher_key: Vec<u8>,
    mac_key: Vec<u8>,
}

impl CryptoConfig {
    /// Builds a config from raw key bytes.
    pub fn new(cipher_key: Vec<u8>, mac_key: Vec<u8>) -> Result<Self> {
        if cipher_key.len() != CIPHER_KEY_LEN {
            bail!(
                "cipher key must be {} bytes, got {}",
                CIPHER_KEY_LEN,
                cipher_key.len()
            );
        }
        if mac_key.len() < MIN_MAC_KEY_LEN {
            bail!(
                "MAC key must be at least {} bytes, got {}",
                MIN_MAC_KEY_LEN,
                mac_key.len()
            );
        }
        if cipher_key == mac_key {
            bail!("cipher key and MAC key must be different secrets");
        }

        Ok(Self {
            cipher_key,
            mac_key,
        })
    }

    /// Decodes base64 keys, as they appear in the environment.
    pub fn from_encoded(cipher_key: &str, mac_key: &str) -> Result<Self> {
        let cipher_key = general_purpose::STANDARD
            .decode(cipher_key.trim())
            .context("cipher key is not valid base64")?;
        let mac_key = general_purpose::STANDARD
            .decode(mac_key.trim())
            .context("MAC key is not valid base64")?;
        Self::new(cipher_key, mac_key)
    }

    /// Loads `CREDENTIAL_CIPHER_KEY` and `CREDENTIAL_MAC_KEY`.
    pub fn from_env() -> Result<Self> {
        let cipher_key =
            env::var("CREDENTIAL_CIPHER_KEY").context("CREDENTIAL_CIPHER_KEY not set")?;
        let mac_key = env::var("CREDENTIAL_MAC_KEY").context("CREDENTIAL_MAC_KEY not set")?;
        Self::from_encoded(&cipher_key, &mac_key)
    }

    pub fn cipher_key(&self) -> &[u8] {
        &self.cipher_key
    }

    pub fn mac_key(&self) -> &[u8] {
        &self.mac_key
    }
}

// Keys never reach logs.
impl fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoConfig")
            .field("cipher_key", &"<redacted>")
            .field("mac_key", &"<redacted>")
            .finish()
    }
}
