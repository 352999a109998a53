//! Primitives that make check-in tokens opaque and tamper-evident.
//!
//! ## Usage
//!
//! ```rust
//! let cipher = SymmetricCipher::new(config.cipher_key())?;
//! let stamper = IntegrityStamper::new(config.mac_key())?;
//! let sealed = cipher.encrypt("secret data")?;
//! let stamp = stamper.stamp(sealed.as_bytes());
//! assert!(stamper.verify(sealed.as_bytes(), &stamp));
//! ```

use aes_gcm::aead::rand_core::{OsRng, RngCore};
use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid encryption key")]
    InvalidKey,
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed")]
    DecryptionFailed,
    #[error("Invalid data format")]
    InvalidData,
}

/// AES-256-GCM encryption for strings.
///
/// Output is `base64(nonce || ciphertext)`; every call draws a fresh nonce.
#[derive(Clone)]
pub struct SymmetricCipher {
    cipher: Aes256Gcm,
}

impl SymmetricCipher {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != 32 {
            return Err(CryptoError::InvalidKey);
        }
        let key = Key::<Aes256Gcm>::from_slice(key);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Encrypt a string and return base64 encoded result.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(general_purpose::STANDARD.encode(sealed))
    }

    /// Decrypt a base64 encoded string that was produced by `encrypt()`.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let data = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| CryptoError::InvalidData)?;

        if data.len() < NONCE_LEN {
            return Err(CryptoError::InvalidData);
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidData)
    }
}

/// HMAC-SHA256 stamps over already-encrypted data.
#[derive(Clone)]
pub struct IntegrityStamper {
    mac: HmacSha256,
}

impl IntegrityStamper {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let mac = <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { mac })
    }

    /// Lowercase hex HMAC of `data`.
    pub fn stamp(&self, data: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(data);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Checks a hex stamp in constant time. Only the lowercase form produced
    /// by [`stamp`](Self::stamp) verifies.
    pub fn verify(&self, data: &[u8], stamp: &str) -> bool {
        if !stamp.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return false;
        }
        let Ok(expected) = hex::decode(stamp) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.verify_slice(&expected).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> SymmetricCipher {
        SymmetricCipher::new(&[3u8; 32]).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt() {
        let original = "Test message";

        let encrypted = cipher().encrypt(original).unwrap();
        let decrypted = cipher().decrypt(&encrypted).unwrap();

        assert_eq!(original, decrypted);
    }

    #[test]
    fn test_unique_nonces() {
        let msg = "Same message";
        let cipher = cipher();
        let enc1 = cipher.encrypt(msg).unwrap();
        let enc2 = cipher.encrypt(msg).unwrap();

        assert_ne!(enc1, enc2);
        assert_eq!(cipher.decrypt(&enc1).unwrap(), msg);
        assert_eq!(cipher.decrypt(&enc2).unwrap(), msg);
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = cipher().encrypt("guest").unwrap();
        let other = SymmetricCipher::new(&[4u8; 32]).unwrap();
        assert_eq!(other.decrypt(&encrypted), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn test_short_input_is_invalid() {
        let short = general_purpose::STANDARD.encode([0u8; 4]);
        assert_eq!(cipher().decrypt(&short), Err(CryptoError::InvalidData));
        assert_eq!(cipher().decrypt("%%%"), Err(CryptoError::InvalidData));
    }

    #[test]
    fn test_cipher_requires_32_byte_key() {
        assert!(matches!(
            SymmetricCipher::new(&[1u8; 16]),
            Err(CryptoError::InvalidKey)
        ));
    }

    #[test]
    fn test_stamp_is_deterministic_and_keyed() {
        let stamper = IntegrityStamper::new(&[9u8; 32]).unwrap();
        let other = IntegrityStamper::new(&[8u8; 32]).unwrap();

        let stamp = stamper.stamp(b"ciphertext");
        assert_eq!(stamp, stamper.stamp(b"ciphertext"));
        assert_eq!(stamp.len(), 64);
        assert_ne!(stamp, other.stamp(b"ciphertext"));
    }

    #[test]
    fn test_verify_rejects_changes() {
        let stamper = IntegrityStamper::new(&[9u8; 32]).unwrap();
        let stamp = stamper.stamp(b"ciphertext");

        assert!(stamper.verify(b"ciphertext", &stamp));
        assert!(!stamper.verify(b"ciphertexT", &stamp));
        assert!(!stamper.verify(b"ciphertext", &stamp[..62]));
        assert!(!stamper.verify(b"ciphertext", "zz"));
    }

    #[test]
    fn test_verify_rejects_uppercase_stamps() {
        let stamper = IntegrityStamper::new(&[9u8; 32]).unwrap();
        let stamp = stamper.stamp(b"ciphertext");

        assert!(!stamper.verify(b"ciphertext", &stamp.to_uppercase()));
        let position = stamp.find(|c: char| c.is_ascii_lowercase()).unwrap();
        let mut flipped = stamp.clone();
        flipped.replace_range(
            position..position + 1,
            &stamp[position..position + 1].to_uppercase(),
        );
        assert!(!stamper.verify(b"ciphertext", &flipped));
    }
}
