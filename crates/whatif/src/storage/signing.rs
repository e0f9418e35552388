//! HMAC-SHA256 signatures for asset URLs.
//!
//! Expiry is snapped to the end of the next TTL window, so every signature
//! issued within one window is identical and a URL stays valid for at least
//! one full TTL.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::error::StorageError;

type HmacSha256 = Hmac<Sha256>;

pub struct UrlSigner {
    secret: SecretString,
    ttl_secs: i64,
}

impl UrlSigner {
    pub fn new(secret: SecretString, ttl_secs: u64) -> Self {
        Self {
            secret,
            ttl_secs: ttl_secs.max(1) as i64,
        }
    }

    /// Creates a signer with a random per-process secret.
    /// Signed URLs stop verifying after a restart.
    pub fn ephemeral(ttl_secs: u64) -> Self {
        let secret = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        Self::new(SecretString::from(secret), ttl_secs)
    }

    pub fn expiry_at(&self, now: DateTime<Utc>) -> i64 {
        let now = now.timestamp();
        (now.div_euclid(self.ttl_secs) + 2) * self.ttl_secs
    }

    fn mac(&self, key: &str, expires: i64) -> Result<HmacSha256, StorageError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| StorageError::InvalidSignature(format!("bad signing key: {}", e)))?;
        mac.update(key.as_bytes());
        mac.update(b":");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    /// Returns `(expires, signature)` for a storage key.
    pub fn sign_at(&self, key: &str, now: DateTime<Utc>) -> Result<(i64, String), StorageError> {
        let expires = self.expiry_at(now);
        let signature = hex::encode(self.mac(key, expires)?.finalize().into_bytes());
        Ok((expires, signature))
    }

    pub fn verify_at(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        if expires < now.timestamp() {
            return Err(StorageError::InvalidSignature("link expired".to_string()));
        }
        let provided = hex::decode(signature)
            .map_err(|_| StorageError::InvalidSignature("malformed signature".to_string()))?;
        self.mac(key, expires)?
            .verify_slice(&provided)
            .map_err(|_| StorageError::InvalidSignature("signature mismatch".to_string()))
    }
}
