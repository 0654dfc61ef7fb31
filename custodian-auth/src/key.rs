//! Tenant API-key credentials

use crate::{AuthError, Result};
use secrecy::{ExposeSecret, SecretString};

/// API key triple issued to a tenant
///
/// The secret is only ever used as HMAC key material and never leaves
/// this struct. `Debug` output redacts both secret and passphrase.
#[derive(Debug)]
pub struct SigningKey {
    key_id: String,
    secret: SecretString,
    passphrase: SecretString,
}

impl SigningKey {
    /// Create a signing key, rejecting blank credentials
    pub fn new(
        key_id: impl Into<String>,
        secret: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Result<Self> {
        let key_id = key_id.into();
        let secret = secret.into();
        let passphrase = passphrase.into();

        if key_id.trim().is_empty() {
            return Err(AuthError::MissingCredential("key id"));
        }
        if secret.is_empty() {
            return Err(AuthError::MissingCredential("secret"));
        }
        if passphrase.is_empty() {
            return Err(AuthError::MissingCredential("passphrase"));
        }

        Ok(Self {
            key_id,
            secret: SecretString::new(secret.into()),
            passphrase: SecretString::new(passphrase.into()),
        })
    }

    /// Public key identifier sent as `X-UP-API-Key`
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub(crate) fn secret_bytes(&self) -> &[u8] {
        self.secret.expose_secret().as_bytes()
    }

    pub(crate) fn passphrase(&self) -> &str {
        self.passphrase.expose_secret()
    }
}
