//! Webhook signature generation and verification

use crate::{Result, WebhookDelivery, WebhookError};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of the signature header value
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Header names for webhook signatures
pub mod headers {
    /// The signature header name
    pub const SIGNATURE: &str = "X-Up-Signature";
}

/// HMAC-SHA256 verifier for one webhook subscription
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    secret: Arc<SecretString>,
}

impl WebhookVerifier {
    /// Create a verifier for the subscription secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Arc::new(SecretString::new(secret.into().into())),
        }
    }

    /// Create a verifier from an already wrapped secret
    pub fn from_secret(secret: SecretString) -> Self {
        Self {
            secret: Arc::new(secret),
        }
    }

    /// Lowercase hex HMAC-SHA256 of the raw body
    pub fn digest(&self, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC can take any size key");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Header value the sender computes for `body`
    pub fn sign(&self, body: &[u8]) -> String {
        format!("{}{}", SIGNATURE_PREFIX, self.digest(body))
    }

    /// Check a signature header value against the raw body
    pub fn verify(&self, body: &[u8], signature: &str) -> bool {
        constant_time_compare(&self.sign(body), signature)
    }

    /// Verify a delivery, looking the signature up in `header`
    pub fn verify_delivery(&self, delivery: &WebhookDelivery, header: &str) -> Result<()> {
        let signature = delivery
            .header(header)
            .ok_or(WebhookError::SignatureMissing)?;

        if self.verify(&delivery.body, signature) {
            Ok(())
        } else {
            Err(WebhookError::AuthenticationFailed(format!(
                "HMAC mismatch for delivery {}",
                delivery.id
            )))
        }
    }
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
