//! HMAC-SHA512 request signer

use crate::{AuthError, RequestDescriptor, Result, SigningKey};
use hmac::{Hmac, Mac};
use http::{HeaderMap, HeaderValue};
use sha2::Sha512;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

type HmacSha512 = Hmac<Sha512>;

/// Header names carrying the API-key signature
pub mod headers {
    /// Public key identifier
    pub const API_KEY: &str = "X-UP-API-Key";

    /// Key passphrase
    pub const PASSPHRASE: &str = "X-UP-API-Passphrase";

    /// Decimal Unix seconds used in the signed message
    pub const TIMESTAMP: &str = "X-UP-API-Timestamp";

    /// Hex HMAC-SHA512 of the canonical message
    pub const SIGNATURE: &str = "X-UP-API-Signature";
}

/// Stateless signer around a shared, immutable [`SigningKey`]
#[derive(Debug, Clone)]
pub struct ApiKeySigner {
    key: Arc<SigningKey>,
}

impl ApiKeySigner {
    /// Create a signer owning the key
    pub fn new(key: SigningKey) -> Self {
        Self { key: Arc::new(key) }
    }

    /// Create a signer from a key shared with other components
    pub fn from_shared(key: Arc<SigningKey>) -> Self {
        Self { key }
    }

    /// Identifier of the key used for signing
    pub fn key_id(&self) -> &str {
        self.key.key_id()
    }

    /// Hex signature of the descriptor's canonical message
    pub fn signature(&self, descriptor: &RequestDescriptor) -> String {
        hmac_sha512_hex(self.key.secret_bytes(), &descriptor.canonical_message())
    }

    /// Sign a descriptor, consuming it
    pub fn sign(&self, descriptor: RequestDescriptor) -> SignatureHeaders {
        let signature = self.signature(&descriptor);

        trace!(
            key_id = %self.key.key_id(),
            method = %descriptor.method,
            path = %descriptor.path,
            timestamp = descriptor.timestamp,
            "Signed API-key request"
        );

        SignatureHeaders {
            key_id: self.key.key_id().to_string(),
            passphrase: self.key.passphrase().to_string(),
            timestamp: descriptor.timestamp.to_string(),
            signature,
        }
    }
}

/// Header values produced by signing one request
#[derive(Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub key_id: String,
    pub passphrase: String,
    pub timestamp: String,
    pub signature: String,
}

impl SignatureHeaders {
    /// `(header name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            (headers::API_KEY, self.key_id.as_str()),
            (headers::PASSPHRASE, self.passphrase.as_str()),
            (headers::TIMESTAMP, self.timestamp.as_str()),
            (headers::SIGNATURE, self.signature.as_str()),
        ]
        .into_iter()
    }

    /// Insert all four headers, replacing earlier values
    pub fn apply(&self, header_map: &mut HeaderMap) -> Result<()> {
        for (name, value) in self.iter() {
            let mut value =
                HeaderValue::from_str(value).map_err(|_| AuthError::InvalidHeader(name))?;
            if name == headers::PASSPHRASE {
                value.set_sensitive(true);
            }
            header_map.insert(name, value);
        }
        Ok(())
    }
}

impl fmt::Debug for SignatureHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureHeaders")
            .field("key_id", &self.key_id)
            .field("passphrase", &"[REDACTED]")
            .field("timestamp", &self.timestamp)
            .field("signature", &self.signature)
            .finish()
    }
}

/// Compute a lowercase hex HMAC-SHA512
pub fn hmac_sha512_hex(secret: &[u8], message: &[u8]) -> String {
    let mut mac = HmacSha512::new_from_slice(secret).expect("HMAC can take any size key");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ParamValue, QueryParams};

    fn signer() -> ApiKeySigner {
        ApiKeySigner::new(SigningKey::new("key-1", "secret", "passphrase").unwrap())
    }

    fn descriptor() -> RequestDescriptor {
        RequestDescriptor::at(1_600_000_000, "get", "/1.0/tenancy/echo/").with_query(
            QueryParams::from([
                ("a", ParamValue::from("b ")),
                ("c ", ParamValue::from("d")),
                ("e", ParamValue::from(vec!["x~", "y"])),
            ]),
        )
    }

    #[test]
    fn test_known_signature() {
        assert_eq!(
            signer().signature(&descriptor()),
            "3bc4af634fc21a1e54f9c4e70f0ff91a914cb8e7303da88e15e657c67a6bf6f37f5c519ce0211d88dbe62c2562cf87d50392d108a20ce218dfcbf7bb6174ec74"
        );
    }

    #[test]
    fn test_known_signature_with_body() {
        let descriptor = RequestDescriptor::at(1_600_000_000, "POST", "/1.0/tenancy/echo/")
            .with_body(Some(r#"{"echo":"Hello Echo!"}"#));
        assert_eq!(
            signer().signature(&descriptor),
            "b1fb378079d95ac93432faeb504c20c7d62e175241aa0695ba0a527361c24f047cf3bf9a5bd94901e372df24cd800842304d347c70fe17178bd9176a59ab234a"
        );
    }

    #[test]
    fn test_signing_is_deterministic() {
        let signer = signer();
        assert_eq!(signer.signature(&descriptor()), signer.signature(&descriptor()));
    }

    #[test]
    fn test_sign_produces_headers() {
        let headers = signer().sign(descriptor());
        assert_eq!(headers.key_id, "key-1");
        assert_eq!(headers.passphrase, "passphrase");
        assert_eq!(headers.timestamp, "1600000000");
        assert_eq!(headers.signature.len(), 128);
        assert!(headers.signature.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_apply_headers() {
        let mut map = HeaderMap::new();
        let headers = signer().sign(descriptor());
        headers.apply(&mut map).unwrap();

        assert_eq!(map.get("x-up-api-key").unwrap(), "key-1");
        assert_eq!(map.get("x-up-api-timestamp").unwrap(), "1600000000");
        assert_eq!(map.get("x-up-api-signature").unwrap(), headers.signature.as_str());
        assert!(map.get("x-up-api-passphrase").unwrap().is_sensitive());
    }

    #[test]
    fn test_debug_redacts_passphrase() {
        let debug = format!("{:?}", signer().sign(descriptor()));
        assert!(!debug.contains("\"passphrase\""));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_different_secret_different_signature() {
        let other = ApiKeySigner::new(SigningKey::new("key-1", "secret2", "passphrase").unwrap());
        assert_ne!(signer().signature(&descriptor()), other.signature(&descriptor()));
    }
}
