//! Signature mismatch diagnostics
//!
//! When the API rejects a signature it can attach a debug hint with its own
//! SHA-512 digest (and canonicalization) of each message part. The
//! [`SignatureDebugger`] keeps the digests of what was actually signed and
//! names the first part where client and server disagree.
//!
//! The debugger is opt-in: it is only consulted when a caller attaches one.
//! It works on the normalized message parts and never sees the secret.

use crate::{MessagePart, RequestDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha512};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Location the server uses for signature debug hints
pub const DEBUG_HINT_LOCATION: &str = "X-UP-API-Signature";

/// Reason the server uses for signature debug hints
pub const DEBUG_HINT_REASON: &str = "debugHint";

/// Normalized bytes and digest of one message part
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartDigest {
    pub part: MessagePart,
    pub normalized: Vec<u8>,
    pub sha512: String,
}

/// Digests of all five parts of one signed message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureDebugInfo {
    pub parts: Vec<PartDigest>,
}

impl SignatureDebugInfo {
    /// Digest of a given part
    pub fn part(&self, part: MessagePart) -> Option<&PartDigest> {
        self.parts.iter().find(|digest| digest.part == part)
    }
}

/// The server's view of one message part
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerPartDigest {
    pub sha512: String,
    #[serde(default)]
    pub canonicalized: Option<String>,
}

/// Debug hint returned along with a signature rejection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerDebugHint {
    pub message_parts: HashMap<String, ServerPartDigest>,
}

impl ServerDebugHint {
    /// Extract the hint from a rejection response body
    ///
    /// Only HTTP 403 responses whose `error.details` carry an entry with
    /// reason `debugHint` at location `X-UP-API-Signature` qualify.
    pub fn from_rejection(status: u16, body: &Value) -> Option<Self> {
        if status != 403 {
            return None;
        }

        body.get("error")?
            .get("details")?
            .as_array()?
            .iter()
            .filter(|detail| {
                detail.get("reason").and_then(Value::as_str) == Some(DEBUG_HINT_REASON)
                    && detail.get("location").and_then(Value::as_str) == Some(DEBUG_HINT_LOCATION)
            })
            .find_map(|detail| serde_json::from_value(detail.get("value")?.clone()).ok())
    }
}

/// First message part whose digest differs from the server's
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartMismatch {
    pub part: MessagePart,
    pub local_sha512: String,
    pub remote_sha512: Option<String>,
    /// What the client signed, lossily decoded as UTF-8
    pub local: String,
    /// What the server reconstructed, when it said so
    pub remote: Option<String>,
}

/// Opt-in reconciliation of local and server-side message digests
#[derive(Debug, Clone, Default)]
pub struct SignatureDebugger;

impl SignatureDebugger {
    /// Enable signature debugging
    pub fn new() -> Self {
        Self
    }

    /// Record digests of everything the descriptor contributes to the signature
    pub fn capture(&self, descriptor: &RequestDescriptor) -> SignatureDebugInfo {
        let parts = descriptor.parts();
        SignatureDebugInfo {
            parts: parts
                .iter()
                .map(|(part, bytes)| PartDigest {
                    part,
                    normalized: bytes.to_vec(),
                    sha512: hex::encode(Sha512::digest(bytes)),
                })
                .collect(),
        }
    }

    /// Compare local digests with a server hint, in signing order
    pub fn reconcile(
        &self,
        info: &SignatureDebugInfo,
        hint: &ServerDebugHint,
    ) -> Option<PartMismatch> {
        for local in &info.parts {
            let remote = hint.message_parts.get(local.part.server_name());
            let matches = remote
                .map(|remote| remote.sha512.eq_ignore_ascii_case(&local.sha512))
                .unwrap_or(false);

            if !matches {
                return Some(PartMismatch {
                    part: local.part,
                    local_sha512: local.sha512.clone(),
                    remote_sha512: remote.map(|r| r.sha512.to_lowercase()),
                    local: String::from_utf8_lossy(&local.normalized).into_owned(),
                    remote: remote.and_then(|r| r.canonicalized.clone()),
                });
            }
        }
        None
    }

    /// Inspect a rejected response and log the first diverging part
    pub fn inspect_rejection(
        &self,
        info: &SignatureDebugInfo,
        status: u16,
        body: &Value,
    ) -> Option<PartMismatch> {
        let Some(hint) = ServerDebugHint::from_rejection(status, body) else {
            debug!(status, "Rejection carries no signature debug hint");
            return None;
        };

        let mismatch = self.reconcile(info, &hint);
        match &mismatch {
            Some(mismatch) => warn!(
                part = %mismatch.part,
                sent = ?mismatch.local,
                server_got = ?mismatch.remote,
                "SHA-512 of signed message part does not match the server's"
            ),
            None => debug!("All signed message parts match the server's digests"),
        }
        mismatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QueryParams;
    use serde_json::json;

    fn descriptor() -> RequestDescriptor {
        RequestDescriptor::at(1_600_000_000, "get", "/1.0/tenancy/echo/")
            .with_query(QueryParams::new().with("echo", "hi"))
    }

    fn hint_body(info: &SignatureDebugInfo, overrides: Value) -> Value {
        let mut parts = serde_json::Map::new();
        for digest in &info.parts {
            parts.insert(
                digest.part.server_name().to_string(),
                json!({
                    "sha512": digest.sha512.to_uppercase(),
                    "canonicalized": String::from_utf8_lossy(&digest.normalized),
                }),
            );
        }
        if let Value::Object(overrides) = overrides {
            parts.extend(overrides);
        }
        json!({
            "error": {
                "details": [
                    {"reason": "other", "location": "X-UP-API-Key", "value": {}},
                    {
                        "reason": "debugHint",
                        "location": "X-UP-API-Signature",
                        "value": {"message_parts": parts}
                    }
                ]
            }
        })
    }

    #[test]
    fn test_capture_digests() {
        let info = SignatureDebugger::new().capture(&descriptor());
        assert_eq!(info.parts.len(), 5);

        let method = info.part(MessagePart::Method).unwrap();
        assert_eq!(method.normalized, b"GET".to_vec());
        assert_eq!(
            method.sha512,
            "7087bceef983730473510561252b0d63495f84c889e0f8bd30f65bc5c38dd73606bf6f97ad7222c1ebf668c7647e24b4f130263d69ce7d6fc3573fe56ae7172f"
        );

        let body = info.part(MessagePart::Body).unwrap();
        assert_eq!(
            body.sha512,
            "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e"
        );
    }

    #[test]
    fn test_all_parts_match() {
        let debugger = SignatureDebugger::new();
        let info = debugger.capture(&descriptor());
        let body = hint_body(&info, json!({}));

        assert_eq!(debugger.inspect_rejection(&info, 403, &body), None);
    }

    #[test]
    fn test_reports_first_diverging_part() {
        let debugger = SignatureDebugger::new();
        let info = debugger.capture(&descriptor());
        let body = hint_body(
            &info,
            json!({
                "path": {"sha512": "00", "canonicalized": "/1.0/tenancy/echo"},
                "body": {"sha512": "11"}
            }),
        );

        let mismatch = debugger.inspect_rejection(&info, 403, &body).unwrap();
        assert_eq!(mismatch.part, MessagePart::Path);
        assert_eq!(mismatch.local, "/1.0/tenancy/echo/");
        assert_eq!(mismatch.remote.as_deref(), Some("/1.0/tenancy/echo"));
        assert_eq!(mismatch.remote_sha512.as_deref(), Some("00"));
    }

    #[test]
    fn test_missing_server_part_is_a_mismatch() {
        let debugger = SignatureDebugger::new();
        let info = debugger.capture(&descriptor());
        let hint = ServerDebugHint {
            message_parts: HashMap::new(),
        };

        let mismatch = debugger.reconcile(&info, &hint).unwrap();
        assert_eq!(mismatch.part, MessagePart::Timestamp);
        assert_eq!(mismatch.remote_sha512, None);
    }

    #[test]
    fn test_ignores_other_statuses_and_bodies() {
        let debugger = SignatureDebugger::new();
        let info = debugger.capture(&descriptor());
        let body = hint_body(&info, json!({"method": {"sha512": "00"}}));

        assert_eq!(debugger.inspect_rejection(&info, 401, &body), None);
        assert_eq!(
            debugger.inspect_rejection(&info, 403, &json!({"error": {"details": []}})),
            None
        );
        assert_eq!(debugger.inspect_rejection(&info, 403, &json!("forbidden")), None);
    }
}
