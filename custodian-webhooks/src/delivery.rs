//! Received webhook deliveries

use crate::{Result, WebhookError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Metadata key for the forwarder's webhook id
pub const META_WEBHOOK_ID: &str = "webhook_id";
/// Metadata key for the original HTTP method
pub const META_METHOD: &str = "method";
/// Metadata key for the original request path
pub const META_PATH: &str = "path";
/// Metadata key for the pub/sub message id of a relayed delivery
pub const META_MESSAGE_ID: &str = "pubsub_message_id";

/// A single webhook delivery as received
///
/// The body is kept byte-for-byte so the signature can be checked against it.
/// Headers keep their original order and case; lookups ignore case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookDelivery {
    /// Local identifier of this delivery
    pub id: String,

    /// Raw body bytes
    pub body: Vec<u8>,

    /// Headers in arrival order
    pub headers: Vec<(String, String)>,

    /// Transport metadata (forwarder ids, original method and path)
    pub metadata: BTreeMap<String, String>,

    /// When the delivery was received
    pub received_at: DateTime<Utc>,
}

impl WebhookDelivery {
    /// Create a delivery from a raw body
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            body: body.into(),
            headers: Vec::new(),
            metadata: BTreeMap::new(),
            received_at: Utc::now(),
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add several headers
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Header value by case-insensitive name; the last occurrence wins
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of a header, in arrival order
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Metadata value by key
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Body as UTF-8 text, if it is valid UTF-8
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Body as a JSON value, or `None` if it is not JSON
    pub fn json_value(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Decode the envelope a webhook forwarder publishes for each call
    ///
    /// The envelope carries `body` (text, or hex when `bodyIsHex` is set),
    /// `headers` as either an object or a list of `[name, value]` pairs,
    /// optional `rawHeaders` pairs that keep duplicates, and `webhookId`,
    /// `method`, `path` and `pubsubMessageId`, which land in
    /// [`metadata`](Self::metadata).
    pub fn from_forwarded_json(bytes: &[u8]) -> Result<Self> {
        let envelope: ForwardedEnvelope = serde_json::from_slice(bytes)?;

        let body = if envelope.body_is_hex {
            hex::decode(envelope.body.trim())?
        } else {
            envelope.body.into_bytes()
        };

        let headers = match (envelope.raw_headers, envelope.headers) {
            (Some(raw), _) => raw,
            (None, Some(ForwardedHeaders::Pairs(pairs))) => pairs,
            (None, Some(ForwardedHeaders::Map(map))) => map.into_iter().collect(),
            (None, None) => {
                return Err(WebhookError::PayloadError(
                    "forwarded delivery has no headers".to_string(),
                ));
            }
        };

        let mut delivery = WebhookDelivery::new(body).with_headers(headers);
        if let Some(id) = envelope.webhook_id {
            delivery.metadata.insert(META_WEBHOOK_ID.to_string(), id);
        }
        if let Some(method) = envelope.method {
            delivery.metadata.insert(META_METHOD.to_string(), method);
        }
        if let Some(path) = envelope.path {
            delivery.metadata.insert(META_PATH.to_string(), path);
        }
        if let Some(message_id) = envelope.pubsub_message_id {
            delivery.metadata.insert(META_MESSAGE_ID.to_string(), message_id);
        }

        Ok(delivery)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForwardedEnvelope {
    #[serde(default)]
    webhook_id: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    body_is_hex: bool,
    #[serde(default)]
    headers: Option<ForwardedHeaders>,
    #[serde(default)]
    raw_headers: Option<Vec<(String, String)>>,
    #[serde(default)]
    pubsub_message_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ForwardedHeaders {
    Pairs(Vec<(String, String)>),
    Map(BTreeMap<String, String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_lookup_ignores_case() {
        let delivery = WebhookDelivery::new("{}")
            .with_header("X-Up-Signature", "sha256=abc")
            .with_header("Content-Type", "application/json");

        assert_eq!(delivery.header("x-up-signature"), Some("sha256=abc"));
        assert_eq!(delivery.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(delivery.header("missing"), None);
    }

    #[test]
    fn test_repeated_headers() {
        let delivery = WebhookDelivery::new("")
            .with_header("X-Trace", "one")
            .with_header("x-trace", "two");

        assert_eq!(delivery.header("X-Trace"), Some("two"));
        assert_eq!(
            delivery.header_values("X-TRACE").collect::<Vec<_>>(),
            vec!["one", "two"]
        );
    }

    #[test]
    fn test_json_body() {
        let delivery = WebhookDelivery::new(r#"{"action":"echo.get"}"#);
        let value: serde_json::Value = delivery.json().unwrap();
        assert_eq!(value["action"], "echo.get");
        assert_eq!(delivery.json_value().unwrap()["action"], "echo.get");

        let not_json = WebhookDelivery::new("plain text");
        assert!(not_json.json_value().is_none());
        assert!(matches!(
            not_json.json::<serde_json::Value>(),
            Err(WebhookError::PayloadError(_))
        ));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = WebhookDelivery::new("");
        let b = WebhookDelivery::new("");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_forwarded_text_body_with_header_map() {
        let envelope = json!({
            "webhookId": "wh-1",
            "method": "POST",
            "path": "/hooks/test",
            "headers": {"X-Up-Signature": "sha256=ff", "Content-Type": "application/json"},
            "body": "{\"action\":\"echo.get\"}",
            "bodyIsHex": false
        });

        let delivery =
            WebhookDelivery::from_forwarded_json(envelope.to_string().as_bytes()).unwrap();

        assert_eq!(delivery.body, br#"{"action":"echo.get"}"#);
        assert_eq!(delivery.header("x-up-signature"), Some("sha256=ff"));
        assert_eq!(delivery.metadata(META_WEBHOOK_ID), Some("wh-1"));
        assert_eq!(delivery.metadata(META_METHOD), Some("POST"));
        assert_eq!(delivery.metadata(META_PATH), Some("/hooks/test"));
    }

    #[test]
    fn test_forwarded_hex_body_with_header_pairs() {
        let envelope = json!({
            "headers": [["X-Up-Signature", "sha256=ff"], ["X-Extra", "1"]],
            "body": hex::encode([0xff, 0x00, 0x7b]),
            "bodyIsHex": true,
            "pubsubMessageId": "msg-42"
        });

        let delivery =
            WebhookDelivery::from_forwarded_json(envelope.to_string().as_bytes()).unwrap();

        assert_eq!(delivery.body, vec![0xff, 0x00, 0x7b]);
        assert_eq!(delivery.headers.len(), 2);
        assert_eq!(delivery.header("x-extra"), Some("1"));
        assert_eq!(delivery.metadata(META_MESSAGE_ID), Some("msg-42"));
        assert_eq!(delivery.metadata.len(), 1);
    }

    #[test]
    fn test_forwarded_raw_headers_take_precedence() {
        let envelope = json!({
            "headers": {"X-Dup": "b"},
            "rawHeaders": [["X-Dup", "a"], ["X-Dup", "b"]],
            "body": ""
        });

        let delivery =
            WebhookDelivery::from_forwarded_json(envelope.to_string().as_bytes()).unwrap();

        assert_eq!(delivery.header_values("x-dup").count(), 2);
    }

    #[test]
    fn test_forwarded_errors() {
        let bad_hex = json!({"headers": {}, "body": "zz", "bodyIsHex": true});
        assert!(matches!(
            WebhookDelivery::from_forwarded_json(bad_hex.to_string().as_bytes()),
            Err(WebhookError::PayloadError(_))
        ));

        let no_headers = json!({"body": "{}"});
        assert!(matches!(
            WebhookDelivery::from_forwarded_json(no_headers.to_string().as_bytes()),
            Err(WebhookError::PayloadError(_))
        ));

        assert!(WebhookDelivery::from_forwarded_json(b"not json").is_err());
    }
}
