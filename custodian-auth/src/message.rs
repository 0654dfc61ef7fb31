//! The canonical request message
//!
//! A signed request is reduced to five parts, concatenated without
//! separators in this order: timestamp, method, path, canonical query and
//! body.

use crate::{QueryParams, Result};
use serde::Serialize;
use std::fmt;

/// One of the five parts of the signed message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePart {
    Timestamp,
    Method,
    Path,
    Query,
    Body,
}

impl MessagePart {
    /// All parts in signing order
    pub const ALL: [MessagePart; 5] = [
        MessagePart::Timestamp,
        MessagePart::Method,
        MessagePart::Path,
        MessagePart::Query,
        MessagePart::Body,
    ];

    /// Name the API server uses for this part in its debug hints
    pub fn server_name(&self) -> &'static str {
        match self {
            MessagePart::Timestamp => "timestamp",
            MessagePart::Method => "method",
            MessagePart::Path => "path",
            MessagePart::Query => "query_params",
            MessagePart::Body => "body",
        }
    }
}

impl fmt::Display for MessagePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.server_name())
    }
}

/// Everything about one outbound call that the signature covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// Unix seconds, taken when the request is about to be sent
    pub timestamp: i64,

    /// HTTP verb, any case
    pub method: String,

    /// Request path without scheme, host or query
    pub path: String,

    /// Query parameters
    pub query: QueryParams,

    /// Exact body bytes to be transmitted
    pub body: Vec<u8>,
}

impl RequestDescriptor {
    /// Describe a request stamped with the current time
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::at(current_timestamp(), method, path)
    }

    /// Describe a request with an explicit timestamp
    pub fn at(timestamp: i64, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            timestamp,
            method: method.into(),
            path: path.into(),
            query: QueryParams::new(),
            body: Vec::new(),
        }
    }

    /// Set the query parameters
    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// Set the raw body; `None` signs as an empty body
    pub fn with_body(mut self, body: Option<impl Into<Vec<u8>>>) -> Self {
        self.body = body.map(Into::into).unwrap_or_default();
        self
    }

    /// Serialize `value` as the JSON body
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.body = serde_json::to_vec(value)?;
        Ok(self)
    }

    /// Normalize every part of the message
    pub fn parts(&self) -> MessageParts {
        MessageParts {
            timestamp: self.timestamp.to_string(),
            method: self.method.to_uppercase(),
            path: self.path.clone(),
            query: self.query.canonicalize(),
            body: self.body.clone(),
        }
    }

    /// The byte string fed into the HMAC
    pub fn canonical_message(&self) -> Vec<u8> {
        self.parts().concat()
    }
}

/// The normalized parts of a [`RequestDescriptor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageParts {
    pub timestamp: String,
    pub method: String,
    pub path: String,
    pub query: String,
    pub body: Vec<u8>,
}

impl MessageParts {
    /// Bytes of a single part
    pub fn get(&self, part: MessagePart) -> &[u8] {
        match part {
            MessagePart::Timestamp => self.timestamp.as_bytes(),
            MessagePart::Method => self.method.as_bytes(),
            MessagePart::Path => self.path.as_bytes(),
            MessagePart::Query => self.query.as_bytes(),
            MessagePart::Body => &self.body,
        }
    }

    /// Parts in signing order
    pub fn iter(&self) -> impl Iterator<Item = (MessagePart, &[u8])> {
        MessagePart::ALL.into_iter().map(|part| (part, self.get(part)))
    }

    /// Concatenate all parts
    pub fn concat(&self) -> Vec<u8> {
        let mut message = Vec::with_capacity(
            self.timestamp.len()
                + self.method.len()
                + self.path.len()
                + self.query.len()
                + self.body.len(),
        );
        for (_, bytes) in self.iter() {
            message.extend_from_slice(bytes);
        }
        message
    }
}

/// Current Unix timestamp in seconds
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
