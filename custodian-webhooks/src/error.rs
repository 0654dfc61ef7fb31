//! Error types for webhook operations

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while verifying or matching webhooks
#[derive(Error, Debug)]
pub enum WebhookError {
    /// The HMAC of the body does not match the signature header
    #[error("Signature verification failed: {0}")]
    AuthenticationFailed(String),

    /// Signature missing from the delivery
    #[error("Signature missing from delivery")]
    SignatureMissing,

    /// Payload decoding failed
    #[error("Payload error: {0}")]
    PayloadError(String),

    /// The recording no longer accepts matchers
    #[error("Recording has been stopped")]
    RecordingStopped,

    /// Not every matcher was satisfied in time
    #[error("Timed out after {timeout:?} waiting for {}", .unmet.join(", "))]
    MatchTimeout {
        timeout: Duration,
        unmet: Vec<String>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::PayloadError(err.to_string())
    }
}

impl From<hex::FromHexError> for WebhookError {
    fn from(err: hex::FromHexError) -> Self {
        WebhookError::PayloadError(format!("invalid hex body: {}", err))
    }
}
