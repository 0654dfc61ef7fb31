//! Configuration for the webhook listener

use crate::signature::headers;
use secrecy::SecretString;
use std::time::Duration;

/// Configuration for a [`WebhookListener`](crate::WebhookListener)
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// HMAC key of the webhook subscription
    pub secret: Option<SecretString>,

    /// Header carrying `sha256=<hex>`
    pub signature_header: String,

    /// Whether deliveries must carry a valid signature
    pub verify_signatures: bool,

    /// Default time to wait for all matchers of a recording
    pub match_timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: None,
            signature_header: headers::SIGNATURE.to_string(),
            verify_signatures: true,
            match_timeout: Duration::from_secs(180),
        }
    }
}

impl WebhookConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for custom configuration
    pub fn builder() -> WebhookConfigBuilder {
        WebhookConfigBuilder::new()
    }
}

/// Builder for WebhookConfig
#[derive(Debug, Clone, Default)]
pub struct WebhookConfigBuilder {
    config: WebhookConfig,
}

impl WebhookConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: WebhookConfig::default(),
        }
    }

    /// Set the subscription secret
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.config.secret = Some(SecretString::new(secret.into().into()));
        self
    }

    /// Set the signature header name
    pub fn signature_header(mut self, name: impl Into<String>) -> Self {
        self.config.signature_header = name.into();
        self
    }

    /// Accept unsigned deliveries (trusted local feeds only)
    pub fn skip_verification(mut self) -> Self {
        self.config.verify_signatures = false;
        self
    }

    /// Set the default match timeout
    pub fn match_timeout(mut self, timeout: Duration) -> Self {
        self.config.match_timeout = timeout;
        self
    }

    /// Set the default match timeout in seconds
    pub fn match_timeout_secs(mut self, secs: u64) -> Self {
        self.config.match_timeout = Duration::from_secs(secs);
        self
    }

    /// Build the configuration
    pub fn build(self) -> WebhookConfig {
        self.config
    }
}
