// Custodian - client core for a custodial wallet API
//
// This library signs API requests with an API key (HMAC-SHA512 over a
// canonical message), explains signature rejections, and verifies and
// matches webhook deliveries.

mod client;
mod error;

pub use client::CustodianClient;
pub use error::{ClientError, Result};

// Re-export member crates
pub use custodian_auth;
pub use custodian_config;
pub use custodian_webhooks;

#[cfg(feature = "log")]
pub use custodian_log;

// Prelude for common imports
pub mod prelude {
    pub use crate::{ClientError, CustodianClient};
    pub use custodian_auth::{
        ApiKeyInterceptor, ApiKeySigner, AuthError, Interceptor, MessagePart, QueryParams,
        RequestDescriptor, SignatureDebugger, SigningKey, canonicalize, json_body,
    };
    pub use custodian_config::{ClientConfig, ConfigError};
    pub use custodian_webhooks::{
        Matcher, MatcherId, WebhookConfig, WebhookDelivery, WebhookError, WebhookListener,
        WebhookRecording, WebhookVerifier, matcher,
    };
}
