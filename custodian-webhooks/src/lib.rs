//! Webhook Verification and Expectations for Custodian
//!
//! This crate verifies webhook deliveries sent by the custody service and
//! lets callers wait for deliveries that satisfy a set of expectations.
//!
//! # Features
//!
//! - **Signature Verification**: `X-Up-Signature: sha256=<hex>` HMAC-SHA256, constant-time
//! - **Recordings**: Keep every delivery and bind each one to at most one matcher
//! - **Fan-out**: One listener feeds any number of independent recordings
//! - **Forwarded Deliveries**: Decode the JSON envelope a webhook relay publishes
//!
//! # Example: Verifying a Delivery
//!
//! ```rust
//! use custodian_webhooks::{WebhookDelivery, WebhookVerifier};
//!
//! let verifier = WebhookVerifier::new("subscription-hmac-key");
//! let body = br#"{"action":"wallet.created"}"#;
//!
//! let delivery = WebhookDelivery::new(body.to_vec())
//!     .with_header("X-Up-Signature", verifier.sign(body));
//!
//! assert!(verifier.verify_delivery(&delivery, "x-up-signature").is_ok());
//! ```
//!
//! # Example: Waiting for Expectations
//!
//! ```rust,no_run
//! use custodian_webhooks::{matcher, WebhookListener};
//! use std::time::Duration;
//!
//! # async fn run() -> custodian_webhooks::Result<()> {
//! let listener = WebhookListener::with_secret("subscription-hmac-key");
//! let recording = listener.recording();
//!
//! recording.add_named_matcher("wallet created", matcher::action("wallet.created"))?;
//! recording.add_matcher(matcher::json(|body| body["data"]["echo"] == "hi"))?;
//!
//! // Deliveries arrive through `listener.dispatch` or `listener.consume`
//! recording.are_all_matched(Duration::from_secs(30)).await?;
//! recording.stop();
//! # Ok(())
//! # }
//! ```

mod config;
mod delivery;
mod error;
mod listener;
pub mod matcher;
mod recording;
mod signature;

pub use config::{WebhookConfig, WebhookConfigBuilder};
pub use delivery::{META_MESSAGE_ID, META_METHOD, META_PATH, META_WEBHOOK_ID, WebhookDelivery};
pub use error::WebhookError;
pub use listener::{FeedSummary, WebhookListener};
pub use matcher::{Matcher, MatcherId};
pub use recording::{MatchBinding, WebhookRecording};
pub use signature::{SIGNATURE_PREFIX, WebhookVerifier, headers};

/// Result type for webhook operations
pub type Result<T> = std::result::Result<T, WebhookError>;
