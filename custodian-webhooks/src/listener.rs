//! Verified fan-out of webhook deliveries to recordings

use crate::recording::WeakRecording;
use crate::{Result, WebhookConfig, WebhookDelivery, WebhookError, WebhookRecording, WebhookVerifier};
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    recordings: BTreeMap<u64, WeakRecording>,
}

/// A listener's hold on one recording
///
/// Dropping it unsubscribes the recording.
pub(crate) struct Subscription {
    id: u64,
    subscribers: Weak<Mutex<Subscribers>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.lock().recordings.remove(&self.id);
            debug!(subscription = self.id, "Webhook recording unsubscribed");
        }
    }
}

/// Outcome of draining a delivery feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedSummary {
    /// Deliveries that passed verification and were fanned out
    pub accepted: usize,
    /// Deliveries dropped because verification failed
    pub rejected: usize,
}

/// Verifies incoming deliveries and hands them to every live recording
#[derive(Clone)]
pub struct WebhookListener {
    verifier: Option<WebhookVerifier>,
    config: Arc<WebhookConfig>,
    subscribers: Arc<Mutex<Subscribers>>,
}

impl std::fmt::Debug for WebhookListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookListener")
            .field("verifies", &self.verifier.is_some())
            .field("signature_header", &self.config.signature_header)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl WebhookListener {
    /// Create a listener from configuration
    ///
    /// Fails when verification is enabled without a secret.
    pub fn new(config: WebhookConfig) -> Result<Self> {
        let verifier = match (&config.secret, config.verify_signatures) {
            (Some(secret), true) => Some(WebhookVerifier::from_secret(secret.clone())),
            (None, true) => {
                return Err(WebhookError::ConfigError(
                    "webhook secret is required when signatures are verified".to_string(),
                ));
            }
            (_, false) => {
                warn!("Webhook signature verification is disabled");
                None
            }
        };

        Ok(Self {
            verifier,
            config: Arc::new(config),
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
        })
    }

    /// Create a listener that verifies with `secret` and default settings
    pub fn with_secret(secret: impl Into<String>) -> Self {
        let secret = secret.into();
        Self {
            verifier: Some(WebhookVerifier::new(secret.clone())),
            config: Arc::new(WebhookConfig::builder().secret(secret).build()),
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
        }
    }

    /// Listener configuration
    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// Default timeout for [`WebhookRecording::are_all_matched`]
    pub fn match_timeout(&self) -> Duration {
        self.config.match_timeout
    }

    /// Start a new recording that receives every delivery from now on
    pub fn recording(&self) -> WebhookRecording {
        let recording = WebhookRecording::new();
        let id = {
            let mut subscribers = self.subscribers.lock();
            let id = subscribers.next_id;
            subscribers.next_id += 1;
            subscribers.recordings.insert(id, recording.downgrade());
            id
        };

        recording.attach(Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        });
        debug!(subscription = id, "Webhook recording subscribed");
        recording
    }

    /// Number of live subscribed recordings
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().recordings.len()
    }

    /// Verify a delivery and fan it out
    ///
    /// Returns how many recordings took the delivery. A delivery that fails
    /// verification reaches no recording.
    pub fn dispatch(&self, delivery: WebhookDelivery) -> Result<usize> {
        if let Some(verifier) = &self.verifier
            && let Err(err) = verifier.verify_delivery(&delivery, &self.config.signature_header)
        {
            warn!(delivery_id = %delivery.id, error = %err, "Dropping webhook delivery");
            return Err(err);
        }

        let recordings: Vec<WebhookRecording> = {
            let mut subscribers = self.subscribers.lock();
            let mut live = Vec::with_capacity(subscribers.recordings.len());
            subscribers.recordings.retain(|_, weak| match weak.upgrade() {
                Some(recording) => {
                    live.push(recording);
                    true
                }
                None => false,
            });
            live
        };

        let mut taken = 0;
        for recording in recordings {
            if recording.record(delivery.clone()) {
                taken += 1;
            }
        }

        debug!(delivery_id = %delivery.id, recordings = taken, "Webhook delivery dispatched");
        Ok(taken)
    }

    /// Dispatch every delivery of a feed until it ends
    ///
    /// Deliveries that fail verification are dropped and counted.
    pub async fn consume<S>(&self, feed: S) -> FeedSummary
    where
        S: Stream<Item = WebhookDelivery>,
    {
        let mut feed = std::pin::pin!(feed);
        let mut summary = FeedSummary::default();

        while let Some(delivery) = feed.next().await {
            match self.dispatch(delivery) {
                Ok(_) => summary.accepted += 1,
                Err(_) => summary.rejected += 1,
            }
        }

        info!(
            accepted = summary.accepted,
            rejected = summary.rejected,
            "Webhook feed ended"
        );
        summary
    }
}
