//! Recording of deliveries and one-to-one matching against expectations
//!
//! A recording keeps every delivery it receives in arrival order along with a
//! list of matchers in registration order. Each matcher is satisfied by at most
//! one delivery and each delivery satisfies at most one matcher. Bindings are
//! made in delivery order: for the oldest unconsumed delivery, the earliest
//! registered unsatisfied matcher that accepts it wins. Bindings are never
//! undone.

use crate::listener::Subscription;
use crate::matcher::{Matcher, MatcherId};
use crate::{Result, WebhookDelivery, WebhookError};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace};

/// A matcher together with the delivery it consumed
#[derive(Debug, Clone)]
pub struct MatchBinding {
    /// Matcher identifier
    pub matcher: MatcherId,
    /// Matcher name
    pub name: String,
    /// Position of the delivery in the recording's log
    pub delivery_index: usize,
    /// The consumed delivery
    pub delivery: WebhookDelivery,
}

struct MatcherEntry {
    id: MatcherId,
    name: String,
    predicate: Box<dyn Matcher>,
    satisfied_by: Option<usize>,
}

struct DeliveryEntry {
    delivery: WebhookDelivery,
    consumed_by: Option<MatcherId>,
}

#[derive(Default)]
struct RecordingState {
    deliveries: Vec<DeliveryEntry>,
    matchers: Vec<MatcherEntry>,
    stopped: bool,
    subscription: Option<Subscription>,
}

impl RecordingState {
    /// Bind unconsumed deliveries to unsatisfied matchers
    fn scan(&mut self) -> usize {
        if self.all_matched() {
            return 0;
        }

        let mut bound = 0;
        for (index, entry) in self.deliveries.iter_mut().enumerate() {
            if entry.consumed_by.is_some() {
                continue;
            }

            for matcher in self.matchers.iter_mut() {
                if matcher.satisfied_by.is_some() {
                    continue;
                }
                if matcher.predicate.matches(&entry.delivery) {
                    matcher.satisfied_by = Some(index);
                    entry.consumed_by = Some(matcher.id);
                    debug!(
                        matcher = %matcher.name,
                        delivery_id = %entry.delivery.id,
                        delivery_index = index,
                        "Webhook expectation satisfied"
                    );
                    bound += 1;
                    break;
                }
            }
        }
        bound
    }

    fn all_matched(&self) -> bool {
        self.matchers.iter().all(|m| m.satisfied_by.is_some())
    }

    fn unmet(&self) -> Vec<String> {
        self.matchers
            .iter()
            .filter(|m| m.satisfied_by.is_none())
            .map(|m| m.name.clone())
            .collect()
    }
}

pub(crate) struct RecordingInner {
    state: Mutex<RecordingState>,
    changes: watch::Sender<u64>,
}

/// A set of expectations over a stream of webhook deliveries
///
/// Recordings are cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct WebhookRecording {
    inner: Arc<RecordingInner>,
}

impl Default for WebhookRecording {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WebhookRecording {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("WebhookRecording")
            .field("deliveries", &state.deliveries.len())
            .field("matchers", &state.matchers.len())
            .field("unmet", &state.unmet())
            .field("stopped", &state.stopped)
            .finish()
    }
}

impl WebhookRecording {
    /// Create a recording that is not attached to any listener
    ///
    /// Deliveries are fed with [`record`](Self::record).
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(RecordingInner {
                state: Mutex::new(RecordingState::default()),
                changes,
            }),
        }
    }

    pub(crate) fn attach(&self, subscription: Subscription) {
        self.inner.state.lock().subscription = Some(subscription);
    }

    pub(crate) fn downgrade(&self) -> WeakRecording {
        WeakRecording(Arc::downgrade(&self.inner))
    }

    /// Register an expectation named after its registration index
    pub fn add_matcher<M>(&self, matcher: M) -> Result<MatcherId>
    where
        M: Matcher + 'static,
    {
        self.register(None, Box::new(matcher))
    }

    /// Register an expectation with a name used in timeout reports
    pub fn add_named_matcher<M>(&self, name: impl Into<String>, matcher: M) -> Result<MatcherId>
    where
        M: Matcher + 'static,
    {
        self.register(Some(name.into()), Box::new(matcher))
    }

    fn register(&self, name: Option<String>, predicate: Box<dyn Matcher>) -> Result<MatcherId> {
        let id = {
            let mut state = self.inner.state.lock();
            if state.stopped {
                return Err(WebhookError::RecordingStopped);
            }

            let id = MatcherId(state.matchers.len());
            let name = name.unwrap_or_else(|| id.to_string());
            trace!(matcher = %name, "Registering webhook expectation");
            state.matchers.push(MatcherEntry {
                id,
                name,
                predicate,
                satisfied_by: None,
            });
            state.scan();
            id
        };

        self.notify();
        Ok(id)
    }

    /// Append a delivery to the log and bind it if a matcher accepts it
    ///
    /// Returns `false` when the recording has been stopped; the delivery is
    /// dropped in that case.
    pub fn record(&self, delivery: WebhookDelivery) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.stopped {
                trace!(delivery_id = %delivery.id, "Recording stopped, ignoring delivery");
                return false;
            }

            trace!(
                delivery_id = %delivery.id,
                index = state.deliveries.len(),
                "Recording webhook delivery"
            );
            state.deliveries.push(DeliveryEntry {
                delivery,
                consumed_by: None,
            });
            state.scan();
        }

        self.notify();
        true
    }

    /// Wait until every registered matcher is satisfied
    ///
    /// Succeeds immediately when no matchers are registered. Fails with
    /// [`WebhookError::MatchTimeout`] naming the unmet matchers when the
    /// timeout elapses, or as soon as the recording is stopped with matchers
    /// still unmet.
    pub async fn are_all_matched(&self, timeout: Duration) -> Result<()> {
        let mut changes = self.inner.changes.subscribe();

        let wait = async {
            loop {
                changes.borrow_and_update();
                {
                    let mut state = self.inner.state.lock();
                    state.scan();
                    if state.all_matched() {
                        return Ok(());
                    }
                    if state.stopped {
                        return Err(WebhookError::MatchTimeout {
                            timeout,
                            unmet: state.unmet(),
                        });
                    }
                }

                if changes.changed().await.is_err() {
                    return Err(self.timeout_error(timeout));
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                let err = self.timeout_error(timeout);
                debug!(error = %err, "Webhook expectations not met");
                Err(err)
            }
        }
    }

    fn timeout_error(&self, timeout: Duration) -> WebhookError {
        WebhookError::MatchTimeout {
            timeout,
            unmet: self.unmet(),
        }
    }

    /// Whether every registered matcher is satisfied right now
    pub fn is_all_matched(&self) -> bool {
        let mut state = self.inner.state.lock();
        state.scan();
        state.all_matched()
    }

    /// Names of matchers that are still unsatisfied, in registration order
    pub fn unmet(&self) -> Vec<String> {
        self.inner.state.lock().unmet()
    }

    /// All recorded deliveries in arrival order
    pub fn deliveries(&self) -> Vec<WebhookDelivery> {
        self.inner
            .state
            .lock()
            .deliveries
            .iter()
            .map(|entry| entry.delivery.clone())
            .collect()
    }

    /// Number of recorded deliveries
    pub fn len(&self) -> usize {
        self.inner.state.lock().deliveries.len()
    }

    /// Whether no delivery has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current bindings in matcher registration order
    pub fn bindings(&self) -> Vec<MatchBinding> {
        let state = self.inner.state.lock();
        state
            .matchers
            .iter()
            .filter_map(|m| {
                m.satisfied_by.map(|index| MatchBinding {
                    matcher: m.id,
                    name: m.name.clone(),
                    delivery_index: index,
                    delivery: state.deliveries[index].delivery.clone(),
                })
            })
            .collect()
    }

    /// The delivery bound to a matcher, if any
    pub fn binding_for(&self, id: MatcherId) -> Option<WebhookDelivery> {
        let state = self.inner.state.lock();
        state
            .matchers
            .get(id.0)
            .and_then(|m| m.satisfied_by)
            .map(|index| state.deliveries[index].delivery.clone())
    }

    /// Stop recording and release the listener subscription
    ///
    /// Calling this more than once has no further effect. Waiters in
    /// [`are_all_matched`](Self::are_all_matched) are woken.
    pub fn stop(&self) {
        let subscription = {
            let mut state = self.inner.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
            state.subscription.take()
        };

        // Released outside the recording lock; dispatch locks in the other order.
        drop(subscription);
        debug!("Webhook recording stopped");
        self.notify();
    }

    /// Whether [`stop`](Self::stop) has been called
    pub fn is_stopped(&self) -> bool {
        self.inner.state.lock().stopped
    }

    fn notify(&self) {
        self.inner
            .changes
            .send_modify(|version| *version = version.wrapping_add(1));
    }
}

pub(crate) struct WeakRecording(Weak<RecordingInner>);

impl WeakRecording {
    pub(crate) fn upgrade(&self) -> Option<WebhookRecording> {
        self.0.upgrade().map(|inner| WebhookRecording { inner })
    }
}
