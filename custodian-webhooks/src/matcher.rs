//! Delivery predicates

use crate::WebhookDelivery;
use serde_json::Value;
use std::fmt;

/// A predicate over webhook deliveries
///
/// Any `Fn(&WebhookDelivery) -> bool` is a matcher. Matchers are evaluated
/// while the recording is locked, so they must not call back into it.
pub trait Matcher: Send + Sync {
    /// Whether this delivery satisfies the expectation
    fn matches(&self, delivery: &WebhookDelivery) -> bool;
}

impl<F> Matcher for F
where
    F: Fn(&WebhookDelivery) -> bool + Send + Sync,
{
    fn matches(&self, delivery: &WebhookDelivery) -> bool {
        self(delivery)
    }
}

/// Identifier of a matcher within its recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatcherId(pub(crate) usize);

impl MatcherId {
    /// Registration index within the recording
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for MatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "matcher #{}", self.0)
    }
}

/// Match deliveries whose body parses as JSON and satisfies `predicate`
///
/// Bodies that are not JSON never match.
pub fn json<F>(predicate: F) -> impl Matcher
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    move |delivery: &WebhookDelivery| {
        delivery
            .json_value()
            .is_some_and(|value| predicate(&value))
    }
}

/// Match deliveries whose JSON body has `"action": name`
pub fn action(name: impl Into<String>) -> impl Matcher {
    let name = name.into();
    json(move |value| value.get("action").and_then(Value::as_str) == Some(name.as_str()))
}

/// Match deliveries carrying `name: value` (name compared case-insensitively)
pub fn header(name: impl Into<String>, value: impl Into<String>) -> impl Matcher {
    let name = name.into();
    let value = value.into();
    move |delivery: &WebhookDelivery| {
        delivery
            .header_values(&name)
            .any(|candidate| candidate == value)
    }
}
