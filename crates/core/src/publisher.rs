// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Synchronous fan-out of [`Event`]s to attached subscribers.
//!
//! Delivery happens on the publishing thread, in attach order. A failing
//! subscriber never prevents delivery to the rest; failures are collected
//! and handed back to the publisher's caller.

use crate::event::{Event, EventKind};
use crate::job::JobState;
use crate::trove::TroveState;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

/// Error raised by a single subscriber while handling an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SubscriberError(pub String);

impl SubscriberError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Every subscriber failure raised while delivering one or more events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} subscriber(s) failed: {}", failures.len(), summarize(failures))]
pub struct PublishError {
    pub failures: Vec<(String, SubscriberError)>,
}

impl PublishError {
    /// Fold `other` into `self`, keeping delivery order.
    pub fn merge(&mut self, other: PublishError) {
        self.failures.extend(other.failures);
    }
}

fn summarize(failures: &[(String, SubscriberError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{name}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// What a subscriber wants to hear about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interest {
    /// Every event of this kind
    Kind(EventKind),
    /// Trove state changes into this state
    TroveState(TroveState),
    /// Job state changes into this state
    JobState(JobState),
}

impl Interest {
    pub fn matches(&self, event: &Event) -> bool {
        match (self, event) {
            (Interest::Kind(kind), _) => event.kind() == *kind,
            (Interest::TroveState(want), Event::TroveStateUpdated { state, .. }) => want == state,
            (Interest::JobState(want), Event::JobStateUpdated { state, .. }) => want == state,
            _ => false,
        }
    }
}

/// A listener attached to a [`Publisher`].
pub trait Subscriber: Send + Sync {
    /// Name used when reporting failures
    fn name(&self) -> &str;

    fn interests(&self) -> Vec<Interest>;

    fn handle(&self, event: &Event) -> Result<(), SubscriberError>;

    fn wants(&self, event: &Event) -> bool {
        self.interests().iter().any(|i| i.matches(event))
    }
}

#[derive(Default)]
struct Inner {
    listeners: Vec<Arc<dyn Subscriber>>,
    cork_depth: usize,
    corked: Vec<Event>,
}

/// Dispatch table for job and trove events.
#[derive(Default)]
pub struct Publisher {
    inner: Mutex<Inner>,
}

fn same_listener(a: &Arc<dyn Subscriber>, b: &Arc<dyn Subscriber>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`. No-op when it is already attached.
    pub fn attach(&self, listener: Arc<dyn Subscriber>) {
        let mut inner = self.inner.lock();
        if inner.listeners.iter().any(|l| same_listener(l, &listener)) {
            return;
        }
        tracing::debug!(subscriber = listener.name(), "attached");
        inner.listeners.push(listener);
    }

    /// Remove `listener`. No-op when it is not attached.
    pub fn detach(&self, listener: &Arc<dyn Subscriber>) {
        let mut inner = self.inner.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|l| !same_listener(l, listener));
        if inner.listeners.len() != before {
            tracing::debug!(subscriber = listener.name(), "detached");
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn is_corked(&self) -> bool {
        self.inner.lock().cork_depth > 0
    }

    /// Deliver `event` to every interested listener, or buffer it while corked.
    pub fn publish(&self, event: Event) -> Result<(), PublishError> {
        let listeners = {
            let mut inner = self.inner.lock();
            if inner.cork_depth > 0 {
                inner.corked.push(event);
                return Ok(());
            }
            inner.listeners.clone()
        };
        let failures = deliver(&listeners, &event);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(PublishError { failures })
        }
    }

    /// Defer delivery until the matching [`uncork`](Self::uncork). Nests.
    pub fn cork(&self) {
        self.inner.lock().cork_depth += 1;
    }

    /// Leave one cork level; at depth zero flush buffered events in order.
    pub fn uncork(&self) -> Result<(), PublishError> {
        let (listeners, events) = {
            let mut inner = self.inner.lock();
            inner.cork_depth = inner.cork_depth.saturating_sub(1);
            if inner.cork_depth > 0 || inner.corked.is_empty() {
                return Ok(());
            }
            (inner.listeners.clone(), std::mem::take(&mut inner.corked))
        };
        let mut failures = Vec::new();
        for event in &events {
            failures.extend(deliver(&listeners, event));
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(PublishError { failures })
        }
    }
}

fn deliver(listeners: &[Arc<dyn Subscriber>], event: &Event) -> Vec<(String, SubscriberError)> {
    tracing::debug!("{}", event.log_summary());
    let mut failures = Vec::new();
    for listener in listeners {
        if !listener.wants(event) {
            continue;
        }
        if let Err(e) = listener.handle(event) {
            tracing::warn!(subscriber = listener.name(), event = event.name(), error = %e, "subscriber failed");
            failures.push((listener.name().to_string(), e));
        }
    }
    failures
}

/// Subscriber that queues matching events for later draining.
pub struct EventQueue {
    name: String,
    interests: Vec<Interest>,
    events: Mutex<Vec<Event>>,
}

impl EventQueue {
    pub fn new(name: impl Into<String>, interests: Vec<Interest>) -> Self {
        Self {
            name: name.into(),
            interests,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Take every queued event, oldest first.
    pub fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl Subscriber for EventQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn interests(&self) -> Vec<Interest> {
        self.interests.clone()
    }

    fn handle(&self, event: &Event) -> Result<(), SubscriberError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;
