// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::flavor::Flavor;
use crate::job::JobId;
use crate::trove::TroveSpec;
use crate::TrovePayload;

struct Failing;

impl Subscriber for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn interests(&self) -> Vec<Interest> {
        vec![Interest::Kind(EventKind::JobLogUpdated)]
    }

    fn handle(&self, _event: &Event) -> Result<(), SubscriberError> {
        Err(SubscriberError::new("disk full"))
    }
}

fn log(message: &str) -> Event {
    Event::JobLogUpdated {
        job_id: JobId::new("job-1"),
        message: message.to_string(),
    }
}

fn trove_state(state: TroveState) -> Event {
    Event::TroveStateUpdated {
        job_id: JobId::new("job-1"),
        trove: TroveSpec::new("a:source", "1", Flavor::empty()),
        state,
        old_state: TroveState::Init,
        status: String::new(),
        payload: TrovePayload::None,
    }
}

fn messages(queue: &EventQueue) -> Vec<String> {
    queue
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            Event::JobLogUpdated { message, .. } => Some(message),
            _ => None,
        })
        .collect()
}

#[test]
fn delivers_only_to_interested_listeners() {
    let publisher = Publisher::new();
    let logs = Arc::new(EventQueue::new(
        "logs",
        vec![Interest::Kind(EventKind::JobLogUpdated)],
    ));
    let built = Arc::new(EventQueue::new(
        "built",
        vec![Interest::TroveState(TroveState::Built)],
    ));
    publisher.attach(logs.clone());
    publisher.attach(built.clone());

    publisher.publish(log("hello")).unwrap();
    publisher.publish(trove_state(TroveState::Buildable)).unwrap();
    publisher.publish(trove_state(TroveState::Built)).unwrap();

    assert_eq!(messages(&logs), vec!["hello"]);
    let events = built.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0], trove_state(TroveState::Built));
}

#[test]
fn attach_and_detach_are_idempotent() {
    let publisher = Publisher::new();
    let queue: Arc<dyn Subscriber> = Arc::new(EventQueue::new(
        "q",
        vec![Interest::Kind(EventKind::JobLogUpdated)],
    ));
    publisher.attach(queue.clone());
    publisher.attach(queue.clone());
    assert_eq!(publisher.listener_count(), 1);

    publisher.detach(&queue);
    publisher.detach(&queue);
    assert_eq!(publisher.listener_count(), 0);
}

#[test]
fn failing_listener_does_not_block_others() {
    let publisher = Publisher::new();
    let queue = Arc::new(EventQueue::new(
        "after",
        vec![Interest::Kind(EventKind::JobLogUpdated)],
    ));
    publisher.attach(Arc::new(Failing));
    publisher.attach(queue.clone());

    let err = publisher.publish(log("x")).unwrap_err();
    assert_eq!(err.failures.len(), 1);
    assert_eq!(err.failures[0].0, "failing");
    assert_eq!(err.to_string(), "1 subscriber(s) failed: failing: disk full");
    assert_eq!(messages(&queue), vec!["x"]);
}

#[test]
fn nested_cork_flushes_in_order_at_depth_zero() {
    let publisher = Publisher::new();
    let queue = Arc::new(EventQueue::new(
        "q",
        vec![Interest::Kind(EventKind::JobLogUpdated)],
    ));
    publisher.attach(queue.clone());

    publisher.cork();
    publisher.cork();
    publisher.publish(log("one")).unwrap();
    publisher.publish(log("two")).unwrap();
    publisher.uncork().unwrap();
    assert!(queue.is_empty());
    assert!(publisher.is_corked());

    publisher.publish(log("three")).unwrap();
    publisher.uncork().unwrap();
    assert!(!publisher.is_corked());
    assert_eq!(messages(&queue), vec!["one", "two", "three"]);
}

#[test]
fn uncork_aggregates_failures() {
    let publisher = Publisher::new();
    publisher.attach(Arc::new(Failing));
    publisher.cork();
    publisher.publish(log("a")).unwrap();
    publisher.publish(log("b")).unwrap();
    let err = publisher.uncork().unwrap_err();
    assert_eq!(err.failures.len(), 2);
}

#[test]
fn unbalanced_uncork_is_harmless() {
    let publisher = Publisher::new();
    assert!(publisher.uncork().is_ok());
    assert!(!publisher.is_corked());
}
