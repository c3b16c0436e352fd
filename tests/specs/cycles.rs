//! Dependency cycles.

use crate::prelude::*;

#[tokio::test]
async fn two_node_cycle_is_broken_by_an_external_build() {
    let world = World::new();
    world.loader.set("a:source", requires(&["b:runtime"]));
    world.loader.set("b:source", requires(&["a:runtime"]));
    world.publish("a:runtime=0.9[]");

    let job = world.build(vec![source("a"), source("b")]).await;

    assert_eq!(job.state(), JobState::Built);
    assert_eq!(world.worker.dispatched(), vec![source("b"), source("a")]);
    assert_eq!(
        job.trove(&source("b")).unwrap().resolved_requirements(),
        &[artifact("a:runtime=0.9[]")]
    );
    assert_eq!(
        job.trove(&source("a")).unwrap().resolved_requirements(),
        &[artifact("b:runtime=1[]")]
    );
}

#[tokio::test]
async fn unresolvable_cycle_terminates() {
    let world = World::new();
    world.loader.set("a:source", requires(&["b:runtime"]));
    world.loader.set("b:source", requires(&["a:runtime"]));

    let job = world.build(vec![source("a"), source("b")]).await;

    assert_eq!(job.state(), JobState::Failed);
    assert_eq!(
        job.failure().unwrap().to_string(),
        "Did not find any buildable troves"
    );
    assert!(world.worker.dispatched().is_empty());
    assert!(job.troves().all(|t| t.state() == TroveState::Unbuildable));
}
