//! Build ordering and external resolution.

use crate::prelude::*;

#[tokio::test]
async fn simple_job_builds_providers_first() {
    let world = World::new();
    world.loader.set("app:source", requires(&["lib:runtime"]));

    let job = world.build(vec![source("app"), source("lib")]).await;

    assert_eq!(job.state(), JobState::Built);
    assert_eq!(world.worker.dispatched(), vec![source("lib"), source("app")]);
    assert_eq!(state_of(&job, "app"), TroveState::Built);
    assert_eq!(
        job.trove(&source("app")).unwrap().resolved_requirements(),
        &[artifact("lib:runtime=1[]")]
    );
}

#[tokio::test]
async fn external_requirements_come_from_the_label() {
    let world = World::new();
    world.loader.set("app:source", requires(&["zlib:runtime"]));
    world.publish("zlib:runtime=1.2[]");

    let job = world.build(vec![source("app")]).await;

    assert_eq!(job.state(), JobState::Built);
    assert_eq!(
        job.trove(&source("app")).unwrap().resolved_requirements(),
        &[artifact("zlib:runtime=1.2[]")]
    );
}

#[tokio::test]
async fn build_order_does_not_depend_on_insertion_order() {
    let mut orders = Vec::new();
    for specs in [
        vec![source("a"), source("b"), source("c")],
        vec![source("c"), source("a"), source("b")],
    ] {
        let world = World::new();
        world.loader.set("a:source", requires(&["b:runtime"]));
        world.loader.set("b:source", requires(&["c:runtime"]));
        let job = world.build(specs).await;
        assert_eq!(job.state(), JobState::Built);
        orders.push(world.worker.dispatched());
    }
    assert_eq!(orders[0], vec![source("c"), source("b"), source("a")]);
    assert_eq!(orders[0], orders[1]);
}

#[tokio::test]
async fn job_log_narrates_the_build() {
    let world = World::new();
    world.loader.set("app:source", requires(&["lib:runtime"]));

    world.build(vec![source("app"), source("lib")]).await;

    let log = world.job_log();
    let started = log.find("Build started - loading troves").unwrap();
    let lib = log.find("Building lib:source").unwrap();
    let app = log.find("Building app:source").unwrap();
    assert!(started < lib && lib < app, "log out of order:\n{log}");
    assert!(log.contains("[job] Built"));
}
