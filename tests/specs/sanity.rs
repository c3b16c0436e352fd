//! Job sanity checks.

use crate::prelude::*;

fn group() -> TroveMetadata {
    TroveMetadata {
        recipe_type: RecipeType::Group,
        ..TroveMetadata::default()
    }
}

#[tokio::test]
async fn group_recipe_with_company_is_rejected() {
    let world = World::new();
    world.loader.set("group-os:source", group());

    let job = world.build(vec![source("group-os"), source("app")]).await;

    assert_eq!(job.state(), JobState::Failed);
    assert!(job
        .failure()
        .unwrap()
        .to_string()
        .starts_with("Job failed sanity check:"));
    assert_eq!(state_of(&job, "group-os"), TroveState::Failed);
    assert_eq!(state_of(&job, "app"), TroveState::Unbuildable);
    assert!(world.worker.dispatched().is_empty());
}

#[tokio::test]
async fn group_recipe_alone_builds() {
    let world = World::new();
    world.loader.set("group-os:source", group());

    let job = world.build(vec![source("group-os")]).await;

    assert_eq!(job.state(), JobState::Built);
}
