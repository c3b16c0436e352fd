//! Test helpers for behavioral specifications.
//!
//! A [`World`] owns the fake collaborators and a scratch state directory.
//! Jobs made through it carry the same observers a host would attach.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use tb_adapters::{FakeArtifact, FakeLoader, FakeOutcome, FakeResolver, FakeWorker};
pub use tb_core::test_support::{artifact, job_of, req, requires, source};
pub use tb_core::{
    FailureReason, FakeClock, Job, JobState, RecipeType, TroveMetadata, TroveSpec, TroveState,
};
pub use tb_engine::{Builder, BuilderDeps, EngineConfig, JobLogger, StatusReporter};
pub use tb_storage::{JobRecorder, JobSnapshot, MaterializedState};

/// Repository label the scenarios resolve against.
pub const LABEL: &str = "example.com@rpl:devel";

pub struct World {
    pub worker: FakeWorker,
    pub resolver: FakeResolver,
    pub loader: FakeLoader,
    pub recorder: Arc<JobRecorder>,
    dir: tempfile::TempDir,
}

impl World {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(JobRecorder::open(&dir.path().join("state/events.wal")).unwrap());
        Self {
            worker: FakeWorker::new(),
            resolver: FakeResolver::new(),
            loader: FakeLoader::new(),
            recorder,
            dir,
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.path().join("logs")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    /// A job over `specs` that installs from [`LABEL`], with observers attached.
    pub fn job(&self, specs: Vec<TroveSpec>) -> Job {
        let mut job = job_of(specs);
        job.configure("", |c| c.install_label_path = vec![LABEL.into()])
            .unwrap();
        let publisher = job.publisher();
        publisher.attach(Arc::new(JobLogger::new(self.log_dir())));
        publisher.attach(Arc::new(StatusReporter::new()));
        publisher.attach(self.recorder.clone());
        job
    }

    pub fn builder(&self, job: Job) -> Builder<FakeWorker, FakeResolver, FakeLoader, FakeClock> {
        let deps = BuilderDeps {
            worker: self.worker.clone(),
            resolver: self.resolver.clone(),
            loader: self.loader.clone(),
        };
        Builder::new(job, deps, FakeClock::new(), self.config())
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            idle_backoff: Duration::from_millis(1),
            idle_backoff_max: Duration::from_millis(5),
            stop_grace: Duration::from_millis(20),
            log_dir: self.log_dir(),
        }
    }

    /// Build `specs` to completion and hand back the finished job.
    pub async fn build(&self, specs: Vec<TroveSpec>) -> Job {
        let mut builder = self.builder(self.job(specs));
        let state = builder.build().await;
        let job = builder.into_job();
        assert_eq!(job.state(), state);
        job
    }

    /// Publish `id` (e.g. `zlib:runtime=1[]`) on [`LABEL`].
    pub fn publish(&self, id: &str) {
        self.resolver.publish(LABEL, FakeArtifact::new(artifact(id)));
    }

    pub fn job_log(&self) -> String {
        std::fs::read_to_string(self.log_dir().join("jobs/job-1.log")).unwrap_or_default()
    }

    pub fn persisted(&self) -> MaterializedState {
        self.recorder.state()
    }
}

pub fn state_of(job: &Job, name: &str) -> TroveState {
    job.trove(&source(name)).unwrap().state()
}

pub fn failure_of(job: &Job, name: &str) -> FailureReason {
    job.trove(&source(name)).unwrap().failure().cloned().unwrap()
}
