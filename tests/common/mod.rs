#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use inotify_watcher::fs::RealFileSystem;
use inotify_watcher::logging::LogHandle;
use inotify_watcher::registry::JobSummary;
use inotify_watcher::service::{ServiceHandle, ServiceOptions, ServiceState, ServiceWatcher};

pub use inotify_watcher_test_utils::{
    ConfigBuilder, JobBuilder, RecordingRunner, eventually, init_tracing, settle, with_timeout,
};

/// A service running against a temporary directory tree.
///
/// Layout: `<root>/etc/config.json`, `<root>/etc/jobs.d/`, and `<root>/data`
/// for watched content.
pub struct TestService {
    pub root: TempDir,
    pub runner: RecordingRunner,
    pub handle: ServiceHandle,
    pub task: tokio::task::JoinHandle<inotify_watcher::errors::Result<()>>,
}

impl TestService {
    /// Write `config_json`, start a service on it and wait until it is
    /// active.
    pub async fn start(config_json: &str) -> Self {
        let root = tempfile::tempdir().unwrap();
        Self::start_in(root, config_json).await
    }

    /// Like [`TestService::start`] but with a tree prepared by the caller.
    pub async fn start_in(root: TempDir, config_json: &str) -> Self {
        let etc = root.path().join("etc");
        std::fs::create_dir_all(etc.join("jobs.d")).unwrap();
        std::fs::create_dir_all(root.path().join("data")).unwrap();
        std::fs::write(etc.join("config.json"), config_json).unwrap();

        let runner = RecordingRunner::new();
        let options =
            ServiceOptions::new(etc.join("config.json")).with_jobs_dir(etc.join("jobs.d"));
        let service = ServiceWatcher::new(
            options,
            Arc::new(runner.clone()),
            Arc::new(RealFileSystem),
            LogHandle::disabled(),
        );
        let handle = service.handle();
        let task = tokio::spawn(service.run());

        with_timeout(handle.wait_for_state(ServiceState::Active)).await;

        Self {
            root,
            runner,
            handle,
            task,
        }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    pub fn data(&self) -> PathBuf {
        self.path("data")
    }

    pub fn config_path(&self) -> PathBuf {
        self.path("etc/config.json")
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.path("etc/jobs.d")
    }

    pub fn jobs(&self) -> Vec<JobSummary> {
        self.handle.snapshot()
    }

    pub fn job_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.jobs().into_iter().map(|j| j.path).collect();
        paths.sort();
        paths
    }

    pub fn has_job_on(&self, path: &Path) -> bool {
        self.jobs().iter().any(|j| j.path == path)
    }

    pub async fn stop(self) {
        self.handle.shutdown();
        with_timeout(self.handle.wait_for_state(ServiceState::Stopped)).await;
        with_timeout(self.task).await.unwrap().unwrap();
    }
}

/// Path of `path` as the command receives it (unescaped).
pub fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
