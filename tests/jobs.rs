// tests/jobs.rs

mod common;
use crate::common::{RecordingRunner, arg, eventually, init_tracing, settle, with_timeout};

use std::error::Error;
use std::sync::Arc;

use tokio::sync::mpsc;

use inotify_watcher::config::JobSpec;
use inotify_watcher::exec::CommandDispatcher;
use inotify_watcher::fs::RealFileSystem;
use inotify_watcher::job::{Job, JobContext, JobOrigin, JobRequest, RemoveReason};
use inotify_watcher::registry::JobRegistry;
use inotify_watcher::watch::{EventKind, EventMask};

type TestResult = Result<(), Box<dyn Error>>;

struct Harness {
    ctx: JobContext,
    requests: mpsc::UnboundedReceiver<JobRequest>,
    runner: RecordingRunner,
}

fn harness() -> Harness {
    let (tx, requests) = mpsc::unbounded_channel();
    let runner = RecordingRunner::new();
    let ctx = JobContext {
        requests: tx,
        dispatcher: CommandDispatcher::new(Arc::new(runner.clone()), 4),
        fs: Arc::new(RealFileSystem),
    };
    Harness {
        ctx,
        requests,
        runner,
    }
}

fn start(h: &Harness, origin: JobOrigin, spec: JobSpec) -> Job {
    let template = Arc::new(spec.clone());
    Job::start(origin, template, spec, &h.ctx).unwrap()
}

fn command_job(path: &std::path::Path) -> JobSpec {
    JobSpec {
        command: Some("/bin/true".into()),
        ..JobSpec::new(path)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn close_write_dispatches_command() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let h = harness();
    let _job = start(&h, JobOrigin::Config, command_job(dir.path()));

    let file = dir.path().join("a.txt");
    std::fs::write(&file, b"x")?;

    assert!(eventually(|| h.runner.count() == 1).await);
    assert_eq!(
        h.runner.calls(),
        vec![vec!["CloseWrite".to_string(), arg(&file)]]
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delete_self_requests_removal() -> TestResult {
    init_tracing();
    let root = tempfile::tempdir()?;
    let target = root.path().join("w");
    std::fs::create_dir(&target)?;

    let mut h = harness();
    let job = start(&h, JobOrigin::Config, JobSpec::new(&target));
    let id = job.id();

    std::fs::remove_dir(&target)?;

    let request = with_timeout(h.requests.recv()).await.unwrap();
    assert_eq!(
        request,
        JobRequest::Remove {
            id,
            reason: RemoveReason::DeleteSelf
        }
    );
    assert!(eventually(|| job.is_closed()).await);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn recursive_job_requests_child_for_new_directory() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let mut h = harness();
    let spec = JobSpec {
        recursive: true,
        ..JobSpec::new(dir.path())
    };
    let job = start(&h, JobOrigin::Config, spec);

    let sub = dir.path().join("sub");
    std::fs::create_dir(&sub)?;

    let request = with_timeout(h.requests.recv()).await.unwrap();
    assert_eq!(
        request,
        JobRequest::SpawnChild {
            parent: job.id(),
            path: sub
        }
    );
    // Create was not requested, so nothing ran.
    assert_eq!(h.runner.count(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn job_watches_its_full_mask() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let h = harness();
    let spec = JobSpec {
        events: EventMask::of(EventKind::Create),
        ..command_job(dir.path())
    };
    let _job = start(&h, JobOrigin::Config, spec);

    std::fs::write(dir.path().join("n"), b"")?;
    assert!(eventually(|| h.runner.count() == 1).await);
    settle().await;

    // The CloseWrite from the same write does not run anything.
    assert_eq!(h.runner.calls()[0][0], "Create");
    assert_eq!(h.runner.count(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn registry_tracks_jobs_by_id() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    std::fs::create_dir(&a)?;
    std::fs::create_dir(&b)?;

    let h = harness();
    let registry = JobRegistry::new();
    let file_origin = JobOrigin::JobFile("web.job".into());

    let first = registry.insert(start(&h, JobOrigin::Config, command_job(&a)));
    let second = registry.insert(start(&h, file_origin.clone(), command_job(&b)));
    let third = registry.insert(start(&h, file_origin.clone(), JobSpec::new(&a)));

    assert_ne!(first, second);
    assert_eq!(registry.len(), 3);

    let snapshot = registry.snapshot();
    let ids: Vec<_> = snapshot.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![first, second, third]);
    assert_eq!(snapshot[0].path, a);
    assert_eq!(snapshot[0].command.as_deref(), Some("/bin/true"));
    assert_eq!(snapshot[1].origin, file_origin);
    assert!(snapshot[0].to_string().contains("command=/bin/true"));

    assert!(registry.remove(first));
    assert!(!registry.remove(first), "second removal is a no-op");
    assert!(!registry.contains(first));

    assert_eq!(registry.remove_origin(&file_origin), 2);
    assert!(registry.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn expansions_are_keyed_by_template_and_path() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let h = harness();
    let registry = JobRegistry::new();

    let template = Arc::new(JobSpec {
        recursive: true,
        ..JobSpec::new(dir.path())
    });
    let other = Arc::new((*template).clone());
    let id = registry.insert(Job::start(
        JobOrigin::Config,
        Arc::clone(&template),
        (*template).clone(),
        &h.ctx,
    )?);

    assert!(registry.has_expansion(&template, dir.path()));
    assert!(!registry.has_expansion(&other, dir.path()), "equal but distinct template");
    assert!(!registry.has_expansion(&template, &dir.path().join("x")));

    let (origin, found) = registry.template_of(id).unwrap();
    assert_eq!(origin, JobOrigin::Config);
    assert!(Arc::ptr_eq(&found, &template));

    assert_eq!(registry.clear(), 1);
    assert!(registry.template_of(id).is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_and_removals() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let h = harness();
    let registry = Arc::new(JobRegistry::new());

    let mut tasks = Vec::new();
    for i in 0..16 {
        let registry = Arc::clone(&registry);
        let ctx = h.ctx.clone();
        let path = dir.path().to_path_buf();
        tasks.push(tokio::spawn(async move {
            let spec = JobSpec::new(path);
            let job = Job::start(JobOrigin::Config, Arc::new(spec.clone()), spec, &ctx).unwrap();
            let id = registry.insert(job);
            if i % 2 == 0 {
                assert!(registry.remove(id));
            }
        }));
    }
    for task in tasks {
        task.await?;
    }

    assert_eq!(registry.len(), 8);
    Ok(())
}
