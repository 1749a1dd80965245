// tests/dispatcher.rs

mod common;
use crate::common::{eventually, init_tracing, with_timeout};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;

use inotify_watcher::errors::{Result, WatcherError};
use inotify_watcher::exec::{CommandDispatcher, CommandInvocation, CommandRunner};

/// Runner that blocks every command until the gate opens.
struct GatedRunner {
    gate: Semaphore,
    running: AtomicUsize,
    max_running: AtomicUsize,
    finished: AtomicUsize,
}

impl GatedRunner {
    fn closed() -> Self {
        Self {
            gate: Semaphore::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }
}

impl CommandRunner for GatedRunner {
    fn run(
        &self,
        _invocation: CommandInvocation,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);

            let _permit = self.gate.acquire().await.unwrap();

            self.running.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

struct FailingRunner;

impl CommandRunner for FailingRunner {
    fn run(
        &self,
        invocation: CommandInvocation,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move { Err(WatcherError::UnknownUser(invocation.program)) })
    }
}

fn invocation(n: usize) -> CommandInvocation {
    CommandInvocation {
        program: format!("/bin/cmd{n}"),
        args: vec![],
        owner: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_flight_commands_are_bounded() {
    init_tracing();
    let runner = Arc::new(GatedRunner::closed());
    let dispatcher = CommandDispatcher::new(runner.clone(), 4);

    for n in 0..10 {
        dispatcher.dispatch(invocation(n));
    }

    assert!(eventually(|| runner.running.load(Ordering::SeqCst) == 4).await);
    assert_eq!(dispatcher.pending(), 10, "queued commands count as pending");

    runner.gate.add_permits(100);
    with_timeout(dispatcher.drain()).await;

    assert_eq!(runner.finished.load(Ordering::SeqCst), 10);
    assert_eq!(runner.max_running.load(Ordering::SeqCst), 4);
    assert_eq!(dispatcher.pending(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failures_are_logged_not_fatal() {
    init_tracing();
    let dispatcher = CommandDispatcher::new(Arc::new(FailingRunner), 2);

    for n in 0..3 {
        dispatcher.dispatch(invocation(n));
    }
    with_timeout(dispatcher.drain()).await;
    assert_eq!(dispatcher.pending(), 0);
}

#[tokio::test]
async fn drain_with_nothing_pending_returns() {
    let dispatcher = CommandDispatcher::new(Arc::new(FailingRunner), 1);
    with_timeout(dispatcher.drain()).await;
}
