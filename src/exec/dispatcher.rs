// src/exec/dispatcher.rs

//! Deferred, bounded command dispatch.

use std::sync::Arc;

use tokio::sync::{Semaphore, watch};
use tracing::{debug, error};

use crate::exec::CommandInvocation;
use crate::exec::runner::CommandRunner;

/// Commands allowed to run at the same time, matching the reactor's worker
/// count.
pub const DEFAULT_COMMAND_SLOTS: usize = 4;

/// Posts command invocations onto the runtime.
///
/// `dispatch` never blocks: each invocation becomes its own task that waits
/// for one of the slots, runs, and logs any failure. Invocations beyond the
/// slot count queue up as pending tasks. Clones share slots and the pending
/// count.
#[derive(Clone)]
pub struct CommandDispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    runner: Arc<dyn CommandRunner>,
    slots: Arc<Semaphore>,
    pending: watch::Sender<usize>,
}

/// Decrements the pending count even if the runner panics.
struct PendingGuard(Arc<Inner>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.pending.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl CommandDispatcher {
    pub fn new(runner: Arc<dyn CommandRunner>, slots: usize) -> Self {
        let (pending, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                runner,
                slots: Arc::new(Semaphore::new(slots.max(1))),
                pending,
            }),
        }
    }

    /// Queue `invocation` for execution. Must be called within a Tokio runtime.
    pub fn dispatch(&self, invocation: CommandInvocation) {
        self.inner.pending.send_modify(|n| *n += 1);
        let guard = PendingGuard(Arc::clone(&self.inner));

        tokio::spawn(async move {
            let inner = Arc::clone(&guard.0);
            let Ok(_permit) = Arc::clone(&inner.slots).acquire_owned().await else {
                debug!(command = %invocation, "dispatcher closed; command dropped");
                return;
            };

            if let Err(err) = inner.runner.run(invocation.clone()).await {
                error!(command = %invocation, error = %err, "command failed");
            }
            drop(guard);
        });
    }

    /// Invocations dispatched and not yet finished, queued ones included.
    pub fn pending(&self) -> usize {
        *self.inner.pending.borrow()
    }

    /// Wait until every dispatched invocation has finished.
    pub async fn drain(&self) {
        let mut rx = self.inner.pending.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("available_slots", &self.inner.slots.available_permits())
            .field("pending", &self.pending())
            .finish()
    }
}
