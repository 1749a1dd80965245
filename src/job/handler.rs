// src/job/handler.rs

use std::ffi::OsStr;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::JobSpec;
use crate::errors::WatcherError;
use crate::job::routing::{JobAction, route_event};
use crate::job::{JobContext, JobId, JobRequest, RemoveReason};
use crate::watch::{EventHandler, EventKind};

/// Event handler attached to a job's watch.
///
/// Commands go straight to the dispatcher; anything touching the registry
/// is posted to the orchestrator as a [`JobRequest`].
pub(crate) struct JobEventHandler {
    id: JobId,
    spec: Arc<JobSpec>,
    ctx: JobContext,
}

impl JobEventHandler {
    pub(crate) fn new(id: JobId, spec: Arc<JobSpec>, ctx: JobContext) -> Self {
        Self { id, spec, ctx }
    }

    fn request(&self, request: JobRequest) {
        if self.ctx.requests.send(request).is_err() {
            debug!(job = %self.id, "orchestrator gone; request dropped");
        }
    }
}

impl EventHandler for JobEventHandler {
    fn on_event(&mut self, kind: EventKind, name: &OsStr) -> ControlFlow<()> {
        debug!(job = %self.id, path = ?self.spec.path, event = %kind, name = ?name, "event");

        let mut flow = ControlFlow::Continue(());
        for action in route_event(&self.spec, kind, name, self.ctx.fs.as_ref()) {
            match action {
                JobAction::Run(invocation) => {
                    debug!(job = %self.id, command = %invocation, "dispatching command");
                    self.ctx.dispatcher.dispatch(invocation);
                }
                JobAction::SpawnChild(path) => {
                    self.request(JobRequest::SpawnChild {
                        parent: self.id,
                        path,
                    });
                }
                JobAction::Terminate => {
                    warn!(job = %self.id, path = ?self.spec.path, "watched path deleted; job ends");
                    self.request(JobRequest::Remove {
                        id: self.id,
                        reason: RemoveReason::DeleteSelf,
                    });
                    flow = ControlFlow::Break(());
                }
            }
        }
        flow
    }

    fn on_error(&mut self, path: &Path, error: &WatcherError) {
        error!(job = %self.id, path = ?path, error = %error, "job watch failed");
        self.request(JobRequest::Remove {
            id: self.id,
            reason: RemoveReason::WatchFailed,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::path::PathBuf;
    use std::pin::Pin;

    use tokio::sync::mpsc;

    use super::*;
    use crate::exec::{CommandDispatcher, CommandInvocation, CommandRunner};
    use crate::fs::mock::MockFileSystem;
    use crate::watch::FramingError;

    struct IdleRunner;

    impl CommandRunner for IdleRunner {
        fn run(
            &self,
            _invocation: CommandInvocation,
        ) -> Pin<Box<dyn Future<Output = crate::errors::Result<()>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn handler(spec: JobSpec) -> (JobEventHandler, mpsc::UnboundedReceiver<JobRequest>, JobId) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = JobContext {
            requests: tx,
            dispatcher: CommandDispatcher::new(Arc::new(IdleRunner), 1),
            fs: Arc::new(MockFileSystem::new()),
        };
        let id = JobId::next();
        (JobEventHandler::new(id, Arc::new(spec), ctx), rx, id)
    }

    #[tokio::test]
    async fn framing_error_requests_removal() {
        let (mut handler, mut rx, id) = handler(JobSpec::new("/data"));

        let error = WatcherError::Framing(FramingError::NameOverrun {
            offset: 0,
            len: 64,
            available: 16,
        });
        handler.on_error(&PathBuf::from("/data"), &error);

        assert_eq!(
            rx.try_recv().unwrap(),
            JobRequest::Remove {
                id,
                reason: RemoveReason::WatchFailed,
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn delete_self_ends_the_watch_without_a_command() {
        let spec = JobSpec {
            command: Some("/bin/true".into()),
            ..JobSpec::new("/data")
        };
        let (mut handler, mut rx, id) = handler(spec);

        let flow = handler.on_event(EventKind::DeleteSelf, OsStr::new(""));

        assert!(flow.is_break());
        assert_eq!(handler.ctx.dispatcher.pending(), 0);
        assert_eq!(
            rx.try_recv().unwrap(),
            JobRequest::Remove {
                id,
                reason: RemoveReason::DeleteSelf,
            }
        );
    }
}
