use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use inotify_watcher::errors::Result;
use inotify_watcher::exec::{CommandInvocation, CommandRunner};

/// A fake command runner that records every invocation and succeeds
/// immediately without spawning anything.
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingRunner {
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// `args` of every recorded invocation, in order, lossily converted
    /// to strings. Use [`RecordingRunner::invocations`] for the raw bytes.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.invocations()
            .into_iter()
            .map(|inv| {
                inv.args
                    .iter()
                    .map(|arg| arg.to_string_lossy().into_owned())
                    .collect()
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(
        &self,
        invocation: CommandInvocation,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let invocations = Arc::clone(&self.invocations);
        Box::pin(async move {
            invocations.lock().unwrap().push(invocation);
            Ok(())
        })
    }
}
