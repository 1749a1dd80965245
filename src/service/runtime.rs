// src/service/runtime.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::config::{JobSpec, ServiceConfig, list_job_files, load_job_file, load_service_config};
use crate::errors::{Result, WatcherError};
use crate::exec::{CommandDispatcher, CommandRunner};
use crate::fs::FileSystem;
use crate::job::{Job, JobContext, JobOrigin, JobRequest, RemoveReason};
use crate::logging::LogHandle;
use crate::registry::JobRegistry;
use crate::service::config_watch::{watch_config_file, watch_jobs_dir};
use crate::service::plan::plan_watches;
use crate::service::{ServiceEvent, ServiceHandle, ServiceOptions, ServiceState};
use crate::watch::WatchHandle;

/// Loads configuration, keeps the job registry in line with it, and routes
/// job requests until shut down.
pub struct ServiceWatcher {
    core: ServiceCore,
    events_rx: mpsc::UnboundedReceiver<ServiceEvent>,
    requests_rx: mpsc::UnboundedReceiver<JobRequest>,
}

/// Everything the loop mutates, split from the receivers so handlers can
/// borrow it while the loop owns the channels.
struct ServiceCore {
    options: ServiceOptions,
    fs: Arc<dyn FileSystem>,
    log: LogHandle,
    registry: Arc<JobRegistry>,
    dispatcher: CommandDispatcher,
    job_ctx: JobContext,
    events_tx: mpsc::UnboundedSender<ServiceEvent>,
    state_tx: watch::Sender<ServiceState>,
    config_watch: Option<WatchHandle>,
    jobs_dir_watch: Option<WatchHandle>,
}

impl fmt::Debug for ServiceWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceWatcher")
            .field("options", &self.core.options)
            .field("state", &*self.core.state_tx.borrow())
            .field("jobs", &self.core.registry.len())
            .finish_non_exhaustive()
    }
}

impl ServiceWatcher {
    pub fn new(
        options: ServiceOptions,
        runner: Arc<dyn CommandRunner>,
        fs: Arc<dyn FileSystem>,
        log: LogHandle,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ServiceState::Loading);

        let dispatcher = CommandDispatcher::new(runner, options.command_slots);
        let job_ctx = JobContext {
            requests: requests_tx,
            dispatcher: dispatcher.clone(),
            fs: Arc::clone(&fs),
        };

        Self {
            core: ServiceCore {
                options,
                fs,
                log,
                registry: Arc::new(JobRegistry::new()),
                dispatcher,
                job_ctx,
                events_tx,
                state_tx,
                config_watch: None,
                jobs_dir_watch: None,
            },
            events_rx,
            requests_rx,
        }
    }

    pub fn handle(&self) -> ServiceHandle {
        ServiceHandle {
            events: self.core.events_tx.clone(),
            registry: Arc::clone(&self.core.registry),
            state: self.core.state_tx.subscribe(),
        }
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        Arc::clone(&self.core.registry)
    }

    /// Run until a shutdown request.
    ///
    /// Fails only when the configuration file cannot be read at startup. A
    /// document that reads but does not validate starts the service with no
    /// jobs.
    pub async fn run(self) -> Result<()> {
        let ServiceWatcher {
            mut core,
            mut events_rx,
            mut requests_rx,
        } = self;

        core.set_state(ServiceState::Loading);
        core.load_initial()?;
        core.open_reload_watches();
        core.set_state(ServiceState::Active);
        info!(jobs = core.registry.len(), "service active");

        loop {
            tokio::select! {
                Some(event) = events_rx.recv() => {
                    debug!(?event, "service event");
                    if event == ServiceEvent::Shutdown {
                        break;
                    }
                    core.handle_event(event);
                }
                Some(request) = requests_rx.recv() => {
                    debug!(?request, "job request");
                    core.handle_request(request);
                }
                else => break,
            }
        }

        core.shutdown().await;
        Ok(())
    }
}

impl ServiceCore {
    fn set_state(&self, state: ServiceState) {
        self.state_tx.send_replace(state);
        debug!(%state, "service state");
    }

    fn load_initial(&self) -> Result<()> {
        let path = self.options.config_path.clone();
        match load_service_config(self.fs.as_ref(), &path) {
            Ok(config) => self.apply_config(config),
            Err(err @ (WatcherError::Config(_) | WatcherError::Json(_))) => {
                warn!(path = ?path, error = %err, "configuration invalid; starting with no jobs");
                self.load_jobs_dir();
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    fn reload(&self) {
        self.set_state(ServiceState::ReloadPending);
        let path = self.options.config_path.clone();
        match load_service_config(self.fs.as_ref(), &path) {
            Ok(config) => self.apply_config(config),
            Err(err) => {
                error!(path = ?path, error = %err, "reload failed; keeping current jobs");
            }
        }
        self.set_state(ServiceState::Active);
    }

    /// Replace every job with the ones described by `config` and the jobs
    /// directory.
    fn apply_config(&self, config: ServiceConfig) {
        self.log.set_debug(config.debug);

        let removed = self.registry.clear();
        let mut started = 0;
        for spec in config.jobs {
            started += self.start_spec(JobOrigin::Config, spec);
        }
        started += self.load_jobs_dir();

        info!(
            removed,
            started,
            skipped = config.skipped,
            debug = config.debug,
            "configuration applied"
        );
    }

    fn load_jobs_dir(&self) -> usize {
        let Some(dir) = self.options.jobs_dir.clone() else {
            return 0;
        };
        list_job_files(self.fs.as_ref(), &dir)
            .iter()
            .map(|file| self.apply_job_file(file))
            .sum()
    }

    /// Load one `*.job` file, replacing the jobs it produced before. A file
    /// that does not parse leaves those jobs alone.
    fn apply_job_file(&self, file: &Path) -> usize {
        let origin = job_file_origin(file);
        match load_job_file(self.fs.as_ref(), file) {
            Ok(spec) => {
                let replaced = self.registry.remove_origin(&origin);
                if replaced > 0 {
                    debug!(file = ?file, replaced, "replacing jobs from job file");
                }
                self.start_spec(origin, spec)
            }
            Err(err) => {
                warn!(file = ?file, error = %err, "job file skipped");
                0
            }
        }
    }

    fn start_spec(&self, origin: JobOrigin, spec: JobSpec) -> usize {
        let template = Arc::new(spec);
        let mut started = 0;
        for planned in plan_watches(self.fs.as_ref(), &template) {
            if self.start_job(origin.clone(), &template, planned) {
                started += 1;
            }
        }
        started
    }

    fn start_job(&self, origin: JobOrigin, template: &Arc<JobSpec>, spec: JobSpec) -> bool {
        let path = spec.path.clone();
        match Job::start(origin, Arc::clone(template), spec, &self.job_ctx) {
            Ok(job) => {
                self.registry.insert(job);
                true
            }
            Err(err) => {
                warn!(path = ?path, error = %err, "cannot start job");
                false
            }
        }
    }

    fn open_reload_watches(&mut self) {
        match watch_config_file(&self.options.config_path, self.events_tx.clone()) {
            Ok(handle) => self.config_watch = Some(handle),
            Err(err) => {
                warn!(error = %err, "cannot watch configuration; hot reload disabled");
            }
        }

        if let Some(dir) = &self.options.jobs_dir {
            if !self.fs.is_dir(dir) {
                debug!(path = ?dir, "no jobs directory");
                return;
            }
            match watch_jobs_dir(dir, self.events_tx.clone()) {
                Ok(handle) => self.jobs_dir_watch = Some(handle),
                Err(err) => warn!(path = ?dir, error = %err, "cannot watch jobs directory"),
            }
        }
    }

    fn handle_event(&mut self, event: ServiceEvent) {
        match event {
            ServiceEvent::ReloadConfig => self.reload(),
            ServiceEvent::ConfigWatchClosed => {
                self.config_watch = None;
            }
            ServiceEvent::JobFileWritten(file) => {
                let started = self.apply_job_file(&file);
                info!(file = ?file, started, "job file loaded");
            }
            ServiceEvent::JobFileRemoved(file) => {
                let removed = self.registry.remove_origin(&job_file_origin(&file));
                info!(file = ?file, removed, "job file removed");
            }
            ServiceEvent::JobsDirClosed => {
                self.jobs_dir_watch = None;
            }
            ServiceEvent::DumpStatus => self.dump_status(),
            ServiceEvent::Shutdown => {}
        }
    }

    fn handle_request(&mut self, request: JobRequest) {
        match request {
            JobRequest::SpawnChild { parent, path } => {
                let Some((origin, template)) = self.registry.template_of(parent) else {
                    debug!(job = %parent, path = ?path, "parent job gone; child not started");
                    return;
                };
                let started = self.expand_children(origin, &template, path.clone());
                debug!(job = %parent, path = ?path, started, "recursive expansion");
            }
            JobRequest::Remove { id, reason } => {
                if self.registry.remove(id) {
                    match reason {
                        RemoveReason::DeleteSelf => info!(job = %id, "job removed"),
                        RemoveReason::WatchFailed => warn!(job = %id, "failed job removed"),
                    }
                }
            }
        }
    }

    /// Start jobs on `root` and every directory below it that `template`
    /// does not cover yet. Each directory is watched before it is listed,
    /// so entries created meanwhile are caught by one or the other.
    fn expand_children(&self, origin: JobOrigin, template: &Arc<JobSpec>, root: PathBuf) -> usize {
        let mut started = 0;
        let mut pending = vec![root];

        while let Some(dir) = pending.pop() {
            if !self.registry.has_expansion(template, &dir)
                && self.start_job(origin.clone(), template, template.with_path(&dir))
            {
                started += 1;
            }

            match self.fs.read_dir(&dir) {
                Ok(entries) => pending.extend(
                    entries
                        .into_iter()
                        .filter(|p| self.fs.is_dir(p) && !self.fs.is_symlink(p)),
                ),
                Err(err) => debug!(path = ?dir, error = %err, "cannot list new directory"),
            }
        }
        started
    }

    fn dump_status(&self) {
        let jobs = self.registry.snapshot();
        let state = *self.state_tx.borrow();
        info!(
            %state,
            jobs = jobs.len(),
            pending_commands = self.dispatcher.pending(),
            config_watch = self.config_watch.is_some(),
            jobs_dir_watch = self.jobs_dir_watch.is_some(),
            "status"
        );
        for job in &jobs {
            info!("  {job}");
        }
    }

    async fn shutdown(&mut self) {
        self.set_state(ServiceState::Stopping);
        self.config_watch = None;
        self.jobs_dir_watch = None;
        let removed = self.registry.clear();

        let pending = self.dispatcher.pending();
        if pending > 0 {
            info!(pending, "waiting for running commands");
        }
        self.dispatcher.drain().await;

        info!(removed, "service stopped");
        self.set_state(ServiceState::Stopped);
    }
}

fn job_file_origin(file: &Path) -> JobOrigin {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string_lossy().into_owned());
    JobOrigin::JobFile(name)
}
