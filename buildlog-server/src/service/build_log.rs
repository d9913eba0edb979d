//! Build Log Service
//!
//! Turns a request for the log of a build into one ordered byte stream: the
//! output of every init step of the build's execution unit, in declared
//! order, followed by the output of its builder step.

use buildlog_core::domain::build::{Build, BuildPhase, BuildStrategy};
use buildlog_core::domain::unit::{ExecutionUnit, UnitPhase};
use buildlog_core::dto::log::{BuildLogOptions, LogRequest};
use buildlog_core::naming;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::repository::{
    BuildRepository, ExecutionUnitRepository, LogSource, LogStream, RepositoryError,
};
use crate::service::metrics::{LogEvent, LogMetrics, TracingMetrics};
use crate::service::phase_watcher::{self, WaitError};
use crate::service::steps::{self, StepLayout};

/// Errors returned before any log byte is produced
#[derive(Debug, Error)]
pub enum BuildLogError {
    #[error("invalid log options: {0}")]
    Validation(String),

    #[error("build {0} not found")]
    BuildNotFound(String),

    #[error("build {0} was deleted")]
    BuildDeleted(String),

    #[error("build {0} is in an unknown phase")]
    UnknownBuildPhase(String),

    #[error("timed out waiting for build {name} to start after {waited:?}")]
    Timeout { name: String, waited: Duration },

    #[error("build {name} is in phase {phase}, no logs are available")]
    NoLogsAvailable { name: String, phase: BuildPhase },

    #[error("build {0} uses the JenkinsPipeline strategy and has no build logs")]
    UnsupportedStrategy(String),

    #[error("cannot resolve logs for build {build}: {reason}")]
    Resolution { build: String, reason: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<WaitError> for BuildLogError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Deleted(name) => BuildLogError::BuildDeleted(name),
            WaitError::UnknownPhase { name } => BuildLogError::UnknownBuildPhase(name),
            WaitError::Timeout { name, waited } => BuildLogError::Timeout { name, waited },
            WaitError::Transport(e) => BuildLogError::Repository(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildLogError>;

/// Timing and buffering knobs of the log pipeline
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// How long to wait for a queued build to start
    pub wait_timeout: Duration,
    /// Pause between follow rounds that produced no output
    pub round_delay: Duration,
    /// Poll interval while the execution unit is still pending
    pub pending_poll_interval: Duration,
    /// Give up on a pending execution unit after this long
    pub pending_timeout: Duration,
    /// Bytes buffered between the aggregation task and the reader
    pub pipe_capacity: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(10),
            round_delay: Duration::from_millis(500),
            pending_poll_interval: Duration::from_secs(1),
            pending_timeout: Duration::from_secs(600),
            pipe_capacity: 64 * 1024,
        }
    }
}

/// Serves aggregated build logs
pub struct BuildLogService {
    builds: Arc<dyn BuildRepository>,
    units: Arc<dyn ExecutionUnitRepository>,
    logs: Arc<dyn LogSource>,
    metrics: Arc<dyn LogMetrics>,
    settings: StreamSettings,
}

impl BuildLogService {
    pub fn new(
        builds: Arc<dyn BuildRepository>,
        units: Arc<dyn ExecutionUnitRepository>,
        logs: Arc<dyn LogSource>,
    ) -> Self {
        Self {
            builds,
            units,
            logs,
            metrics: Arc::new(TracingMetrics),
            settings: StreamSettings::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn LogMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_settings(mut self, settings: StreamSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Opens the log of a build
    ///
    /// Every problem that can be detected up front is returned as an error.
    /// Once a stream is returned, later failures end it early with a
    /// diagnostic line. Cancelling `cancel` stops the background work.
    pub async fn get(
        &self,
        namespace: &str,
        name: &str,
        options: &BuildLogOptions,
        cancel: CancellationToken,
    ) -> Result<LogStream> {
        options.validate().map_err(BuildLogError::Validation)?;
        self.metrics.record(LogEvent::Requested);

        let build = self
            .builds
            .get_build(namespace, name)
            .await?
            .ok_or_else(|| BuildLogError::BuildNotFound(format!("{}/{}", namespace, name)))?;

        let build = self.redirect(build, options).await?;

        if build.strategy == BuildStrategy::JenkinsPipeline {
            return Err(BuildLogError::UnsupportedStrategy(build.qualified_name()));
        }

        let build = match self.ensure_started(build, options).await? {
            Some(build) => build,
            None => return Ok(Box::pin(tokio::io::empty())),
        };

        let unit = self.resolve_unit(&build).await?;

        if let Some(container) = options.container.as_deref() {
            if unit.main_step(container).is_none() {
                let valid: Vec<&str> = unit.main_steps.iter().map(|s| s.name.as_str()).collect();
                return Err(BuildLogError::Validation(format!(
                    "container {} is not valid for build {}, choose one of: [{}]",
                    container,
                    build.qualified_name(),
                    valid.join(" ")
                )));
            }
        }

        match StepLayout::of(&unit) {
            StepLayout::SingleStep => self.open_single_step(&build, &unit, options).await,
            StepLayout::MultiStep => {
                info!(
                    "Streaming {} init steps of build {} before its main step",
                    unit.init_steps.len(),
                    build.qualified_name()
                );
                Ok(self.spawn_aggregation(&build, unit, options.clone(), cancel))
            }
        }
    }

    /// Substitutes the previous or a numbered build of the same config
    async fn redirect(&self, build: Build, options: &BuildLogOptions) -> Result<Build> {
        let target = if options.previous {
            naming::previous_build_name(&build)
        } else if let Some(version) = options.version {
            naming::versioned_build_name(&build, version)
        } else {
            return Ok(build);
        };

        let target = target.map_err(|e| BuildLogError::Validation(e.to_string()))?;
        debug!("Redirecting log request for {} to {}", build.qualified_name(), target);

        self.builds
            .get_build(&build.namespace, &target)
            .await?
            .ok_or_else(|| BuildLogError::BuildNotFound(format!("{}/{}", build.namespace, target)))
    }

    /// Applies the phase rules
    ///
    /// # Returns
    /// The build to read logs from, or `None` when an empty stream must be
    /// returned
    async fn ensure_started(
        &self,
        build: Build,
        options: &BuildLogOptions,
    ) -> Result<Option<Build>> {
        let build = match build.phase {
            BuildPhase::New | BuildPhase::Pending => {
                if options.no_wait {
                    debug!(
                        "Build {} is {} and noWait is set, returning no logs",
                        build.qualified_name(),
                        build.phase
                    );
                    self.metrics.record(LogEvent::EmptyNoWait);
                    return Ok(None);
                }

                self.metrics.record(LogEvent::WaitStarted);
                match phase_watcher::wait_until_active(
                    self.builds.as_ref(),
                    &build,
                    self.settings.wait_timeout,
                )
                .await
                {
                    Ok(started) => started,
                    Err(e) => {
                        if matches!(e, WaitError::Timeout { .. }) {
                            self.metrics.record(LogEvent::WaitTimedOut);
                        }
                        return Err(e.into());
                    }
                }
            }
            BuildPhase::Unrecognized => {
                return Err(BuildLogError::UnknownBuildPhase(build.qualified_name()));
            }
            _ => build,
        };

        if matches!(build.phase, BuildPhase::Error | BuildPhase::Cancelled) {
            return Err(BuildLogError::NoLogsAvailable {
                name: build.qualified_name(),
                phase: build.phase,
            });
        }

        Ok(Some(build))
    }

    async fn resolve_unit(&self, build: &Build) -> Result<ExecutionUnit> {
        let unit_name = naming::unit_name_for_build(build);
        let resolution = |reason: String| BuildLogError::Resolution {
            build: build.qualified_name(),
            reason,
        };

        self.units
            .get_unit(&build.namespace, &unit_name)
            .await
            .map_err(|e| resolution(e.to_string()))?
            .ok_or_else(|| resolution(format!("execution unit {} not found", unit_name)))
    }

    async fn open_single_step(
        &self,
        build: &Build,
        unit: &ExecutionUnit,
        options: &BuildLogOptions,
    ) -> Result<LogStream> {
        let (step, fallback) = steps::select_main_step(unit, options.container.as_deref())
            .ok_or_else(|| BuildLogError::Resolution {
                build: build.qualified_name(),
                reason: format!("execution unit {} has no main step", unit.name),
            })?;

        if fallback {
            warn!(
                "No builder step in unit {}, streaming step {} instead",
                unit.name, step.name
            );
        }

        // A finished unit produces no more output
        let follow = options.follow && !unit.phase.is_terminal();
        let request = LogRequest::for_step(&unit.namespace, &unit.name, &step.name, follow, options);

        let stream = self
            .logs
            .open(&request)
            .await
            .map_err(|e| BuildLogError::Resolution {
                build: build.qualified_name(),
                reason: e.to_string(),
            })?;

        self.metrics.record(LogEvent::StepStreamed);
        Ok(stream)
    }

    fn spawn_aggregation(
        &self,
        build: &Build,
        unit: ExecutionUnit,
        options: BuildLogOptions,
        cancel: CancellationToken,
    ) -> LogStream {
        let (reader, writer) = tokio::io::duplex(self.settings.pipe_capacity);

        let aggregation = Aggregation {
            units: Arc::clone(&self.units),
            logs: Arc::clone(&self.logs),
            metrics: Arc::clone(&self.metrics),
            settings: self.settings.clone(),
            build: build.qualified_name(),
            namespace: unit.namespace,
            unit: unit.name,
            options,
            cancel,
        };

        let build_name = build.qualified_name();
        let handle = tokio::spawn(aggregation.run(writer));
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!("Log aggregation for build {} panicked: {}", build_name, e);
                }
            }
        });

        Box::pin(reader)
    }
}

// =============================================================================
// Aggregation loop
// =============================================================================

/// Ways the aggregation loop can end early
#[derive(Debug, Error)]
enum StreamError {
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    #[error("execution unit {0} no longer exists")]
    UnitGone(String),

    #[error("execution unit {unit} still pending after {waited:?}")]
    PendingTimeout { unit: String, waited: Duration },

    #[error("execution unit {0} has no main step")]
    NoMainStep(String),

    #[error("cancelled")]
    Cancelled,

    #[error("reader went away")]
    ReaderGone,
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::BrokenPipe {
            StreamError::ReaderGone
        } else {
            StreamError::Repository(RepositoryError::Io(err))
        }
    }
}

enum Finish {
    Completed,
    InitStepFailed,
}

/// State owned by the background task of one multi-step request
struct Aggregation {
    units: Arc<dyn ExecutionUnitRepository>,
    logs: Arc<dyn LogSource>,
    metrics: Arc<dyn LogMetrics>,
    settings: StreamSettings,
    build: String,
    namespace: String,
    unit: String,
    options: BuildLogOptions,
    cancel: CancellationToken,
}

impl Aggregation {
    async fn run(self, mut writer: DuplexStream) {
        match self.stream_all(&mut writer).await {
            Ok(Finish::Completed) => {
                self.metrics.record(LogEvent::StreamCompleted);
                debug!("Finished streaming logs of build {}", self.build);
            }
            Ok(Finish::InitStepFailed) => {
                self.metrics.record(LogEvent::InitStepFailed);
                info!(
                    "An init step of build {} failed, skipping its main step",
                    self.build
                );
            }
            Err(StreamError::Cancelled) | Err(StreamError::ReaderGone) => {
                debug!("Log stream of build {} closed by the reader", self.build);
            }
            Err(e) => {
                self.metrics.record(LogEvent::StreamTruncated);
                warn!("Log stream of build {} truncated: {}", self.build, e);
                let line = format!("unable to stream build logs: {}\n", e);
                let _ = writer.write_all(line.as_bytes()).await;
            }
        }

        let _ = writer.shutdown().await;
    }

    async fn stream_all(&self, writer: &mut DuplexStream) -> std::result::Result<Finish, StreamError> {
        let follow = self.options.follow;
        let mut streamed: HashSet<String> = HashSet::new();

        loop {
            if self.cancel.is_cancelled() {
                return Err(StreamError::Cancelled);
            }

            let unit = self.fetch_unit().await?;
            let plan = steps::plan_round(&unit.init_steps, &streamed, follow);

            let mut copied = 0;
            for step in &plan.steps {
                copied += self.stream_step(writer, &step.name, step.follow).await?;
                streamed.insert(step.name.clone());
            }

            if plan.failed {
                return Ok(Finish::InitStepFailed);
            }
            if !follow || plan.is_final() {
                break;
            }
            if unit.phase.is_terminal() {
                debug!(
                    "Unit {} finished with init steps still waiting",
                    self.unit
                );
                break;
            }
            if copied == 0 {
                self.pause(self.settings.round_delay).await?;
            }
        }

        // Init logs may have taken a while; decide on a fresh snapshot
        let unit = self.wait_while_pending().await?;

        let (step, fallback) = steps::select_main_step(&unit, self.options.container.as_deref())
            .ok_or_else(|| StreamError::NoMainStep(self.unit.clone()))?;
        if fallback {
            warn!(
                "No builder step in unit {}, streaming step {} instead",
                self.unit, step.name
            );
        }

        let step_follow = follow && !unit.phase.is_terminal();
        self.stream_step(writer, &step.name, step_follow).await?;

        Ok(Finish::Completed)
    }

    async fn fetch_unit(&self) -> std::result::Result<ExecutionUnit, StreamError> {
        self.units
            .get_unit(&self.namespace, &self.unit)
            .await?
            .ok_or_else(|| StreamError::UnitGone(format!("{}/{}", self.namespace, self.unit)))
    }

    /// Fetches the unit, polling until it is no longer pending
    async fn wait_while_pending(&self) -> std::result::Result<ExecutionUnit, StreamError> {
        let deadline = Instant::now() + self.settings.pending_timeout;

        loop {
            let unit = self.fetch_unit().await?;
            if unit.phase != UnitPhase::Pending {
                return Ok(unit);
            }
            if Instant::now() >= deadline {
                return Err(StreamError::PendingTimeout {
                    unit: self.unit.clone(),
                    waited: self.settings.pending_timeout,
                });
            }
            self.pause(self.settings.pending_poll_interval).await?;
        }
    }

    /// Copies one step log into the pipe
    ///
    /// # Returns
    /// Number of bytes copied
    async fn stream_step(
        &self,
        writer: &mut DuplexStream,
        step: &str,
        follow: bool,
    ) -> std::result::Result<u64, StreamError> {
        let request = LogRequest::for_step(&self.namespace, &self.unit, step, follow, &self.options);
        let mut stream = self.logs.open(&request).await?;

        let copied = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(StreamError::Cancelled),
            result = tokio::io::copy(&mut stream, writer) => result?,
        };

        self.metrics.record(LogEvent::StepStreamed);
        debug!(
            "Streamed {} bytes of step {} of unit {} (follow={})",
            copied, step, self.unit, follow
        );
        Ok(copied)
    }

    async fn pause(&self, delay: Duration) -> std::result::Result<(), StreamError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StreamError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
