//! Process runner turning invocations into run records.
//!
//! The [`ProcessRunner`] is the only place that launches subjects. It hands
//! an [`Invocation`] to a [`ProcessExecutor`], observes the expected
//! artifacts once the child has finished and returns an immutable
//! [`RunRecord`]. Launch failures and timeouts come back as [`RunError`]
//! values; a nonzero exit or a signal is a valid record, not an error.
//!
//! The executor abstraction enables test doubles that report pre-configured
//! completions without spawning real processes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::context::{DEFAULT_TIMEOUT, SessionContext};
use crate::error::{RunError, SessionError};
use crate::record::{ArtifactObservation, ExitState, RunRecord};
use crate::session::{CommandLine, Configuration, Workload};

/// Tracing target for runner operations.
const RUNNER_TARGET: &str = "sandbench_harness::runner";

/// One fully resolved subject execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    workload: String,
    configuration: String,
    command: CommandLine,
    working_dir: PathBuf,
    artifacts: Vec<PathBuf>,
    timeout: Duration,
}

impl Invocation {
    /// Creates an invocation of an already rendered command.
    #[must_use]
    pub fn new(
        workload: impl Into<String>,
        configuration: impl Into<String>,
        command: CommandLine,
    ) -> Self {
        Self {
            workload: workload.into(),
            configuration: configuration.into(),
            command,
            working_dir: PathBuf::from("."),
            artifacts: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Renders a workload for `input` and `output`, wrapping it in the
    /// configuration's launcher when it has one.
    ///
    /// The `output` path is the expected artifact unless
    /// [`Invocation::with_artifacts`] replaces it. Working directory and
    /// timeout are taken from the context.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnwrappableArgument`] when the rendered
    /// command cannot be carried by the launcher as one string.
    pub fn prepare(
        context: &SessionContext,
        workload: &Workload,
        configuration: &Configuration,
        input: &Path,
        output: &Path,
    ) -> Result<Self, SessionError> {
        let mut command = workload.render(input, output);
        if let Some(launcher) = configuration.launcher() {
            command.ensure_wrappable(workload.name())?;
            command = command.wrap(launcher);
        }
        Ok(Self::new(workload.name(), configuration.name(), command)
            .with_working_dir(context.working_dir())
            .with_timeout(context.timeout())
            .with_artifacts(vec![output.to_path_buf()]))
    }

    /// Sets the working directory of the child.
    #[must_use]
    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = working_dir.into();
        self
    }

    /// Replaces the artifacts observed after the child exits.
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: Vec<PathBuf>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Sets the wall-clock budget.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the workload name.
    #[must_use]
    pub const fn workload(&self) -> &str {
        self.workload.as_str()
    }

    /// Returns the configuration name.
    #[must_use]
    pub const fn configuration(&self) -> &str {
        self.configuration.as_str()
    }

    /// Returns the command to spawn.
    #[must_use]
    pub const fn command(&self) -> &CommandLine {
        &self.command
    }

    /// Returns the working directory of the child.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Returns the artifacts observed after the child exits.
    #[must_use]
    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// Returns the wall-clock budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// How a child finished, as reported by an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Exit code and terminating signal.
    pub exit: ExitState,
    /// Wall time from spawn to reaping.
    pub elapsed: Duration,
}

impl Completion {
    /// Creates a completion.
    #[must_use]
    pub const fn new(exit: ExitState, elapsed: Duration) -> Self {
        Self { exit, elapsed }
    }
}

/// Trait abstracting child process execution for testability.
///
/// The production implementation is
/// [`SystemExecutor`](crate::process::SystemExecutor). Implementations must
/// block until the child has exited and must kill it once the invocation's
/// timeout elapses.
pub trait ProcessExecutor {
    /// Spawns the invocation's command and waits for it.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Launch`] when the program cannot be started,
    /// [`RunError::Timeout`] when it had to be killed and [`RunError::Wait`]
    /// when waiting for it failed.
    fn execute(&self, invocation: &Invocation) -> Result<Completion, RunError>;
}

/// What happens to observed artifacts once a run has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Leave artifacts for the caller to assert on.
    Preserve,
    /// Delete artifacts so the next sample starts from the same state.
    RemoveArtifacts,
}

/// Runs invocations one at a time through an executor.
#[derive(Debug)]
pub struct ProcessRunner<E> {
    executor: E,
}

impl<E> ProcessRunner<E> {
    /// Creates a runner around `executor`.
    #[must_use]
    pub const fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Returns the underlying executor.
    #[must_use]
    pub const fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: ProcessExecutor> ProcessRunner<E> {
    /// Executes an invocation and records its outcome.
    ///
    /// On timeout the invocation's artifacts are removed whatever the
    /// cleanup policy, so a partial output never leaks into the next run.
    ///
    /// # Errors
    ///
    /// Returns any executor error, or [`RunError::Cleanup`] when
    /// [`CleanupPolicy::RemoveArtifacts`] could not delete an artifact.
    pub fn run(
        &self,
        invocation: &Invocation,
        cleanup: CleanupPolicy,
    ) -> Result<RunRecord, RunError> {
        debug!(
            target: RUNNER_TARGET,
            workload = invocation.workload(),
            configuration = invocation.configuration(),
            command = %invocation.command(),
            "running invocation"
        );

        let completion = self.executor.execute(invocation).inspect_err(|err| {
            if err.is_timeout() {
                discard_partial_artifacts(invocation);
            }
        })?;

        let artifacts = invocation
            .artifacts()
            .iter()
            .map(|path| ArtifactObservation::observe(path))
            .collect();
        let record = RunRecord::new(
            invocation.workload(),
            invocation.configuration(),
            invocation.command().to_string(),
            completion.exit,
            completion.elapsed,
            artifacts,
        );

        debug!(
            target: RUNNER_TARGET,
            workload = record.workload(),
            configuration = record.configuration(),
            exit = %record.exit(),
            elapsed_ms = u64::try_from(record.elapsed().as_millis()).unwrap_or(u64::MAX),
            "invocation finished"
        );

        if cleanup == CleanupPolicy::RemoveArtifacts {
            remove_artifacts(invocation.artifacts())?;
        }
        Ok(record)
    }
}

/// Removes every existing artifact in `paths`.
///
/// # Errors
///
/// Returns [`RunError::Cleanup`] for the first artifact that exists but
/// cannot be removed.
pub fn remove_artifacts(paths: &[PathBuf]) -> Result<(), RunError> {
    for path in paths {
        remove_artifact(path).map_err(|source| RunError::Cleanup {
            path: path.clone(),
            source: Arc::new(source),
        })?;
    }
    Ok(())
}

fn remove_artifact(path: &Path) -> io::Result<()> {
    let outcome = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match outcome {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn discard_partial_artifacts(invocation: &Invocation) {
    if let Err(err) = remove_artifacts(invocation.artifacts()) {
        warn!(
            target: RUNNER_TARGET,
            workload = invocation.workload(),
            configuration = invocation.configuration(),
            error = %err,
            "failed to remove artifacts of a timed out invocation"
        );
    }
}

#[cfg(test)]
mod tests;
