//! Explicit per-session context shared by the suite and the sampler.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::SessionError;
use crate::session::Session;

/// Wall-clock budget applied to each invocation unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Where a session writes, where subjects run and how long they may take.
///
/// The context replaces any process-global output directory: every component
/// receives it explicitly, so two sessions with different contexts never
/// observe each other's artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    output_dir: PathBuf,
    working_dir: PathBuf,
    timeout: Duration,
    keep_artifacts: bool,
}

impl SessionContext {
    /// Creates a context writing under `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            working_dir: PathBuf::from("."),
            timeout: DEFAULT_TIMEOUT,
            keep_artifacts: false,
        }
    }

    /// Creates a context from a loaded session.
    ///
    /// Subjects run from the session file's directory so relative artifact
    /// paths resolve the same way the session's own paths did.
    #[must_use]
    pub fn for_session(session: &Session) -> Self {
        Self::new(session.output_dir()).with_working_dir(session.base_dir())
    }

    /// Sets the working directory of spawned subjects.
    #[must_use]
    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = working_dir.into();
        self
    }

    /// Sets the per-invocation timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Keeps security-phase artifacts after classification.
    #[must_use]
    pub const fn with_keep_artifacts(mut self, keep_artifacts: bool) -> Self {
        self.keep_artifacts = keep_artifacts;
        self
    }

    /// Returns the output root.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Returns the working directory of spawned subjects.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Returns the per-invocation timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns true when security-phase artifacts are kept.
    #[must_use]
    pub const fn keep_artifacts(&self) -> bool {
        self.keep_artifacts
    }

    /// Returns `<output_dir>/<workload>/<scenario>`.
    #[must_use]
    pub fn scenario_dir(&self, workload: &str, scenario: &str) -> PathBuf {
        self.output_dir.join(workload).join(scenario)
    }

    /// Returns `<output_dir>/<workload>/bench-<configuration>`.
    #[must_use]
    pub fn benchmark_dir(&self, workload: &str, configuration: &str) -> PathBuf {
        self.output_dir
            .join(workload)
            .join(format!("bench-{configuration}"))
    }

    /// Creates `dir` and its parents.
    ///
    /// The runner never creates directories itself, so the suite and the
    /// sampler call this before each scenario or pair.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::OutputDirectory`] when the directory cannot be
    /// created.
    pub fn prepare_dir(&self, dir: &Path) -> Result<(), SessionError> {
        fs::create_dir_all(dir).map_err(|source| SessionError::OutputDirectory {
            path: dir.to_path_buf(),
            source: Arc::new(source),
        })
    }
}
