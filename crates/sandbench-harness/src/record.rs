//! Observed results of subject executions.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How a child process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitState {
    code: Option<i32>,
    signal: Option<i32>,
}

impl ExitState {
    /// A normal exit with the given status code.
    #[must_use]
    pub const fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Termination by the given signal number.
    #[must_use]
    pub const fn signalled(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// Builds the state from the raw parts reported by the platform.
    #[must_use]
    pub const fn from_parts(code: Option<i32>, signal: Option<i32>) -> Self {
        Self { code, signal }
    }

    /// Returns the exit code, if the process exited normally.
    #[must_use]
    pub const fn code(self) -> Option<i32> {
        self.code
    }

    /// Returns the terminating signal, if any.
    #[must_use]
    pub const fn signal(self) -> Option<i32> {
        self.signal
    }

    /// Returns true for a zero exit code without a signal.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!((self.code, self.signal), (Some(0), None))
    }

    /// Returns true for a nonzero exit code or a terminating signal.
    #[must_use]
    pub const fn is_abnormal(self) -> bool {
        !self.is_success()
    }
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (_, Some(signal)) => write!(f, "killed by signal {signal}"),
            (Some(code), None) => write!(f, "exit code {code}"),
            (None, None) => f.write_str("unknown exit status"),
        }
    }
}

/// Whether an expected artifact existed once the subject finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactObservation {
    path: PathBuf,
    exists: bool,
}

impl ArtifactObservation {
    /// Records the observed state of an artifact.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, exists: bool) -> Self {
        Self {
            path: path.into(),
            exists,
        }
    }

    /// Checks the filesystem for the artifact now.
    #[must_use]
    pub fn observe(path: &Path) -> Self {
        Self::new(path, path.exists())
    }

    /// Returns the artifact path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true when the artifact existed.
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.exists
    }
}

impl fmt::Display for ArtifactObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.exists { "present" } else { "absent" };
        write!(f, "{} ({state})", self.path.display())
    }
}

/// The result of one subject execution.
///
/// Records are created by the process runner and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    workload: String,
    configuration: String,
    command: String,
    exit: ExitState,
    elapsed: Duration,
    artifacts: Vec<ArtifactObservation>,
}

impl RunRecord {
    /// Creates a record for one (workload, configuration) execution.
    #[must_use]
    pub fn new(
        workload: impl Into<String>,
        configuration: impl Into<String>,
        command: impl Into<String>,
        exit: ExitState,
        elapsed: Duration,
        artifacts: Vec<ArtifactObservation>,
    ) -> Self {
        Self {
            workload: workload.into(),
            configuration: configuration.into(),
            command: command.into(),
            exit,
            elapsed,
            artifacts,
        }
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

    /// Returns the command line that was executed.
    #[must_use]
    pub const fn command(&self) -> &str {
        self.command.as_str()
    }

    /// Returns how the process terminated.
    #[must_use]
    pub const fn exit(&self) -> ExitState {
        self.exit
    }

    /// Returns the elapsed wall time.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Returns the observed artifacts.
    #[must_use]
    pub fn artifacts(&self) -> &[ArtifactObservation] {
        &self.artifacts
    }

    /// Returns true when every observed artifact exists.
    #[must_use]
    pub fn all_artifacts_present(&self) -> bool {
        self.artifacts.iter().all(ArtifactObservation::exists)
    }

    /// Returns true when any observed artifact exists.
    #[must_use]
    pub fn any_artifact_present(&self) -> bool {
        self.artifacts.iter().any(ArtifactObservation::exists)
    }
}
