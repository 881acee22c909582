//! Domain errors raised by the harness.
//!
//! All errors use `thiserror`-derived enums with structured context so callers
//! can inspect the failure programmatically. I/O errors are wrapped in `Arc`
//! to satisfy the `result_large_err` Clippy lint and to keep the records that
//! carry them cloneable.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

/// Failures of a single subject invocation.
///
/// These never escape the process runner as faults: the security suite turns
/// them into `unexpected` verdicts and the benchmark sampler into recorded
/// benchmark failures.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    /// The subject or launcher executable could not be started.
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        /// Rendered command line.
        command: String,
        /// Underlying spawn error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The invocation exceeded its wall-clock budget and was killed.
    #[error("`{command}` timed out after {timeout_secs}s and was killed")]
    Timeout {
        /// Rendered command line.
        command: String,
        /// Budget that was exceeded, in whole seconds.
        timeout_secs: u64,
    },

    /// Waiting for the child process failed.
    #[error("failed while waiting for `{command}`: {source}")]
    Wait {
        /// Rendered command line.
        command: String,
        /// Underlying wait error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Removing an artifact after a benchmark sample failed.
    #[error("failed to remove artifact {path}: {source}")]
    Cleanup {
        /// Artifact that could not be removed.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl RunError {
    /// Returns true when the invocation was killed for exceeding its budget.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Configuration errors detected before any process is launched.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The session file could not be read.
    #[error("failed to read session file {path}: {source}")]
    Read {
        /// Session file path.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The session document is not valid YAML for the session schema.
    #[error("failed to parse session: {message}")]
    Parse {
        /// Parser diagnostic.
        message: String,
    },

    /// No workloads were declared.
    #[error("the session declares no workloads")]
    NoWorkloads,

    /// No enforcement configurations were declared.
    #[error("the session declares no configurations")]
    NoConfigurations,

    /// Two workloads or two configurations share a name.
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName {
        /// Either `workload` or `configuration`.
        kind: &'static str,
        /// Offending name.
        name: String,
    },

    /// A name is empty or contains characters that would corrupt the log.
    #[error("invalid {kind} name '{name}': names must be non-empty and free of commas and line breaks")]
    InvalidName {
        /// Either `workload` or `configuration`.
        kind: &'static str,
        /// Offending name.
        name: String,
    },

    /// A launcher references a policy file that does not exist.
    #[error("policy file {path} for configuration '{configuration}' does not exist")]
    MissingPolicy {
        /// Configuration declaring the launcher.
        configuration: String,
        /// Missing policy path.
        path: PathBuf,
    },

    /// A wrapped command contains an argument the launcher cannot carry.
    #[error(
        "workload '{workload}' cannot be wrapped by a launcher: argument '{argument}' contains whitespace"
    )]
    UnwrappableArgument {
        /// Workload name.
        workload: String,
        /// Offending argument after placeholder substitution.
        argument: String,
    },

    /// A configuration name was referenced but never declared.
    #[error("unknown configuration '{name}'")]
    UnknownConfiguration {
        /// Name that was looked up.
        name: String,
    },

    /// A workload name was referenced but never declared.
    #[error("unknown workload '{name}'")]
    UnknownWorkload {
        /// Name that was looked up.
        name: String,
    },

    /// The protected phase must run under a launcher.
    #[error("workload '{workload}' protects its exploit with configuration '{configuration}', which has no launcher")]
    ProtectionWithoutLauncher {
        /// Workload name.
        workload: String,
        /// Configuration that lacks a launcher.
        configuration: String,
    },

    /// The protected phase must expect the exploit to be blocked.
    #[error("workload '{workload}' expects the protected exploit to succeed; use `no_artifact` or `abnormal`")]
    InvalidProtectedExpectation {
        /// Workload name.
        workload: String,
    },

    /// No workload declares a security case.
    #[error("no workload declares a security section")]
    NoSecurityCases,

    /// A benchmarked workload has no input to sample with.
    #[error("workload '{workload}' has neither a benchmark input nor a legitimate security input")]
    MissingBenchmarkInput {
        /// Workload name.
        workload: String,
    },

    /// The benchmark was asked for zero repetitions.
    #[error("the repetition count must be at least 1")]
    ZeroRepetitions,

    /// The benchmark selection is empty.
    #[error("the benchmark selects no configurations")]
    EmptySelection,

    /// An output directory could not be prepared.
    #[error("failed to prepare output directory {path}: {source}")]
    OutputDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: Arc<io::Error>,
    },
}

/// Errors raised while reading or writing benchmark tables.
#[derive(Debug, Clone, Error)]
pub enum LogError {
    /// Opening, reading or writing the table failed.
    #[error("I/O error on benchmark table {path}: {source}")]
    Io {
        /// Table path, or `-` for an anonymous stream.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The header row does not match any supported table layout.
    #[error("unexpected header '{found}' (expected '{expected}')")]
    Header {
        /// Header that was found.
        found: String,
        /// Header that was expected.
        expected: String,
    },

    /// A data row could not be parsed.
    #[error("line {line}: {message}")]
    Row {
        /// One-based line number.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// The table contains no header at all.
    #[error("benchmark table is empty")]
    Empty,

    /// A field value would corrupt the comma-separated layout.
    #[error("field '{value}' contains a comma or line break")]
    UnencodableField {
        /// Offending value.
        value: String,
    },
}

impl LogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

/// A benchmark sample that invalidated the timings of its pair.
#[derive(Debug, Clone, Error)]
pub enum BenchmarkError {
    /// The invocation itself failed (launch, timeout, wait or cleanup).
    #[error("benchmark {workload}/{configuration} failed: {source}")]
    Run {
        /// Workload name.
        workload: String,
        /// Configuration name.
        configuration: String,
        /// Underlying runner failure.
        #[source]
        source: RunError,
    },

    /// The subject finished but not successfully.
    #[error("benchmark {workload}/{configuration} exited abnormally ({exit}): `{command}`")]
    AbnormalExit {
        /// Workload name.
        workload: String,
        /// Configuration name.
        configuration: String,
        /// Rendered command line.
        command: String,
        /// Human-readable exit description.
        exit: String,
    },
}

/// Session-level failures that stop the benchmark sampler.
///
/// Individual samples never produce these: a failing sample only ends its
/// own pair and is reported as a [`BenchmarkError`].
#[derive(Debug, Clone, Error)]
pub enum SamplerError {
    /// The session could not be prepared for sampling.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A sample could not be persisted.
    #[error(transparent)]
    Log(#[from] LogError),
}

/// A declared (workload, configuration) pair without any samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("no samples recorded for workload '{workload}' under configuration '{configuration}'")]
pub struct AggregationError {
    /// Workload name.
    pub workload: String,
    /// Configuration name.
    pub configuration: String,
}

/// Errors raised while building a comparison report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    /// There is nothing to compare.
    #[error("no aggregate records to report")]
    Empty,

    /// The requested baseline does not appear in the data.
    #[error("baseline configuration '{baseline}' not found (available: {available})")]
    UnknownBaseline {
        /// Requested baseline.
        baseline: String,
        /// Comma-separated configuration names present in the data.
        available: String,
    },
}
