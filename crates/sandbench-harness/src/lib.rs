//! Security regression and overhead measurement harness for sandboxed
//! media-processing workloads.
//!
//! The crate treats both the enforcement launcher and the media tools under
//! test as opaque child processes. Everything it knows about a run comes
//! from the exit status and the files the run left behind.
//!
//! # Architecture
//!
//! - [`session`] declares workloads, enforcement configurations and the
//!   security case of each workload, loaded from YAML and validated before
//!   anything runs.
//! - [`runner`] is the single place that launches subjects. It turns an
//!   [`Invocation`] into an immutable [`RunRecord`] through a
//!   [`ProcessExecutor`]; [`process::SystemExecutor`] is the host
//!   implementation.
//! - [`classify`] maps a record and an [`ExpectedOutcome`] to a [`Verdict`].
//! - [`suite`] drives each workload through the baseline, unprotected
//!   exploit and protected exploit phases.
//! - [`sampler`] times repeated runs of (workload, configuration) pairs into
//!   a [`SampleSink`], normally the append-only [`BenchmarkLog`].
//! - [`aggregate`] and [`report`] reduce samples to per-group statistics and
//!   compare configurations against a baseline.
//!
//! Execution is strictly sequential: one child process at a time, so timings
//! are not skewed by contention and artifacts are observed unambiguously.
//! The harness targets Unix hosts; it relies on process groups and
//! terminating signals.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use sandbench_harness::{SecuritySuite, Session, SessionContext, SystemExecutor};
//!
//! let session = Session::load(Path::new("session.yaml"))?;
//! let suite = SecuritySuite::new(SystemExecutor, SessionContext::for_session(&session));
//! let report = suite.run(&session)?;
//! assert!(report.passed());
//! # Ok::<(), sandbench_harness::SessionError>(())
//! ```

pub mod aggregate;
pub mod benchlog;
pub mod classify;
pub mod context;
pub mod error;
pub mod process;
pub mod record;
pub mod report;
pub mod runner;
pub mod sampler;
pub mod session;
pub mod suite;

#[cfg(test)]
mod tests;

pub use self::aggregate::{AggregateRecord, aggregate};
pub use self::benchlog::{
    AGGREGATE_HEADER, BenchmarkLog, SAMPLE_HEADER, Sample, SampleSink, Table,
    default_aggregate_path, read_samples, read_table, save_aggregates, write_aggregates,
};
pub use self::classify::{ExpectedOutcome, Verdict, classify, classify_outcome};
pub use self::context::{DEFAULT_TIMEOUT, SessionContext};
pub use self::error::{
    AggregationError, BenchmarkError, LogError, ReportError, RunError, SamplerError, SessionError,
};
pub use self::process::SystemExecutor;
pub use self::record::{ArtifactObservation, ExitState, RunRecord};
pub use self::report::{
    Cell, Comparison, ComparisonRow, DeclarationOrder, Labelled, compare, percentage_label,
};
pub use self::runner::{CleanupPolicy, Completion, Invocation, ProcessExecutor, ProcessRunner};
pub use self::sampler::{
    BenchmarkPlan, BenchmarkSampler, BenchmarkSummary, DEFAULT_REPETITIONS, PairSummary,
};
pub use self::session::{CommandLine, Configuration, Launcher, Session, Workload};
pub use self::suite::{
    FailureKind, Phase, PhaseReport, SecuritySuite, SuiteReport, UnexpectedVerdict,
    WorkloadReport,
};
