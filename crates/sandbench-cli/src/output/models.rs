//! Serialisable views of harness results.

use std::path::Path;

use sandbench_harness::{
    AggregateRecord, BenchmarkSummary, PhaseReport, SuiteReport, UnexpectedVerdict,
    WorkloadReport,
};
use serde::Serialize;

/// Security suite outcome.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SuiteView {
    pub(crate) passed: bool,
    pub(crate) workloads: Vec<WorkloadView>,
    pub(crate) skipped: Vec<String>,
    pub(crate) failures: Vec<FailureView>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct WorkloadView {
    pub(crate) workload: String,
    pub(crate) passed: bool,
    pub(crate) phases: Vec<PhaseView>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PhaseView {
    pub(crate) phase: &'static str,
    pub(crate) configuration: String,
    pub(crate) command: String,
    /// `None` for an observed phase.
    pub(crate) expectation: Option<&'static str>,
    /// `observed` when no expectation was asserted.
    pub(crate) verdict: &'static str,
    pub(crate) passed: bool,
    pub(crate) exit_code: Option<i32>,
    pub(crate) signal: Option<i32>,
    pub(crate) exit: String,
    pub(crate) artifacts: Vec<ArtifactView>,
    pub(crate) elapsed_ms: Option<u64>,
    /// Runner failure, when no record was produced.
    pub(crate) error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ArtifactView {
    pub(crate) path: String,
    pub(crate) exists: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct FailureView {
    pub(crate) workload: String,
    pub(crate) phase: &'static str,
    pub(crate) kind: &'static str,
    pub(crate) command: String,
    pub(crate) exit: String,
    pub(crate) artifacts: String,
}

impl SuiteView {
    pub(crate) fn from_report(report: &SuiteReport) -> Self {
        Self {
            passed: report.passed(),
            workloads: report.workloads().iter().map(WorkloadView::from).collect(),
            skipped: report.skipped().to_vec(),
            failures: report.failures().iter().map(FailureView::from).collect(),
        }
    }
}

impl From<&WorkloadReport> for WorkloadView {
    fn from(report: &WorkloadReport) -> Self {
        Self {
            workload: report.workload().to_owned(),
            passed: report.passed(),
            phases: report.phases().iter().map(PhaseView::from).collect(),
        }
    }
}

impl From<&PhaseReport> for PhaseView {
    fn from(report: &PhaseReport) -> Self {
        let exit = report.exit();
        let (artifacts, elapsed_ms, error) = match report.outcome() {
            Ok(record) => (
                record
                    .artifacts()
                    .iter()
                    .map(|artifact| ArtifactView {
                        path: artifact.path().display().to_string(),
                        exists: artifact.exists(),
                    })
                    .collect(),
                u64::try_from(record.elapsed().as_millis()).ok(),
                None,
            ),
            Err(err) => (Vec::new(), None, Some(err.to_string())),
        };
        Self {
            phase: report.phase().as_str(),
            configuration: report.configuration().to_owned(),
            command: report.command().to_owned(),
            expectation: report.expectation().map(|expected| expected.as_str()),
            verdict: report
                .verdict()
                .map_or("observed", |verdict| verdict.as_str()),
            passed: report.passed(),
            exit_code: exit.and_then(|state| state.code()),
            signal: exit.and_then(|state| state.signal()),
            exit: exit.map_or_else(|| String::from("not run"), |state| state.to_string()),
            artifacts,
            elapsed_ms,
            error,
        }
    }
}

impl From<&UnexpectedVerdict> for FailureView {
    fn from(failure: &UnexpectedVerdict) -> Self {
        Self {
            workload: failure.workload.clone(),
            phase: failure.phase.as_str(),
            kind: failure.kind.as_str(),
            command: failure.command.clone(),
            exit: failure.exit.clone(),
            artifacts: failure.artifacts.clone(),
        }
    }
}

/// Benchmark sampler outcome.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct BenchmarkView {
    pub(crate) log: String,
    pub(crate) passed: bool,
    pub(crate) samples_written: u64,
    pub(crate) pairs: Vec<PairView>,
    pub(crate) failures: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PairView {
    pub(crate) workload: String,
    pub(crate) configuration: String,
    pub(crate) completed: u32,
    pub(crate) requested: u32,
}

impl BenchmarkView {
    pub(crate) fn new(log: &Path, summary: &BenchmarkSummary) -> Self {
        Self {
            log: log.display().to_string(),
            passed: summary.passed(),
            samples_written: summary.samples_written(),
            pairs: summary
                .pairs()
                .iter()
                .map(|pair| PairView {
                    workload: pair.workload.clone(),
                    configuration: pair.configuration.clone(),
                    completed: pair.completed,
                    requested: pair.requested,
                })
                .collect(),
            failures: summary
                .failures()
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Aggregation outcome.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AggregateView {
    pub(crate) destination: String,
    pub(crate) records: Vec<AggregateRecord>,
}

impl AggregateView {
    pub(crate) fn new(destination: &Path, records: Vec<AggregateRecord>) -> Self {
        Self {
            destination: destination.display().to_string(),
            records,
        }
    }
}
