//! Three-phase security regression suite.
//!
//! Every workload with a security case is driven through the same ordered
//! scenario list:
//!
//! 1. [`Phase::Baseline`]: the legitimate input without enforcement must
//!    succeed and produce its artifact.
//! 2. [`Phase::ExploitUnprotected`]: the exploit input without enforcement is
//!    either asserted against a configured expectation or only observed.
//! 3. [`Phase::ExploitProtected`]: the exploit input under the enforcement
//!    launcher must not produce its artifact (or must terminate abnormally).
//!
//! All scenarios are built, and their directories prepared, before the first
//! process is launched, so session mistakes are reported up front. Once
//! running, a failing phase is recorded and the suite moves on; the overall
//! result is the conjunction of every asserted phase.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::classify::{ExpectedOutcome, Verdict, classify_outcome};
use crate::context::SessionContext;
use crate::error::{RunError, SessionError};
use crate::record::{ArtifactObservation, ExitState, RunRecord};
use crate::runner::{CleanupPolicy, Invocation, ProcessExecutor, ProcessRunner, remove_artifacts};
use crate::session::{Session, Workload};

/// Tracing target for suite operations.
const SUITE_TARGET: &str = "sandbench_harness::suite";

/// One step of the per-workload security state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Legitimate input, no enforcement.
    Baseline,
    /// Exploit input, no enforcement.
    ExploitUnprotected,
    /// Exploit input under the enforcement launcher.
    ExploitProtected,
}

impl Phase {
    /// Phases in execution order.
    pub const ALL: [Self; 3] = [
        Self::Baseline,
        Self::ExploitUnprotected,
        Self::ExploitProtected,
    ];

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::ExploitUnprotected => "exploit-unprotected",
            Self::ExploitProtected => "exploit-protected",
        }
    }

    /// Returns the failure category reported when this phase is unexpected.
    #[must_use]
    pub const fn failure_kind(self) -> FailureKind {
        match self {
            Self::Baseline => FailureKind::WorkloadBroken,
            Self::ExploitUnprotected => FailureKind::ExploitNotReproduced,
            Self::ExploitProtected => FailureKind::SandboxEscape,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a workload failed the suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The legitimate run failed, independently of any sandbox.
    WorkloadBroken,
    /// The unprotected exploit did not behave as configured.
    ExploitNotReproduced,
    /// The exploit was not stopped by the enforcement launcher.
    SandboxEscape,
}

impl FailureKind {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WorkloadBroken => "workload broken",
            Self::ExploitNotReproduced => "exploit not reproduced",
            Self::SandboxEscape => "sandbox escape",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prepared phase: what to run and what to expect of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    phase: Phase,
    invocation: Invocation,
    expectation: Option<ExpectedOutcome>,
}

impl Scenario {
    /// Returns the phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the invocation to execute.
    #[must_use]
    pub const fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    /// Returns the asserted outcome, or `None` when the phase is observed.
    #[must_use]
    pub const fn expectation(&self) -> Option<ExpectedOutcome> {
        self.expectation
    }
}

/// Builds the ordered scenario list for one workload.
///
/// Returns an empty list for workloads without a security case.
///
/// # Errors
///
/// Returns a [`SessionError`] when the protecting configuration cannot be
/// resolved or the protected command cannot be wrapped.
pub fn scenarios(
    session: &Session,
    context: &SessionContext,
    workload: &Workload,
) -> Result<Vec<Scenario>, SessionError> {
    let Some(security) = workload.security() else {
        return Ok(Vec::new());
    };
    let unsandboxed = session.unsandboxed_configuration();
    let protecting = session.protecting_configuration(workload)?;

    let baseline_dir = context.scenario_dir(workload.name(), Phase::Baseline.as_str());
    let baseline_output = baseline_dir.join(workload.output());
    let baseline = Invocation::prepare(
        context,
        workload,
        &unsandboxed,
        &security.legitimate.input,
        &baseline_output,
    )?
    .with_artifacts(vec![artifact_or(
        security.legitimate.artifact.as_deref(),
        &baseline_output,
    )]);

    let exploit_dir = context.scenario_dir(workload.name(), Phase::ExploitUnprotected.as_str());
    let exploit_output = exploit_dir.join(workload.output());
    let exploit = Invocation::prepare(
        context,
        workload,
        &unsandboxed,
        &security.exploit.input,
        &exploit_output,
    )?
    .with_artifacts(vec![artifact_or(
        security.exploit.artifact.as_deref(),
        &exploit_output,
    )]);

    let protected_dir = context.scenario_dir(workload.name(), Phase::ExploitProtected.as_str());
    let protected_output = protected_dir.join(workload.output());
    let protected_input = security
        .protected
        .input
        .as_deref()
        .unwrap_or(&security.exploit.input);
    let protected = Invocation::prepare(
        context,
        workload,
        protecting,
        protected_input,
        &protected_output,
    )?
    .with_artifacts(vec![artifact_or(
        security.protected.artifact.as_deref(),
        &protected_output,
    )]);

    Ok(vec![
        Scenario {
            phase: Phase::Baseline,
            invocation: baseline,
            expectation: Some(ExpectedOutcome::MustSucceedWithArtifact),
        },
        Scenario {
            phase: Phase::ExploitUnprotected,
            invocation: exploit,
            expectation: security.exploit.expect,
        },
        Scenario {
            phase: Phase::ExploitProtected,
            invocation: protected,
            expectation: Some(security.protected.expect),
        },
    ])
}

fn artifact_or(artifact: Option<&Path>, output: &Path) -> PathBuf {
    artifact.unwrap_or(output).to_path_buf()
}

/// An asserted phase that did not match its expectation.
#[derive(Debug, Clone, Error)]
#[error("{workload}/{phase}: {kind} (`{command}`, {exit}, artifacts: {artifacts})")]
pub struct UnexpectedVerdict {
    /// Workload name.
    pub workload: String,
    /// Failing phase.
    pub phase: Phase,
    /// Failure category derived from the phase.
    pub kind: FailureKind,
    /// Command line that was executed.
    pub command: String,
    /// Exit description, or the runner error when no record was produced.
    pub exit: String,
    /// Observed artifact state.
    pub artifacts: String,
}

/// The outcome of one phase.
#[derive(Debug, Clone)]
pub struct PhaseReport {
    phase: Phase,
    configuration: String,
    command: String,
    expectation: Option<ExpectedOutcome>,
    verdict: Option<Verdict>,
    outcome: Result<RunRecord, RunError>,
}

impl PhaseReport {
    /// Returns the phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the configuration the phase ran under.
    #[must_use]
    pub const fn configuration(&self) -> &str {
        self.configuration.as_str()
    }

    /// Returns the executed command line.
    #[must_use]
    pub const fn command(&self) -> &str {
        self.command.as_str()
    }

    /// Returns the asserted outcome, or `None` when the phase was observed.
    #[must_use]
    pub const fn expectation(&self) -> Option<ExpectedOutcome> {
        self.expectation
    }

    /// Returns the verdict, or `None` when the phase was only observed.
    #[must_use]
    pub const fn verdict(&self) -> Option<Verdict> {
        self.verdict
    }

    /// Returns the captured record or the runner failure.
    #[must_use]
    pub const fn outcome(&self) -> &Result<RunRecord, RunError> {
        &self.outcome
    }

    /// Returns true unless an asserted phase was unexpected.
    #[must_use]
    pub fn passed(&self) -> bool {
        !self.verdict.is_some_and(Verdict::is_unexpected)
    }

    /// Returns the exit state, when the run produced a record.
    #[must_use]
    pub fn exit(&self) -> Option<ExitState> {
        self.outcome.as_ref().ok().map(RunRecord::exit)
    }

    fn describe_exit(&self) -> String {
        match &self.outcome {
            Ok(record) => record.exit().to_string(),
            Err(err) => err.to_string(),
        }
    }

    fn describe_artifacts(&self) -> String {
        match &self.outcome {
            Ok(record) if !record.artifacts().is_empty() => record
                .artifacts()
                .iter()
                .map(ArtifactObservation::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            Ok(_) => String::from("none expected"),
            Err(_) => String::from("not observed"),
        }
    }

    fn failure(&self, workload: &str) -> Option<UnexpectedVerdict> {
        (!self.passed()).then(|| UnexpectedVerdict {
            workload: workload.to_owned(),
            phase: self.phase,
            kind: self.phase.failure_kind(),
            command: self.command.clone(),
            exit: self.describe_exit(),
            artifacts: self.describe_artifacts(),
        })
    }
}

/// The phases of one workload, in execution order.
#[derive(Debug, Clone)]
pub struct WorkloadReport {
    workload: String,
    phases: Vec<PhaseReport>,
}

impl WorkloadReport {
    /// Returns the workload name.
    #[must_use]
    pub const fn workload(&self) -> &str {
        self.workload.as_str()
    }

    /// Returns the phase reports in execution order.
    #[must_use]
    pub fn phases(&self) -> &[PhaseReport] {
        &self.phases
    }

    /// Returns true when every asserted phase matched its expectation.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.phases.iter().all(PhaseReport::passed)
    }

    /// Returns the unexpected verdicts of this workload.
    #[must_use]
    pub fn failures(&self) -> Vec<UnexpectedVerdict> {
        self.phases
            .iter()
            .filter_map(|phase| phase.failure(&self.workload))
            .collect()
    }
}

/// Result of a full suite run.
#[derive(Debug, Clone, Default)]
pub struct SuiteReport {
    workloads: Vec<WorkloadReport>,
    skipped: Vec<String>,
}

impl SuiteReport {
    /// Returns the per-workload reports in declaration order.
    #[must_use]
    pub fn workloads(&self) -> &[WorkloadReport] {
        &self.workloads
    }

    /// Returns the workloads that declare no security case.
    #[must_use]
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Returns true when no asserted phase was unexpected.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.workloads.iter().all(WorkloadReport::passed)
    }

    /// Returns every unexpected verdict of the run.
    #[must_use]
    pub fn failures(&self) -> Vec<UnexpectedVerdict> {
        self.workloads
            .iter()
            .flat_map(WorkloadReport::failures)
            .collect()
    }
}

/// Runs the security scenarios of a session through a process executor.
#[derive(Debug)]
pub struct SecuritySuite<E> {
    runner: ProcessRunner<E>,
    context: SessionContext,
}

impl<E> SecuritySuite<E> {
    /// Creates a suite executing through `executor`.
    #[must_use]
    pub const fn new(executor: E, context: SessionContext) -> Self {
        Self {
            runner: ProcessRunner::new(executor),
            context,
        }
    }

    /// Returns the session context.
    #[must_use]
    pub const fn context(&self) -> &SessionContext {
        &self.context
    }
}

impl<E: ProcessExecutor> SecuritySuite<E> {
    /// Runs every workload's phases in declaration order.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] only for problems detected before the
    /// first launch: no workload declares a security case, a scenario cannot
    /// be built, or a phase directory cannot be created. Failures of the runs
    /// themselves are part of the returned [`SuiteReport`].
    pub fn run(&self, session: &Session) -> Result<SuiteReport, SessionError> {
        let mut planned = Vec::new();
        let mut skipped = Vec::new();
        for workload in session.workloads() {
            let workload_scenarios = scenarios(session, &self.context, workload)?;
            if workload_scenarios.is_empty() {
                skipped.push(workload.name().to_owned());
                continue;
            }
            for scenario in &workload_scenarios {
                let dir = self
                    .context
                    .scenario_dir(workload.name(), scenario.phase.as_str());
                self.context.prepare_dir(&dir)?;
            }
            planned.push((workload.name(), workload_scenarios));
        }
        if planned.is_empty() {
            return Err(SessionError::NoSecurityCases);
        }

        let workloads = planned
            .into_iter()
            .map(|(name, workload_scenarios)| self.run_workload(name, &workload_scenarios))
            .collect();
        let report = SuiteReport { workloads, skipped };
        info!(
            target: SUITE_TARGET,
            workloads = report.workloads.len(),
            failures = report.failures().len(),
            passed = report.passed(),
            "security suite finished"
        );
        Ok(report)
    }

    fn run_workload(&self, workload: &str, workload_scenarios: &[Scenario]) -> WorkloadReport {
        let phases = workload_scenarios
            .iter()
            .map(|scenario| self.run_scenario(scenario))
            .collect();
        let report = WorkloadReport {
            workload: workload.to_owned(),
            phases,
        };
        info!(
            target: SUITE_TARGET,
            workload,
            passed = report.passed(),
            "workload security phases finished"
        );
        report
    }

    fn run_scenario(&self, scenario: &Scenario) -> PhaseReport {
        let invocation = &scenario.invocation;
        clear_stale_artifacts(invocation);

        let outcome = self.runner.run(invocation, CleanupPolicy::Preserve);
        let verdict = scenario
            .expectation
            .map(|expected| classify_outcome(&outcome, expected));

        match verdict {
            Some(Verdict::Unexpected) => warn!(
                target: SUITE_TARGET,
                workload = invocation.workload(),
                phase = scenario.phase.as_str(),
                kind = scenario.phase.failure_kind().as_str(),
                command = %invocation.command(),
                "phase verdict unexpected"
            ),
            Some(found) => info!(
                target: SUITE_TARGET,
                workload = invocation.workload(),
                phase = scenario.phase.as_str(),
                verdict = found.as_str(),
                "phase passed"
            ),
            None => {
                let observed = outcome
                    .as_ref()
                    .map_or_else(ToString::to_string, |record| record.exit().to_string());
                info!(
                    target: SUITE_TARGET,
                    workload = invocation.workload(),
                    phase = scenario.phase.as_str(),
                    exit = %observed,
                    "phase observed"
                );
            }
        }

        if !self.context.keep_artifacts()
            && let Err(err) = remove_artifacts(invocation.artifacts())
        {
            warn!(
                target: SUITE_TARGET,
                workload = invocation.workload(),
                phase = scenario.phase.as_str(),
                error = %err,
                "failed to remove phase artifacts"
            );
        }

        PhaseReport {
            phase: scenario.phase,
            configuration: invocation.configuration().to_owned(),
            command: invocation.command().to_string(),
            expectation: scenario.expectation,
            verdict,
            outcome,
        }
    }
}

fn clear_stale_artifacts(invocation: &Invocation) {
    let stale: Vec<PathBuf> = invocation
        .artifacts()
        .iter()
        .filter(|path| path.exists())
        .cloned()
        .collect();
    if stale.is_empty() {
        return;
    }
    warn!(
        target: SUITE_TARGET,
        workload = invocation.workload(),
        artifacts = ?stale,
        "removing stale artifacts left by an earlier run"
    );
    if let Err(err) = remove_artifacts(&stale) {
        warn!(
            target: SUITE_TARGET,
            workload = invocation.workload(),
            error = %err,
            "failed to remove stale artifacts"
        );
    }
}
