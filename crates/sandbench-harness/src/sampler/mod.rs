//! Repeated timing of (workload, configuration) pairs.
//!
//! A [`BenchmarkPlan`] fixes the cartesian set of pairs, the input of every
//! pair and the repetition count before anything runs. The
//! [`BenchmarkSampler`] then executes the plan strictly sequentially, one
//! invocation at a time, removing artifacts between repetitions and writing
//! one [`Sample`] per successful run to a [`SampleSink`].
//!
//! A failing repetition (launch error, timeout or abnormal exit) invalidates
//! the timings of its pair: the remaining repetitions of that pair are
//! skipped, the failure is collected and sampling continues with the next
//! pair.

use tracing::{info, warn};

use crate::benchlog::{Sample, SampleSink};
use crate::context::SessionContext;
use crate::error::{BenchmarkError, SamplerError, SessionError};
use crate::runner::{CleanupPolicy, Invocation, ProcessExecutor, ProcessRunner};
use crate::session::Session;

/// Tracing target for sampler operations.
const SAMPLER_TARGET: &str = "sandbench_harness::sampler";

/// Repetitions per pair when none are requested.
pub const DEFAULT_REPETITIONS: u32 = 50;

/// Completed repetitions between progress messages.
const PROGRESS_INTERVAL: u32 = 10;

/// A prepared (workload, configuration) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkPair {
    invocation: Invocation,
}

impl BenchmarkPair {
    /// Returns the workload name.
    #[must_use]
    pub const fn workload(&self) -> &str {
        self.invocation.workload()
    }

    /// Returns the configuration name.
    #[must_use]
    pub const fn configuration(&self) -> &str {
        self.invocation.configuration()
    }

    /// Returns the invocation repeated for this pair.
    #[must_use]
    pub const fn invocation(&self) -> &Invocation {
        &self.invocation
    }
}

/// The pairs to sample and how often.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkPlan {
    pairs: Vec<BenchmarkPair>,
    repetitions: u32,
}

impl BenchmarkPlan {
    /// Builds the plan for the selected configurations and workloads.
    ///
    /// An empty `workloads` selection means every declared workload. Pairs
    /// are ordered workload first, then configuration in selection order.
    /// Every repetition of a pair uses the workload's benchmark input.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ZeroRepetitions`],
    /// [`SessionError::EmptySelection`], an unknown workload or configuration
    /// name, a workload without a benchmark input, or a command that cannot
    /// be wrapped by its launcher.
    pub fn new(
        session: &Session,
        context: &SessionContext,
        configurations: &[String],
        workloads: &[String],
        repetitions: u32,
    ) -> Result<Self, SessionError> {
        if repetitions == 0 {
            return Err(SessionError::ZeroRepetitions);
        }
        if configurations.is_empty() {
            return Err(SessionError::EmptySelection);
        }
        let selected_configurations = configurations
            .iter()
            .map(|name| {
                session
                    .configuration(name)
                    .ok_or_else(|| SessionError::UnknownConfiguration { name: name.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let selected_workloads = if workloads.is_empty() {
            session.workloads().iter().collect::<Vec<_>>()
        } else {
            workloads
                .iter()
                .map(|name| {
                    session
                        .workload(name)
                        .ok_or_else(|| SessionError::UnknownWorkload { name: name.clone() })
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut pairs = Vec::new();
        for workload in selected_workloads {
            let input = workload
                .benchmark_input()
                .ok_or_else(|| SessionError::MissingBenchmarkInput {
                    workload: workload.name().to_owned(),
                })?;
            for configuration in &selected_configurations {
                let output = context
                    .benchmark_dir(workload.name(), configuration.name())
                    .join(workload.output());
                let invocation =
                    Invocation::prepare(context, workload, configuration, input, &output)?;
                pairs.push(BenchmarkPair { invocation });
            }
        }
        Ok(Self { pairs, repetitions })
    }

    /// Returns the pairs in execution order.
    #[must_use]
    pub fn pairs(&self) -> &[BenchmarkPair] {
        &self.pairs
    }

    /// Returns the repetitions per pair.
    #[must_use]
    pub const fn repetitions(&self) -> u32 {
        self.repetitions
    }
}

/// How far one pair got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairSummary {
    /// Workload name.
    pub workload: String,
    /// Configuration name.
    pub configuration: String,
    /// Samples written for the pair.
    pub completed: u32,
    /// Samples requested for the pair.
    pub requested: u32,
}

/// Result of a sampler run.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkSummary {
    pairs: Vec<PairSummary>,
    failures: Vec<BenchmarkError>,
}

impl BenchmarkSummary {
    /// Returns per-pair progress in execution order.
    #[must_use]
    pub fn pairs(&self) -> &[PairSummary] {
        &self.pairs
    }

    /// Returns the failures that ended a pair early.
    #[must_use]
    pub fn failures(&self) -> &[BenchmarkError] {
        &self.failures
    }

    /// Returns the total number of samples written.
    #[must_use]
    pub fn samples_written(&self) -> u64 {
        self.pairs.iter().map(|pair| u64::from(pair.completed)).sum()
    }

    /// Returns true when every pair completed all of its repetitions.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Executes benchmark plans through a process executor.
#[derive(Debug)]
pub struct BenchmarkSampler<E> {
    runner: ProcessRunner<E>,
    context: SessionContext,
}

impl<E> BenchmarkSampler<E> {
    /// Creates a sampler executing through `executor`.
    #[must_use]
    pub const fn new(executor: E, context: SessionContext) -> Self {
        Self {
            runner: ProcessRunner::new(executor),
            context,
        }
    }
}

impl<E: ProcessExecutor> BenchmarkSampler<E> {
    /// Runs every pair of the plan, writing samples to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::Session`] when an output directory cannot be
    /// prepared (before anything runs) and [`SamplerError::Log`] when a
    /// sample cannot be written. Failing repetitions are reported in the
    /// returned [`BenchmarkSummary`] instead.
    pub fn run(
        &self,
        plan: &BenchmarkPlan,
        sink: &mut impl SampleSink,
    ) -> Result<BenchmarkSummary, SamplerError> {
        for pair in plan.pairs() {
            let dir = self
                .context
                .benchmark_dir(pair.workload(), pair.configuration());
            self.context.prepare_dir(&dir)?;
        }

        let mut summary = BenchmarkSummary::default();
        for pair in plan.pairs() {
            let (completed, failure) = self.sample_pair(pair, plan.repetitions(), sink)?;
            summary.pairs.push(PairSummary {
                workload: pair.workload().to_owned(),
                configuration: pair.configuration().to_owned(),
                completed,
                requested: plan.repetitions(),
            });
            if let Some(err) = failure {
                warn!(
                    target: SAMPLER_TARGET,
                    workload = pair.workload(),
                    configuration = pair.configuration(),
                    completed,
                    error = %err,
                    "benchmark pair aborted"
                );
                summary.failures.push(err);
            }
        }
        info!(
            target: SAMPLER_TARGET,
            pairs = summary.pairs.len(),
            samples = summary.samples_written(),
            failures = summary.failures.len(),
            "benchmark finished"
        );
        Ok(summary)
    }

    fn sample_pair(
        &self,
        pair: &BenchmarkPair,
        repetitions: u32,
        sink: &mut impl SampleSink,
    ) -> Result<(u32, Option<BenchmarkError>), SamplerError> {
        info!(
            target: SAMPLER_TARGET,
            workload = pair.workload(),
            configuration = pair.configuration(),
            repetitions,
            "sampling pair"
        );
        let mut completed = 0;
        while completed < repetitions {
            let record = match self
                .runner
                .run(pair.invocation(), CleanupPolicy::RemoveArtifacts)
            {
                Ok(record) => record,
                Err(source) => {
                    return Ok((
                        completed,
                        Some(BenchmarkError::Run {
                            workload: pair.workload().to_owned(),
                            configuration: pair.configuration().to_owned(),
                            source,
                        }),
                    ));
                }
            };
            if !record.exit().is_success() {
                return Ok((
                    completed,
                    Some(BenchmarkError::AbnormalExit {
                        workload: pair.workload().to_owned(),
                        configuration: pair.configuration().to_owned(),
                        command: record.command().to_owned(),
                        exit: record.exit().to_string(),
                    }),
                ));
            }
            sink.record(&Sample::from_elapsed(
                record.workload(),
                record.configuration(),
                record.elapsed(),
            ))?;
            completed += 1;
            if completed.is_multiple_of(PROGRESS_INTERVAL) {
                info!(
                    target: SAMPLER_TARGET,
                    workload = pair.workload(),
                    configuration = pair.configuration(),
                    completed,
                    repetitions,
                    "benchmark progress"
                );
            }
        }
        Ok((completed, None))
    }
}
