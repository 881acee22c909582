//! Execution of the parsed subcommands against the harness.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use sandbench_config::Config;
use sandbench_harness::{
    BenchmarkLog, BenchmarkPlan, BenchmarkSampler, DeclarationOrder, SecuritySuite, Session,
    SessionContext, SystemExecutor, Table, aggregate, compare, default_aggregate_path,
    read_samples, read_table, save_aggregates,
};
use tracing::{info, warn};

use crate::AppError;
use crate::cli::{CliCommand, parse_configuration_list};
use crate::output::{
    AggregateView, BenchmarkView, ResolvedOutputFormat, SuiteView, render_aggregates,
    render_benchmark, render_comparison, render_suite, write_view,
};

const COMMANDS_TARGET: &str = "sandbench_cli::commands";

/// Verdict of a command that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunOutcome {
    Passed,
    Failed,
}

impl RunOutcome {
    const fn from_passed(passed: bool) -> Self {
        if passed { Self::Passed } else { Self::Failed }
    }

    pub(crate) const fn exit_code(self) -> ExitCode {
        match self {
            Self::Passed => ExitCode::SUCCESS,
            Self::Failed => ExitCode::FAILURE,
        }
    }
}

/// Shared state handed to every subcommand.
pub(crate) struct CommandContext<'a, W: Write> {
    pub(crate) config: &'a Config,
    pub(crate) format: ResolvedOutputFormat,
    pub(crate) stdout: &'a mut W,
}

pub(crate) fn execute<W: Write>(
    command: CliCommand,
    context: &mut CommandContext<'_, W>,
) -> Result<RunOutcome, AppError> {
    match command {
        CliCommand::RunSecuritySuite {
            session,
            keep_artifacts,
        } => run_security_suite(context, &session, keep_artifacts),
        CliCommand::RunBenchmark {
            session,
            configurations,
            workloads,
            repetitions,
            out,
        } => run_benchmark(
            context,
            &BenchmarkRequest {
                session,
                configurations: parse_configuration_list(&configurations),
                workloads,
                repetitions,
                out,
            },
        ),
        CliCommand::Aggregate { log, out } => run_aggregate(context, &log, out),
        CliCommand::Report {
            input,
            baseline,
            session,
        } => run_report(context, &input, &baseline, session.as_deref()),
    }
}

fn session_context(session: &Session, config: &Config) -> SessionContext {
    SessionContext::for_session(session).with_timeout(config.timeout())
}

fn run_security_suite<W: Write>(
    context: &mut CommandContext<'_, W>,
    session_path: &Path,
    keep_artifacts: bool,
) -> Result<RunOutcome, AppError> {
    let session = Session::load(session_path)?;
    let suite_context =
        session_context(&session, context.config).with_keep_artifacts(keep_artifacts);
    info!(
        target: COMMANDS_TARGET,
        session = %session_path.display(),
        workloads = session.workloads().len(),
        "running security suite"
    );
    let report = SecuritySuite::new(SystemExecutor, suite_context).run(&session)?;
    write_view(
        context.stdout,
        context.format,
        &SuiteView::from_report(&report),
        render_suite,
    )?;
    Ok(RunOutcome::from_passed(report.passed()))
}

struct BenchmarkRequest {
    session: PathBuf,
    configurations: Vec<String>,
    workloads: Vec<String>,
    repetitions: u32,
    out: PathBuf,
}

fn run_benchmark<W: Write>(
    context: &mut CommandContext<'_, W>,
    request: &BenchmarkRequest,
) -> Result<RunOutcome, AppError> {
    let session = Session::load(&request.session)?;
    let sampler_context = session_context(&session, context.config);
    let plan = BenchmarkPlan::new(
        &session,
        &sampler_context,
        &request.configurations,
        &request.workloads,
        request.repetitions,
    )?;
    let mut log = BenchmarkLog::open(&request.out)?;
    info!(
        target: COMMANDS_TARGET,
        log = %request.out.display(),
        pairs = plan.pairs().len(),
        repetitions = plan.repetitions(),
        "sampling benchmark"
    );
    let summary = BenchmarkSampler::new(SystemExecutor, sampler_context).run(&plan, &mut log)?;
    write_view(
        context.stdout,
        context.format,
        &BenchmarkView::new(&request.out, &summary),
        render_benchmark,
    )?;
    Ok(RunOutcome::from_passed(summary.passed()))
}

fn run_aggregate<W: Write>(
    context: &mut CommandContext<'_, W>,
    log: &Path,
    out: Option<PathBuf>,
) -> Result<RunOutcome, AppError> {
    let samples = read_samples(log)?;
    let records = aggregate(&samples);
    let destination = out.unwrap_or_else(|| default_aggregate_path(log));
    save_aggregates(&destination, &records)?;
    info!(
        target: COMMANDS_TARGET,
        samples = samples.len(),
        groups = records.len(),
        destination = %destination.display(),
        "aggregated benchmark log"
    );
    write_view(
        context.stdout,
        context.format,
        &AggregateView::new(&destination, records),
        render_aggregates,
    )?;
    Ok(RunOutcome::Passed)
}

fn run_report<W: Write>(
    context: &mut CommandContext<'_, W>,
    input: &Path,
    baseline: &str,
    session: Option<&Path>,
) -> Result<RunOutcome, AppError> {
    let records = match read_table(input)? {
        Table::Aggregates(records) => records,
        Table::Samples(samples) => aggregate(&samples),
    };
    let order = match session {
        Some(path) => DeclarationOrder::from_session(&Session::load(path)?),
        None => DeclarationOrder::default(),
    };
    let comparison = compare(&records, baseline, &order)?;
    for missing in &comparison.missing {
        warn!(
            target: COMMANDS_TARGET,
            workload = %missing.workload,
            configuration = %missing.configuration,
            "no samples for declared cell"
        );
    }
    write_view(
        context.stdout,
        context.format,
        &comparison,
        render_comparison,
    )?;
    Ok(RunOutcome::Passed)
}
