//! CLI argument definitions for the `sandbench` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sandbench_harness::DEFAULT_REPETITIONS;

use crate::output::OutputFormat;

/// Command-line interface for the sandbox regression and benchmark harness.
#[derive(Parser, Debug)]
#[command(name = "sandbench", disable_help_subcommand = true, version)]
pub(crate) struct Cli {
    /// Controls how results are rendered.
    #[arg(long, value_enum, default_value_t = OutputFormat::Auto, global = true)]
    pub(crate) output: OutputFormat,
    /// The operation to perform.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Operations offered by the harness.
#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CliCommand {
    /// Runs the three-phase security regression suite for every workload
    /// with a security case.
    RunSecuritySuite {
        /// Session file declaring workloads and configurations.
        #[arg(value_name = "SESSION")]
        session: PathBuf,
        /// Leaves phase artifacts on disk after classification.
        #[arg(long)]
        keep_artifacts: bool,
    },
    /// Samples wall-clock timings into a benchmark log.
    RunBenchmark {
        /// Session file declaring workloads and configurations.
        #[arg(value_name = "SESSION")]
        session: PathBuf,
        /// Comma-separated configuration names, e.g. `none,landlock`.
        #[arg(value_name = "CONFIGURATIONS")]
        configurations: String,
        /// Restricts sampling to the named workloads (repeatable).
        #[arg(long = "workload", value_name = "NAME")]
        workloads: Vec<String>,
        /// Samples taken per workload and configuration.
        #[arg(long, default_value_t = DEFAULT_REPETITIONS)]
        repetitions: u32,
        /// Benchmark log the samples are appended to.
        #[arg(long, value_name = "LOG")]
        out: PathBuf,
    },
    /// Collapses a benchmark log into per-pair mean and standard deviation.
    Aggregate {
        /// Benchmark log to read.
        #[arg(value_name = "LOG")]
        log: PathBuf,
        /// Destination of the aggregate table (default `<log stem>_agg.csv`).
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Compares every configuration against a baseline.
    Report {
        /// Aggregate table or raw benchmark log.
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        /// Configuration the others are compared against.
        #[arg(long, value_name = "NAME")]
        baseline: String,
        /// Session file supplying declaration order and display labels.
        #[arg(long, value_name = "FILE")]
        session: Option<PathBuf>,
    },
}

/// Splits a comma-separated configuration list, dropping empty entries.
pub(crate) fn parse_configuration_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}
