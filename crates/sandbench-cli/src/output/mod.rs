//! Rendering of run results for humans and machines.
//!
//! Every command builds a serialisable view of its result. JSON output is the
//! view itself; human output is an aligned text rendering of the same view.

mod models;
mod render;

use std::io::Write;

use clap::ValueEnum;
use serde::Serialize;

use crate::AppError;

pub(crate) use models::{AggregateView, BenchmarkView, SuiteView};
pub(crate) use render::{render_aggregates, render_benchmark, render_comparison, render_suite};

/// Marker shown in place of a value with no samples.
pub(crate) const MISSING_CELL: &str = "—";

/// Output format selection for command results.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Selects `human` for terminal output and `json` for redirected output.
    #[default]
    Auto,
    /// Always render aligned text.
    Human,
    /// Always emit JSON.
    Json,
}

/// Output format after resolving `auto` based on TTY detection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResolvedOutputFormat {
    /// Aligned text.
    Human,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Resolves the output format based on whether stdout is a terminal.
    #[must_use]
    pub const fn resolve(self, stdout_is_terminal: bool) -> ResolvedOutputFormat {
        match self {
            Self::Auto if stdout_is_terminal => ResolvedOutputFormat::Human,
            Self::Auto | Self::Json => ResolvedOutputFormat::Json,
            Self::Human => ResolvedOutputFormat::Human,
        }
    }
}

/// Writes `view` to `writer` in the resolved format.
pub(crate) fn write_view<W, V>(
    writer: &mut W,
    format: ResolvedOutputFormat,
    view: &V,
    human: impl FnOnce(&V) -> String,
) -> Result<(), AppError>
where
    W: Write,
    V: Serialize,
{
    let text = match format {
        ResolvedOutputFormat::Human => human(view),
        ResolvedOutputFormat::Json => {
            serde_json::to_string_pretty(view).map_err(AppError::SerialiseOutput)?
        }
    };
    writeln!(writer, "{}", text.trim_end()).map_err(AppError::WriteOutput)?;
    writer.flush().map_err(AppError::WriteOutput)
}
