//! Human-readable rendering of result views.

use sandbench_harness::{Cell, Comparison};
use unicode_width::UnicodeWidthStr;

use super::MISSING_CELL;
use super::models::{AggregateView, BenchmarkView, PhaseView, SuiteView};

const COLUMN_GAP: &str = "  ";
const INDENT: &str = "  ";

/// Rows of text cells laid out in columns sized by display width.
#[derive(Debug, Default)]
struct TextTable {
    rows: Vec<Vec<String>>,
}

impl TextTable {
    fn with_header(header: &[&str]) -> Self {
        Self {
            rows: vec![header.iter().map(|title| (*title).to_owned()).collect()],
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn column_widths(&self) -> Vec<usize> {
        let columns = self.rows.iter().map(Vec::len).max().unwrap_or_default();
        (0..columns)
            .map(|column| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(column))
                    .map(|cell| UnicodeWidthStr::width(cell.as_str()))
                    .max()
                    .unwrap_or_default()
            })
            .collect()
    }

    fn render_into(&self, lines: &mut Vec<String>, indent: &str) {
        let widths = self.column_widths();
        for row in &self.rows {
            let mut line = String::from(indent);
            for (cell, width) in row.iter().zip(&widths) {
                line.push_str(cell);
                let padding = width.saturating_sub(UnicodeWidthStr::width(cell.as_str()));
                line.push_str(&" ".repeat(padding));
                line.push_str(COLUMN_GAP);
            }
            lines.push(line.trim_end().to_owned());
        }
    }
}

const fn pass_fail(passed: bool) -> &'static str {
    if passed { "PASS" } else { "FAIL" }
}

fn finish(lines: &[String]) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn describe_artifacts(phase: &PhaseView) -> String {
    if phase.error.is_some() {
        return String::from("not observed");
    }
    if phase.artifacts.is_empty() {
        return String::from("none expected");
    }
    phase
        .artifacts
        .iter()
        .map(|artifact| {
            let state = if artifact.exists { "present" } else { "absent" };
            format!("{} ({state})", artifact.path)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders the security suite as one block per workload.
pub(crate) fn render_suite(view: &SuiteView) -> String {
    let mut lines = Vec::new();
    for workload in &view.workloads {
        lines.push(format!(
            "{} {}",
            pass_fail(workload.passed),
            workload.workload
        ));
        let mut table = TextTable::with_header(&[
            "phase",
            "configuration",
            "verdict",
            "expectation",
            "exit",
            "elapsed",
            "artifacts",
        ]);
        for phase in &workload.phases {
            table.push(vec![
                phase.phase.to_owned(),
                phase.configuration.clone(),
                phase.verdict.to_owned(),
                phase.expectation.unwrap_or("observe only").to_owned(),
                phase.error.clone().unwrap_or_else(|| phase.exit.clone()),
                phase
                    .elapsed_ms
                    .map_or_else(|| String::from(MISSING_CELL), |ms| format!("{ms} ms")),
                describe_artifacts(phase),
            ]);
        }
        table.render_into(&mut lines, INDENT);
        lines.extend(
            workload
                .phases
                .iter()
                .map(|phase| format!("{INDENT}{}: {}", phase.phase, phase.command)),
        );
        lines.push(String::new());
    }

    if !view.skipped.is_empty() {
        lines.push(format!(
            "Skipped (no security case): {}",
            view.skipped.join(", ")
        ));
    }
    if !view.failures.is_empty() {
        lines.push(String::from("Failures:"));
        lines.extend(view.failures.iter().map(|failure| {
            format!(
                "{INDENT}{}/{}: {} (`{}`, {}, artifacts: {})",
                failure.workload,
                failure.phase,
                failure.kind,
                failure.command,
                failure.exit,
                failure.artifacts
            )
        }));
    }
    lines.push(format!("Security suite: {}", pass_fail(view.passed)));
    finish(&lines)
}

/// Renders per-pair sampling progress.
pub(crate) fn render_benchmark(view: &BenchmarkView) -> String {
    let mut lines = Vec::new();
    let mut table = TextTable::with_header(&["workload", "configuration", "samples", "status"]);
    for pair in &view.pairs {
        table.push(vec![
            pair.workload.clone(),
            pair.configuration.clone(),
            format!("{}/{}", pair.completed, pair.requested),
            pass_fail(pair.completed == pair.requested).to_owned(),
        ]);
    }
    table.render_into(&mut lines, "");
    lines.extend(view.failures.iter().map(|failure| format!("error: {failure}")));
    lines.push(format!(
        "Wrote {} samples to {}",
        view.samples_written, view.log
    ));
    finish(&lines)
}

/// Renders the aggregate rows that were written.
pub(crate) fn render_aggregates(view: &AggregateView) -> String {
    let mut lines = Vec::new();
    let mut table =
        TextTable::with_header(&["workload", "configuration", "mean (ms)", "std (ms)"]);
    for record in &view.records {
        table.push(vec![
            record.workload().to_owned(),
            record.configuration().to_owned(),
            format!("{:.2}", record.mean()),
            format!("{:.2}", record.std()),
        ]);
    }
    table.render_into(&mut lines, "");
    lines.push(format!(
        "Wrote {} aggregate rows to {}",
        view.records.len(),
        view.destination
    ));
    finish(&lines)
}

fn render_cell(cell: &Cell) -> String {
    let Some(mean) = cell.mean else {
        return String::from(MISSING_CELL);
    };
    let spread = format!("{mean:.2} ± {:.2}", cell.std.unwrap_or_default());
    cell.percentage
        .as_ref()
        .map_or_else(|| spread.clone(), |percentage| format!("{spread} ({percentage})"))
}

/// Renders the comparison as a workload by configuration table of means.
pub(crate) fn render_comparison(comparison: &Comparison) -> String {
    let mut lines = vec![format!(
        "Mean wall time in ms against baseline '{}'",
        comparison.baseline
    )];
    let mut table = TextTable::default();
    let mut header = vec![String::from("workload")];
    header.extend(
        comparison
            .configurations
            .iter()
            .map(|configuration| configuration.label.clone()),
    );
    table.push(header);
    for row in &comparison.rows {
        let mut cells = vec![row.label.clone()];
        cells.extend(row.cells.iter().map(render_cell));
        table.push(cells);
    }
    table.render_into(&mut lines, "");
    lines.extend(
        comparison
            .missing
            .iter()
            .map(|missing| format!("warning: {missing}")),
    );
    finish(&lines)
}
