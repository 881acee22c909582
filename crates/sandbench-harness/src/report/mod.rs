//! Comparison of configurations against a baseline.
//!
//! [`compare`] turns aggregate records into one [`ComparisonRow`] per
//! workload, each holding one [`Cell`] per configuration. Workloads and
//! configurations follow a [`DeclarationOrder`], normally taken from the
//! session; anything present in the data but not declared is appended in
//! order of first appearance. Every non-baseline cell carries a relative
//! percentage label computed by [`percentage_label`]; the baseline cell
//! carries none. Declared cells without data are kept as missing cells and
//! reported as [`AggregationError`]s.
//!
//! Rendering the rows is left to the caller.

use std::collections::HashMap;

use serde::Serialize;

use crate::aggregate::AggregateRecord;
use crate::error::{AggregationError, ReportError};
use crate::session::Session;

/// A name with its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Labelled {
    /// Stable identifier.
    pub name: String,
    /// Display label.
    pub label: String,
}

impl Labelled {
    fn plain(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            label: name.to_owned(),
        }
    }
}

/// Order and labels of the workloads and configurations in a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclarationOrder {
    workloads: Vec<Labelled>,
    configurations: Vec<Labelled>,
}

impl DeclarationOrder {
    /// Takes order and labels from a session's declarations.
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            workloads: session
                .workloads()
                .iter()
                .map(|workload| Labelled {
                    name: workload.name().to_owned(),
                    label: workload.label().to_owned(),
                })
                .collect(),
            configurations: session
                .configurations()
                .iter()
                .map(|configuration| Labelled {
                    name: configuration.name().to_owned(),
                    label: configuration.label().to_owned(),
                })
                .collect(),
        }
    }

    /// Returns the declared workloads.
    #[must_use]
    pub fn workloads(&self) -> &[Labelled] {
        &self.workloads
    }

    /// Returns the declared configurations.
    #[must_use]
    pub fn configurations(&self) -> &[Labelled] {
        &self.configurations
    }

    /// Appends names seen in `records` that are not declared yet.
    fn extended_with(&self, records: &[AggregateRecord]) -> Self {
        let mut order = self.clone();
        for record in records {
            push_unique(&mut order.workloads, record.workload());
            push_unique(&mut order.configurations, record.configuration());
        }
        order
    }
}

fn push_unique(entries: &mut Vec<Labelled>, name: &str) {
    if !entries.iter().any(|entry| entry.name == name) {
        entries.push(Labelled::plain(name));
    }
}

/// One configuration of one workload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    /// Configuration name.
    pub configuration: String,
    /// Mean elapsed time in milliseconds, or `None` when no samples exist.
    pub mean: Option<f64>,
    /// Standard deviation in milliseconds, or `None` when no samples exist.
    pub std: Option<f64>,
    /// Relative deviation from the baseline, e.g. `+27.3%`.
    ///
    /// Always `None` for the baseline itself and for missing cells.
    pub percentage: Option<String>,
}

impl Cell {
    /// Returns true when the cell has no samples.
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        self.mean.is_none()
    }
}

/// All configurations of one workload, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    /// Workload name.
    pub workload: String,
    /// Workload display label.
    pub label: String,
    /// Cells in configuration order.
    pub cells: Vec<Cell>,
}

/// The full comparison against one baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// Baseline configuration name.
    pub baseline: String,
    /// Configuration columns in order.
    pub configurations: Vec<Labelled>,
    /// Rows in workload order.
    pub rows: Vec<ComparisonRow>,
    /// Declared cells without samples.
    pub missing: Vec<AggregationError>,
}

impl Comparison {
    /// Returns true when every declared cell has samples.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Builds the comparison of every configuration against `baseline`.
///
/// # Errors
///
/// Returns [`ReportError::Empty`] when there are no records and
/// [`ReportError::UnknownBaseline`] when `baseline` is neither declared nor
/// present in the data.
pub fn compare(
    records: &[AggregateRecord],
    baseline: &str,
    order: &DeclarationOrder,
) -> Result<Comparison, ReportError> {
    if records.is_empty() {
        return Err(ReportError::Empty);
    }
    let full_order = order.extended_with(records);
    if !full_order
        .configurations
        .iter()
        .any(|configuration| configuration.name == baseline)
    {
        return Err(ReportError::UnknownBaseline {
            baseline: baseline.to_owned(),
            available: full_order
                .configurations
                .iter()
                .map(|configuration| configuration.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    let index: HashMap<(&str, &str), &AggregateRecord> = records
        .iter()
        .map(|record| ((record.workload(), record.configuration()), record))
        .collect();

    let mut missing = Vec::new();
    let rows = full_order
        .workloads
        .iter()
        .map(|workload| {
            let baseline_mean = index
                .get(&(workload.name.as_str(), baseline))
                .map(|record| record.mean());
            let cells = full_order
                .configurations
                .iter()
                .map(|configuration| {
                    let found = index.get(&(workload.name.as_str(), configuration.name.as_str()));
                    if found.is_none() {
                        missing.push(AggregationError {
                            workload: workload.name.clone(),
                            configuration: configuration.name.clone(),
                        });
                    }
                    let mean = found.map(|record| record.mean());
                    let percentage = if configuration.name == baseline {
                        None
                    } else {
                        mean.zip(baseline_mean)
                            .and_then(|(value, reference)| percentage_label(value, reference))
                    };
                    Cell {
                        configuration: configuration.name.clone(),
                        mean,
                        std: found.map(|record| record.std()),
                        percentage,
                    }
                })
                .collect();
            ComparisonRow {
                workload: workload.name.clone(),
                label: workload.label.clone(),
                cells,
            }
        })
        .collect();

    Ok(Comparison {
        baseline: baseline.to_owned(),
        configurations: full_order.configurations,
        rows,
        missing,
    })
}

/// Returns `((mean / baseline) - 1) * 100` rounded to one decimal place.
///
/// Returns `None` when the baseline is not a positive, finite number.
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "relative deviation of means is inherently floating point"
)]
pub fn relative_percentage(mean: f64, baseline: f64) -> Option<f64> {
    if !baseline.is_finite() || baseline <= 0.0 || !mean.is_finite() {
        return None;
    }
    let percentage = ((mean / baseline) - 1.0) * 100.0;
    Some((percentage * 10.0).round() / 10.0)
}

/// Formats the relative deviation of `mean` from `baseline`.
///
/// Positive and negative deviations carry an explicit sign and one decimal;
/// a deviation that rounds to zero is rendered as `0%`.
///
/// ```
/// use sandbench_harness::percentage_label;
///
/// assert_eq!(percentage_label(14.0, 11.0).as_deref(), Some("+27.3%"));
/// assert_eq!(percentage_label(9.6, 10.0).as_deref(), Some("-4.0%"));
/// assert_eq!(percentage_label(10.0, 10.0).as_deref(), Some("0%"));
/// assert_eq!(percentage_label(10.0, 0.0), None);
/// ```
#[must_use]
pub fn percentage_label(mean: f64, baseline: f64) -> Option<String> {
    let percentage = relative_percentage(mean, baseline)?;
    if percentage == 0.0 {
        Some(String::from("0%"))
    } else {
        Some(format!("{percentage:+.1}%"))
    }
}
