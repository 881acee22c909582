//! Per-group timing statistics.
//!
//! [`aggregate`] groups samples by (workload, configuration) and computes the
//! arithmetic mean and the sample (n - 1) standard deviation of the elapsed
//! times. A group with a single sample reports a standard deviation of zero.
//! Groups are returned in order of first appearance; the statistics
//! themselves do not depend on the order of the input.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::benchlog::Sample;

/// Mean and spread of one (workload, configuration) group, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    workload: String,
    configuration: String,
    mean: f64,
    std: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
}

impl AggregateRecord {
    /// Creates a record.
    ///
    /// `count` is `None` when the record was read back from an aggregate
    /// table, which does not persist sample counts.
    #[must_use]
    pub fn new(
        workload: impl Into<String>,
        configuration: impl Into<String>,
        mean: f64,
        std: f64,
        count: Option<usize>,
    ) -> Self {
        Self {
            workload: workload.into(),
            configuration: configuration.into(),
            mean,
            std,
            count,
        }
    }

    /// Returns the workload name.
    #[must_use]
    pub const fn workload(&self) -> &str {
        self.workload.as_str()
    }

    /// Returns the configuration name.
    #[must_use]
    pub const fn configuration(&self) -> &str {
        self.configuration.as_str()
    }

    /// Returns the mean elapsed time in milliseconds.
    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// Returns the sample standard deviation in milliseconds.
    #[must_use]
    pub const fn std(&self) -> f64 {
        self.std
    }

    /// Returns the number of samples, when known.
    #[must_use]
    pub const fn count(&self) -> Option<usize> {
        self.count
    }
}

/// Groups samples and computes one [`AggregateRecord`] per group.
///
/// ```
/// use sandbench_harness::{Sample, aggregate};
///
/// let samples = [
///     Sample::new("resize", "none", 10.0),
///     Sample::new("resize", "none", 12.0),
///     Sample::new("resize", "none", 11.0),
/// ];
/// let records = aggregate(&samples);
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].mean(), 11.0);
/// assert_eq!(records[0].std(), 1.0);
/// ```
#[must_use]
pub fn aggregate<'a>(samples: impl IntoIterator<Item = &'a Sample>) -> Vec<AggregateRecord> {
    let mut order: Vec<(&'a str, &'a str)> = Vec::new();
    let mut groups: HashMap<(&'a str, &'a str), Vec<f64>> = HashMap::new();
    for sample in samples {
        let key = (sample.workload(), sample.configuration());
        groups
            .entry(key)
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(sample.time_ms());
    }

    order
        .into_iter()
        .filter_map(|key| {
            let mut times = groups.remove(&key)?;
            // Summing in sorted order keeps the result bit-identical under
            // any permutation of the input.
            times.sort_by(f64::total_cmp);
            let (workload, configuration) = key;
            let average = mean(&times);
            Some(AggregateRecord::new(
                workload,
                configuration,
                average,
                sample_std(&times, average),
                Some(times.len()),
            ))
        })
        .collect()
}

#[expect(
    clippy::float_arithmetic,
    reason = "statistics over elapsed times are inherently floating point"
)]
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / count_as_f64(values.len())
}

#[expect(
    clippy::float_arithmetic,
    reason = "statistics over elapsed times are inherently floating point"
)]
fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let squares: f64 = values.iter().map(|value| (value - mean).powi(2)).sum();
    (squares / count_as_f64(values.len() - 1)).sqrt()
}

#[expect(
    clippy::cast_precision_loss,
    reason = "sample counts stay far below 2^52"
)]
const fn count_as_f64(count: usize) -> f64 {
    count as f64
}

#[cfg(test)]
mod tests;
