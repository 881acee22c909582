//! Flat comma-separated benchmark tables.
//!
//! Two layouts are supported:
//!
//! - the raw sample log, header [`SAMPLE_HEADER`], one `name,test_type,time`
//!   row per sample with `time` in milliseconds;
//! - the aggregate table, header [`AGGREGATE_HEADER`], one
//!   `name,test_type,mean,std` row per group.
//!
//! The sample log is append-only. Re-opening an existing log verifies its
//! header and appends after the rows already present, so several sampler
//! runs can accumulate into one file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::AggregateRecord;
use crate::error::LogError;

/// Tracing target for benchmark table operations.
const LOG_TARGET: &str = "sandbench_harness::benchlog";

/// Header of the raw sample log.
pub const SAMPLE_HEADER: &str = "name,test_type,time";

/// Header of the aggregate table.
pub const AGGREGATE_HEADER: &str = "name,test_type,mean,std";

/// Suffix appended to a log's file stem to name its aggregate table.
const AGGREGATE_SUFFIX: &str = "_agg";

/// One timed repetition of a (workload, configuration) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    workload: String,
    configuration: String,
    time_ms: f64,
}

impl Sample {
    /// Creates a sample from a time in milliseconds.
    #[must_use]
    pub fn new(workload: impl Into<String>, configuration: impl Into<String>, time_ms: f64) -> Self {
        Self {
            workload: workload.into(),
            configuration: configuration.into(),
            time_ms,
        }
    }

    /// Creates a sample from a measured duration.
    #[must_use]
    pub fn from_elapsed(
        workload: impl Into<String>,
        configuration: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self::new(workload, configuration, duration_ms(elapsed))
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

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub const fn time_ms(&self) -> f64 {
        self.time_ms
    }
}

#[expect(
    clippy::float_arithmetic,
    reason = "milliseconds are logged with sub-millisecond precision"
)]
fn duration_ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// Destination for samples produced by the benchmark sampler.
pub trait SampleSink {
    /// Persists one sample.
    ///
    /// # Errors
    ///
    /// Returns a [`LogError`] when the sample cannot be written.
    fn record(&mut self, sample: &Sample) -> Result<(), LogError>;
}

impl SampleSink for Vec<Sample> {
    fn record(&mut self, sample: &Sample) -> Result<(), LogError> {
        self.push(sample.clone());
        Ok(())
    }
}

/// Append-only sample log backed by a file.
#[derive(Debug)]
pub struct BenchmarkLog {
    path: PathBuf,
    file: File,
}

impl BenchmarkLog {
    /// Opens `path` for appending, creating it with a header when empty.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Io`] when the file cannot be opened or written and
    /// [`LogError::Header`] when an existing file is not a sample log.
    pub fn open(path: &Path) -> Result<Self, LogError> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| LogError::io(parent, err))?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
            .map_err(|err| LogError::io(path, err))?;
        let length = file
            .metadata()
            .map_err(|err| LogError::io(path, err))?
            .len();

        if length == 0 {
            writeln!(file, "{SAMPLE_HEADER}").map_err(|err| LogError::io(path, err))?;
            debug!(target: LOG_TARGET, path = %path.display(), "created benchmark log");
        } else {
            let header = first_line(&file, path)?;
            expect_header(&header, SAMPLE_HEADER)?;
            debug!(target: LOG_TARGET, path = %path.display(), "appending to benchmark log");
        }
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Returns the log path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SampleSink for BenchmarkLog {
    fn record(&mut self, sample: &Sample) -> Result<(), LogError> {
        let row = format!(
            "{},{},{}\n",
            encode(sample.workload())?,
            encode(sample.configuration())?,
            sample.time_ms()
        );
        self.file
            .write_all(row.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|err| LogError::io(&self.path, err))
    }
}

fn first_line(file: &File, path: &Path) -> Result<String, LogError> {
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|err| LogError::io(path, err))?;
    Ok(line)
}

fn expect_header(found: &str, expected: &str) -> Result<(), LogError> {
    let trimmed = found.trim_end_matches(['\n', '\r']);
    if trimmed == expected {
        Ok(())
    } else {
        Err(LogError::Header {
            found: trimmed.to_owned(),
            expected: expected.to_owned(),
        })
    }
}

fn encode(field: &str) -> Result<&str, LogError> {
    if field.contains([',', '\n', '\r']) {
        Err(LogError::UnencodableField {
            value: field.to_owned(),
        })
    } else {
        Ok(field)
    }
}

/// A benchmark table of either layout.
#[derive(Debug, Clone, PartialEq)]
pub enum Table {
    /// A raw sample log.
    Samples(Vec<Sample>),
    /// An aggregate table.
    Aggregates(Vec<AggregateRecord>),
}

/// Reads a table, detecting its layout from the header.
///
/// # Errors
///
/// Returns [`LogError::Empty`] for a file without a header,
/// [`LogError::Header`] for an unknown header and [`LogError::Row`] for a
/// malformed data row.
pub fn read_table(path: &Path) -> Result<Table, LogError> {
    let file = File::open(path).map_err(|err| LogError::io(path, err))?;
    parse_table(BufReader::new(file), path)
}

/// Reads a raw sample log from a file.
///
/// # Errors
///
/// Returns a [`LogError`] when the file cannot be read or is not a sample
/// log.
pub fn read_samples(path: &Path) -> Result<Vec<Sample>, LogError> {
    let file = File::open(path).map_err(|err| LogError::io(path, err))?;
    match parse_table(BufReader::new(file), path)? {
        Table::Samples(samples) => Ok(samples),
        Table::Aggregates(_) => Err(LogError::Header {
            found: AGGREGATE_HEADER.to_owned(),
            expected: SAMPLE_HEADER.to_owned(),
        }),
    }
}

/// Parses a table of either layout from a reader.
///
/// `source` only labels I/O errors.
///
/// # Errors
///
/// See [`read_table`].
pub fn parse_table(reader: impl BufRead, source: &Path) -> Result<Table, LogError> {
    let mut lines = reader
        .lines()
        .enumerate()
        .map(|(index, line)| line.map(|text| (index + 1, text)));
    let (_, header) = lines
        .next()
        .ok_or(LogError::Empty)?
        .map_err(|err| LogError::io(source, err))?;
    let header_text = header.trim_end_matches('\r');

    let rows = lines.filter(|line| {
        line.as_ref()
            .map_or(true, |(_, text)| !text.trim().is_empty())
    });
    match header_text {
        SAMPLE_HEADER => rows
            .map(|line| {
                let (number, text) = line.map_err(|err| LogError::io(source, err))?;
                parse_sample(number, &text)
            })
            .collect::<Result<_, _>>()
            .map(Table::Samples),
        AGGREGATE_HEADER => rows
            .map(|line| {
                let (number, text) = line.map_err(|err| LogError::io(source, err))?;
                parse_aggregate(number, &text)
            })
            .collect::<Result<_, _>>()
            .map(Table::Aggregates),
        other => Err(LogError::Header {
            found: other.to_owned(),
            expected: format!("{SAMPLE_HEADER}' or '{AGGREGATE_HEADER}"),
        }),
    }
}

fn split_row<const N: usize>(number: usize, text: &str) -> Result<[&str; N], LogError> {
    let fields: Vec<&str> = text.trim_end_matches('\r').split(',').collect();
    let found = fields.len();
    fields.try_into().map_err(|_| LogError::Row {
        line: number,
        message: format!("expected {N} fields, found {found}"),
    })
}

fn parse_name(number: usize, column: &str, value: &str) -> Result<String, LogError> {
    if value.trim().is_empty() {
        return Err(LogError::Row {
            line: number,
            message: format!("empty {column}"),
        });
    }
    Ok(value.to_owned())
}

fn parse_millis(number: usize, column: &str, value: &str) -> Result<f64, LogError> {
    let parsed: f64 = value.trim().parse().map_err(|_| LogError::Row {
        line: number,
        message: format!("{column} '{value}' is not a number"),
    })?;
    if !parsed.is_finite() || parsed.is_sign_negative() {
        return Err(LogError::Row {
            line: number,
            message: format!("{column} '{value}' must be a finite, non-negative number"),
        });
    }
    Ok(parsed)
}

fn parse_sample(number: usize, text: &str) -> Result<Sample, LogError> {
    let [name, test_type, time] = split_row(number, text)?;
    Ok(Sample::new(
        parse_name(number, "name", name)?,
        parse_name(number, "test_type", test_type)?,
        parse_millis(number, "time", time)?,
    ))
}

fn parse_aggregate(number: usize, text: &str) -> Result<AggregateRecord, LogError> {
    let [name, test_type, mean, std] = split_row(number, text)?;
    Ok(AggregateRecord::new(
        parse_name(number, "name", name)?,
        parse_name(number, "test_type", test_type)?,
        parse_millis(number, "mean", mean)?,
        parse_millis(number, "std", std)?,
        None,
    ))
}

/// Writes an aggregate table.
///
/// # Errors
///
/// Returns [`LogError::UnencodableField`] for names that would corrupt the
/// layout and [`LogError::Io`] when writing fails.
pub fn write_aggregates(
    mut writer: impl Write,
    records: &[AggregateRecord],
    destination: &Path,
) -> Result<(), LogError> {
    let mut text = format!("{AGGREGATE_HEADER}\n");
    for record in records {
        text.push_str(&format!(
            "{},{},{},{}\n",
            encode(record.workload())?,
            encode(record.configuration())?,
            record.mean(),
            record.std()
        ));
    }
    writer
        .write_all(text.as_bytes())
        .and_then(|()| writer.flush())
        .map_err(|err| LogError::io(destination, err))
}

/// Writes an aggregate table to `path`, replacing any previous content.
///
/// # Errors
///
/// See [`write_aggregates`].
pub fn save_aggregates(path: &Path, records: &[AggregateRecord]) -> Result<(), LogError> {
    let file = File::create(path).map_err(|err| LogError::io(path, err))?;
    write_aggregates(io::BufWriter::new(file), records, path)
}

/// Returns the default aggregate path for a log: `<dir>/<stem>_agg.csv`.
///
/// ```
/// use std::path::Path;
/// use sandbench_harness::default_aggregate_path;
///
/// assert_eq!(
///     default_aggregate_path(Path::new("runs/results.csv")),
///     Path::new("runs/results_agg.csv"),
/// );
/// ```
#[must_use]
pub fn default_aggregate_path(log: &Path) -> PathBuf {
    let stem = log
        .file_stem()
        .map_or_else(|| String::from("benchmark"), |stem| stem.to_string_lossy().into_owned());
    log.with_file_name(format!("{stem}{AGGREGATE_SUFFIX}.csv"))
}
