//! Crate-level end-to-end and behaviour tests.

use std::fs;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;

use crate::aggregate::aggregate;
use crate::benchlog::{
    BenchmarkLog, Sample, SampleSink, Table, read_samples, read_table, save_aggregates,
};
use crate::context::SessionContext;
use crate::process::SystemExecutor;
use crate::report::{DeclarationOrder, compare};
use crate::sampler::{BenchmarkPlan, BenchmarkSampler};
use crate::session::Session;

mod behaviour;

fn write_log(path: &Path, samples: &[(&str, f64)]) {
    let mut log = BenchmarkLog::open(path).expect("open log");
    for (configuration, time) in samples {
        log.record(&Sample::new("resize", *configuration, *time))
            .expect("record sample");
    }
}

#[test]
fn log_to_report_pipeline_computes_landlock_overhead() {
    let temp = TempDir::new().expect("temp dir");
    let log = temp.path().join("results.csv");
    write_log(
        &log,
        &[
            ("none", 10.0),
            ("none", 12.0),
            ("none", 11.0),
            ("landlock", 14.0),
            ("landlock", 15.0),
            ("landlock", 13.0),
        ],
    );

    let records = aggregate(&read_samples(&log).expect("read log"));
    let aggregate_path = temp.path().join("results_agg.csv");
    save_aggregates(&aggregate_path, &records).expect("save aggregates");
    let Table::Aggregates(reloaded) = read_table(&aggregate_path).expect("read aggregates") else {
        panic!("aggregate table expected");
    };
    let comparison = compare(&reloaded, "none", &DeclarationOrder::default()).expect("compare");

    let row = comparison.rows.first().expect("resize row");
    let summary: Vec<(&str, Option<f64>, Option<&str>)> = row
        .cells
        .iter()
        .map(|cell| (cell.configuration.as_str(), cell.mean, cell.percentage.as_deref()))
        .collect();
    assert_eq!(
        summary,
        [("none", Some(11.0), None), ("landlock", Some(14.0), Some("+27.3%"))]
    );
}

#[test]
fn single_repetition_benchmark_reports_zero_deviation() {
    let temp = TempDir::new().expect("temp dir");
    fs::write(temp.path().join("input.bin"), b"frames").expect("write input");
    let session = Session::from_yaml(
        r#"
output_dir: out
workloads:
  - name: copy
    program: /bin/cp
    args: ["{input}", "{output}"]
    output: copy.out
    benchmark_input: input.bin
configurations:
  - name: none
"#,
        temp.path(),
    )
    .expect("session");
    let context = SessionContext::for_session(&session).with_timeout(Duration::from_secs(30));
    let plan = BenchmarkPlan::new(
        &session,
        &context,
        &[String::from("none")],
        &[],
        1,
    )
    .expect("plan");
    let log_path = temp.path().join("bench.csv");
    let mut log = BenchmarkLog::open(&log_path).expect("open log");

    let summary = BenchmarkSampler::new(SystemExecutor, context.clone())
        .run(&plan, &mut log)
        .expect("sampler runs");

    assert!(summary.passed(), "failures: {:?}", summary.failures());
    let records = aggregate(&read_samples(&log_path).expect("read log"));
    let [record] = records.as_slice() else {
        panic!("expected one group, got {records:?}");
    };
    assert_eq!(record.count(), Some(1));
    assert_eq!(record.std(), 0.0);
    assert!(record.mean() > 0.0);
    assert!(
        !context.benchmark_dir("copy", "none").join("copy.out").exists(),
        "benchmark artifacts are removed after each sample"
    );
}
