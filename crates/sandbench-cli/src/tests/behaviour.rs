//! BDD step definitions for end-to-end CLI runs.
//!
//! These steps map the scenarios in `tests/features/sandbench_cli.feature`
//! to in-process CLI invocations over real `/bin/sh` subjects.

use super::support::{TestWorld, world};

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;

fn cell<'a>(json: &'a Value, workload: &str, configuration: &str) -> &'a Value {
    json["rows"]
        .as_array()
        .and_then(|rows| rows.iter().find(|row| row["workload"] == workload))
        .and_then(|row| row["cells"].as_array())
        .and_then(|cells| {
            cells
                .iter()
                .find(|cell| cell["configuration"] == configuration)
        })
        .unwrap_or_else(|| panic!("no cell for {workload}/{configuration} in {json}"))
}

#[given("a copy session whose launcher enforces a {policy} policy")]
fn given_copy_session(world: &RefCell<TestWorld>, policy: String) {
    world
        .borrow()
        .write_copy_session(&policy)
        .expect("failed to lay out session");
}

#[when("the operator runs {command}")]
fn when_operator_runs(world: &RefCell<TestWorld>, command: String) {
    world
        .borrow_mut()
        .run(&command)
        .expect("failed to run CLI command");
}

#[then("the CLI exits with code {status}")]
fn then_exit_code(world: &RefCell<TestWorld>, status: u8) {
    world
        .borrow()
        .assert_exit_code(status)
        .expect("exit code assertion failed");
}

#[then("the suite result is {result}")]
fn then_suite_result(world: &RefCell<TestWorld>, result: String) {
    let json = world.borrow().stdout_json().expect("suite json");
    let expected = result.trim_matches('"') == "passed";
    assert_eq!(json["passed"], expected, "suite output {json}");
}

#[then("the {phase} phase of {workload} is {verdict}")]
fn then_phase_verdict(
    world: &RefCell<TestWorld>,
    phase: String,
    workload: String,
    verdict: String,
) {
    let json = world.borrow().stdout_json().expect("suite json");
    let found = json["workloads"]
        .as_array()
        .and_then(|workloads| {
            workloads
                .iter()
                .find(|report| report["workload"] == workload.as_str())
        })
        .and_then(|report| report["phases"].as_array())
        .and_then(|phases| phases.iter().find(|entry| entry["phase"] == phase.as_str()))
        .unwrap_or_else(|| panic!("no {phase} phase for {workload} in {json}"));
    assert_eq!(found["verdict"], verdict.as_str(), "phase {found}");
}

#[then("the first failure is a {kind}")]
fn then_first_failure(world: &RefCell<TestWorld>, kind: String) {
    let json = world.borrow().stdout_json().expect("suite json");
    assert_eq!(json["failures"][0]["kind"], kind.as_str(), "suite output {json}");
}

#[then("the log {name} holds {count} samples")]
fn then_log_samples(world: &RefCell<TestWorld>, name: String, count: usize) {
    let text = world.borrow().read_file(&name).expect("benchmark log");
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("name,test_type,time"));
    assert_eq!(lines.count(), count);
}

#[then("the file {name} starts with {header}")]
fn then_file_header(world: &RefCell<TestWorld>, name: String, header: String) {
    let text = world.borrow().read_file(&name).expect("table");
    assert_eq!(text.lines().next(), Some(header.trim_matches('"')));
}

#[then("the {configuration} cell of {workload} has no percentage")]
fn then_no_percentage(world: &RefCell<TestWorld>, configuration: String, workload: String) {
    let json = world.borrow().stdout_json().expect("report json");
    let found = cell(&json, &workload, &configuration);
    assert!(found["mean"].is_number(), "cell {found}");
    assert!(found["percentage"].is_null(), "cell {found}");
}

#[then("the {configuration} cell of {workload} has a percentage")]
fn then_percentage(world: &RefCell<TestWorld>, configuration: String, workload: String) {
    let json = world.borrow().stdout_json().expect("report json");
    let found = cell(&json, &workload, &configuration);
    let label = found["percentage"].as_str().unwrap_or_default();
    assert!(label.ends_with('%'), "cell {found}");
}

#[then("no artifacts remain under {dir}")]
fn then_no_artifacts(world: &RefCell<TestWorld>, dir: String) {
    let root = world.borrow().path(&dir);
    let leftovers = walk_files(&root);
    assert!(leftovers.is_empty(), "leftover artifacts: {leftovers:?}");
}

fn walk_files(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .flat_map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                walk_files(&path)
            } else {
                vec![path]
            }
        })
        .collect()
}

#[scenario(
    path = "tests/features/sandbench_cli.feature",
    name = "A blocking policy passes the security suite"
)]
fn blocking_policy_passes(world: RefCell<TestWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/sandbench_cli.feature",
    name = "A permissive policy fails the security suite"
)]
fn permissive_policy_fails(world: RefCell<TestWorld>) {
    let _ = world;
}

#[scenario(
    path = "tests/features/sandbench_cli.feature",
    name = "Benchmark samples flow into a comparison report"
)]
fn benchmark_pipeline(world: RefCell<TestWorld>) {
    let _ = world;
}
