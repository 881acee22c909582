//! Behaviour-driven tests for the security suite against real processes.

use std::fs;
use std::time::Duration;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use crate::classify::Verdict;
use crate::context::SessionContext;
use crate::error::SessionError;
use crate::process::SystemExecutor;
use crate::session::Session;
use crate::suite::{FailureKind, PhaseReport, SecuritySuite, SuiteReport};

/// Copies its input, but an exploit input leaks the copy and then crashes.
const SUBJECT_SCRIPT: &str = r#"
if grep -q EXPLOIT "$1"; then
  cp "$1" "$2"
  echo "payload triggered" >&2
  exit 1
fi
cp "$1" "$2"
"#;

/// Runs `--command` under `--policy`, refusing everything for deny-all.
const LAUNCHER_SCRIPT: &str = r#"
policy=""
command=""
while [ $# -gt 0 ]; do
  case "$1" in
    --policy) policy="$2"; shift 2 ;;
    --command) command="$2"; shift 2 ;;
    *) shift ;;
  esac
done
if grep -q deny-all "$policy"; then
  echo "denied by policy" >&2
  exit 126
fi
exec $command
"#;

// ---------------------------------------------------------------------------
// Test world
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TestWorld {
    dir: Option<TempDir>,
    exploit_expectation: Option<&'static str>,
    report: Option<Result<SuiteReport, SessionError>>,
}

#[fixture]
fn world() -> TestWorld {
    TestWorld::default()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn session_dir(world: &TestWorld) -> &TempDir {
    world.dir.as_ref().expect("workload directory prepared")
}

fn session_yaml(exploit_expectation: Option<&str>) -> String {
    let expect = exploit_expectation
        .map(|outcome| format!(", expect: {outcome}"))
        .unwrap_or_default();
    format!(
        r#"
output_dir: out
workloads:
  - name: copy
    program: /bin/sh
    args: ["copy.sh", "{{input}}", "{{output}}"]
    output: copy.out
    security:
      legitimate: {{ input: benign.txt }}
      exploit: {{ input: exploit.txt{expect} }}
configurations:
  - name: none
  - name: landlock
    launcher:
      program: /bin/sh
      extra_args: ["landlock_service.sh"]
      policy: policy.txt
"#
    )
}

fn report(world: &TestWorld) -> &SuiteReport {
    world
        .report
        .as_ref()
        .expect("suite has run")
        .as_ref()
        .expect("suite completed")
}

fn phase<'a>(world: &'a TestWorld, phase: &str, workload: &str) -> &'a PhaseReport {
    report(world)
        .workloads()
        .iter()
        .find(|report| report.workload() == workload)
        .and_then(|report| {
            report
                .phases()
                .iter()
                .find(|candidate| candidate.phase().as_str() == phase)
        })
        .expect("phase reported")
}

// ---------------------------------------------------------------------------
// Given steps
// ---------------------------------------------------------------------------

#[given("a copy workload whose exploit leaks its output and crashes")]
fn given_copy_workload(world: &mut TestWorld) {
    let dir = TempDir::new().expect("temp dir");
    fs::write(dir.path().join("copy.sh"), SUBJECT_SCRIPT).expect("subject script");
    fs::write(dir.path().join("landlock_service.sh"), LAUNCHER_SCRIPT).expect("launcher script");
    fs::write(dir.path().join("benign.txt"), "frame data\n").expect("benign input");
    fs::write(dir.path().join("exploit.txt"), "EXPLOIT\n").expect("exploit input");
    world.dir = Some(dir);
}

#[given("a launcher enforcing a {policy} policy")]
fn given_policy(world: &mut TestWorld, policy: String) {
    let path = session_dir(world).path().join("policy.txt");
    fs::write(path, format!("{policy}\n")).expect("policy file");
}

#[given("the unprotected exploit must terminate abnormally")]
fn given_abnormal_exploit(world: &mut TestWorld) {
    world.exploit_expectation = Some("abnormal");
}

// ---------------------------------------------------------------------------
// When steps
// ---------------------------------------------------------------------------

#[when("the security suite runs")]
fn when_suite_runs(world: &mut TestWorld) {
    let text = session_yaml(world.exploit_expectation);
    let session = Session::from_yaml(&text, session_dir(world).path()).expect("session");
    let context = SessionContext::for_session(&session).with_timeout(Duration::from_secs(30));
    let suite = SecuritySuite::new(SystemExecutor, context);
    world.report = Some(suite.run(&session));
}

// ---------------------------------------------------------------------------
// Then steps
// ---------------------------------------------------------------------------

#[then("the {phase_name} phase of {workload} is {verdict}")]
fn then_phase_verdict(world: &mut TestWorld, phase_name: String, workload: String, verdict: String) {
    let found = phase(world, &phase_name, &workload).verdict();
    let expected = match verdict.as_str() {
        "success" => Some(Verdict::Success),
        "blocked" => Some(Verdict::Blocked),
        "unexpected" => Some(Verdict::Unexpected),
        "observed" => None,
        other => panic!("unsupported verdict: '{other}'"),
    };
    assert_eq!(found, expected, "{phase_name} of {workload}");
}

#[then("the {phase_name} phase of {workload} exited abnormally")]
fn then_phase_abnormal(world: &mut TestWorld, phase_name: String, workload: String) {
    let exit = phase(world, &phase_name, &workload)
        .exit()
        .expect("phase produced a record");
    assert!(exit.is_abnormal(), "{phase_name} exited with {exit}");
}

#[then("the suite passes")]
fn then_suite_passes(world: &mut TestWorld) {
    let suite = report(world);
    assert!(suite.passed(), "failures: {:?}", suite.failures());
}

#[then("the suite fails with a sandbox escape")]
fn then_sandbox_escape(world: &mut TestWorld) {
    let suite = report(world);
    assert!(!suite.passed());
    let kinds: Vec<FailureKind> = suite.failures().iter().map(|failure| failure.kind).collect();
    assert_eq!(kinds, [FailureKind::SandboxEscape]);
}

// ---------------------------------------------------------------------------
// Scenario registration
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/security_suite.feature",
    name = "A deny-all policy blocks the exploit"
)]
fn deny_all_policy_blocks_exploit(world: TestWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/security_suite.feature",
    name = "An asserted exploit expectation is checked"
)]
fn asserted_exploit_expectation(world: TestWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/security_suite.feature",
    name = "A permissive policy lets the exploit escape"
)]
fn permissive_policy_escape(world: TestWorld) {
    let _ = world;
}
