//! Unit tests for outcome classification.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;

use super::*;
use crate::record::{ArtifactObservation, ExitState};

fn record(exit: ExitState, artifact_exists: bool, elapsed: Duration) -> RunRecord {
    RunRecord::new(
        "copy",
        "none",
        "cp in out",
        exit,
        elapsed,
        vec![ArtifactObservation::new("out", artifact_exists)],
    )
}

#[rstest]
#[case(Duration::ZERO)]
#[case(Duration::from_millis(15))]
#[case(Duration::from_secs(3600))]
fn clean_exit_with_artifact_is_success(#[case] elapsed: Duration) {
    let run = record(ExitState::exited(0), true, elapsed);
    assert_eq!(
        classify(&run, ExpectedOutcome::MustSucceedWithArtifact),
        Verdict::Success
    );
}

#[rstest]
#[case(ExitState::exited(0), false)]
#[case(ExitState::exited(1), true)]
#[case(ExitState::signalled(9), true)]
fn legitimate_failures_are_unexpected(#[case] exit: ExitState, #[case] artifact: bool) {
    let run = record(exit, artifact, Duration::ZERO);
    assert_eq!(
        classify(&run, ExpectedOutcome::MustSucceedWithArtifact),
        Verdict::Unexpected
    );
}

#[rstest]
#[case(ExitState::exited(0))]
#[case(ExitState::exited(1))]
#[case(ExitState::signalled(6))]
fn absent_artifact_is_blocked_whatever_the_exit(#[case] exit: ExitState) {
    let run = record(exit, false, Duration::ZERO);
    assert_eq!(
        classify(&run, ExpectedOutcome::MustNotProduceArtifact),
        Verdict::Blocked
    );
}

#[rstest]
fn leaked_artifact_is_unexpected() {
    let run = record(ExitState::exited(1), true, Duration::ZERO);
    assert_eq!(
        classify(&run, ExpectedOutcome::MustNotProduceArtifact),
        Verdict::Unexpected
    );
}

#[rstest]
#[case(ExitState::exited(2), Verdict::Blocked)]
#[case(ExitState::signalled(6), Verdict::Blocked)]
#[case(ExitState::exited(0), Verdict::Unexpected)]
fn abnormal_termination(#[case] exit: ExitState, #[case] expected: Verdict) {
    let run = record(exit, true, Duration::ZERO);
    assert_eq!(classify(&run, ExpectedOutcome::MustTerminateAbnormally), expected);
}

#[rstest]
fn classification_is_deterministic() {
    let outcomes = [
        ExpectedOutcome::MustSucceedWithArtifact,
        ExpectedOutcome::MustTerminateAbnormally,
        ExpectedOutcome::MustNotProduceArtifact,
    ];
    let runs = [
        record(ExitState::exited(0), true, Duration::from_millis(1)),
        record(ExitState::exited(0), false, Duration::from_millis(2)),
        record(ExitState::signalled(11), false, Duration::from_millis(3)),
    ];
    for run in &runs {
        for expected in outcomes {
            let first = classify(run, expected);
            let copy = run.clone();
            assert_eq!(classify(&copy, expected), first);
            assert_eq!(classify(run, expected), first);
        }
    }
}

#[rstest]
fn runner_failures_are_unexpected() {
    let failure: Result<RunRecord, RunError> = Err(RunError::Launch {
        command: String::from("missing"),
        source: Arc::new(io::Error::from(io::ErrorKind::NotFound)),
    });
    for expected in [
        ExpectedOutcome::MustSucceedWithArtifact,
        ExpectedOutcome::MustNotProduceArtifact,
        ExpectedOutcome::MustTerminateAbnormally,
    ] {
        assert_eq!(classify_outcome(&failure, expected), Verdict::Unexpected);
    }
}

#[rstest]
#[case("succeed", ExpectedOutcome::MustSucceedWithArtifact)]
#[case("abnormal", ExpectedOutcome::MustTerminateAbnormally)]
#[case("no_artifact", ExpectedOutcome::MustNotProduceArtifact)]
fn expectations_parse_from_session_keywords(
    #[case] keyword: &str,
    #[case] expected: ExpectedOutcome,
) {
    let parsed: ExpectedOutcome = serde_json::from_value(serde_json::Value::from(keyword))
        .expect("known keyword");
    assert_eq!(parsed, expected);
}
