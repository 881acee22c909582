//! Unit tests for the process runner.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mockall::mock;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::session::Launcher;

mock! {
    Executor {}
    impl ProcessExecutor for Executor {
        fn execute(&self, invocation: &Invocation) -> Result<Completion, RunError>;
    }
}

#[fixture]
fn scratch() -> TempDir {
    TempDir::new().expect("temp dir")
}

fn invocation(artifact: PathBuf) -> Invocation {
    Invocation::new(
        "copy",
        "none",
        CommandLine::new("cp", vec![String::from("in"), String::from("out")]),
    )
    .with_artifacts(vec![artifact])
}

fn executor_writing(artifact: PathBuf, exit: ExitState) -> MockExecutor {
    let mut executor = MockExecutor::new();
    executor.expect_execute().once().returning(move |_| {
        fs::write(&artifact, b"payload").expect("write artifact");
        Ok(Completion::new(exit, Duration::from_millis(12)))
    });
    executor
}

#[rstest]
fn records_exit_elapsed_and_artifacts(scratch: TempDir) {
    let artifact = scratch.path().join("out.png");
    let runner = ProcessRunner::new(executor_writing(artifact.clone(), ExitState::exited(0)));

    let record = runner
        .run(&invocation(artifact.clone()), CleanupPolicy::Preserve)
        .expect("run");

    assert_eq!(record.workload(), "copy");
    assert_eq!(record.configuration(), "none");
    assert_eq!(record.command(), "cp in out");
    assert_eq!(record.exit(), ExitState::exited(0));
    assert_eq!(record.elapsed(), Duration::from_millis(12));
    assert_eq!(record.artifacts(), [ArtifactObservation::new(&artifact, true)]);
    assert!(artifact.exists(), "security runs keep their artifacts");
}

#[rstest]
fn nonzero_exit_is_a_record_not_an_error(scratch: TempDir) {
    let artifact = scratch.path().join("out.png");
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .once()
        .returning(|_| Ok(Completion::new(ExitState::signalled(6), Duration::ZERO)));
    let runner = ProcessRunner::new(executor);

    let record = runner
        .run(&invocation(artifact), CleanupPolicy::Preserve)
        .expect("abnormal exits are recorded");

    assert_eq!(record.exit().signal(), Some(6));
    assert!(!record.any_artifact_present());
}

#[rstest]
fn benchmark_cleanup_removes_artifacts(scratch: TempDir) {
    let artifact = scratch.path().join("out.png");
    let runner = ProcessRunner::new(executor_writing(artifact.clone(), ExitState::exited(0)));

    let record = runner
        .run(&invocation(artifact.clone()), CleanupPolicy::RemoveArtifacts)
        .expect("run");

    assert!(record.all_artifacts_present(), "observed before removal");
    assert!(!artifact.exists());
}

#[rstest]
fn timeout_discards_partial_artifacts(scratch: TempDir) {
    let artifact = scratch.path().join("partial.mp4");
    let written = artifact.clone();
    let mut executor = MockExecutor::new();
    executor.expect_execute().once().returning(move |_| {
        fs::write(&written, b"half").expect("write partial");
        Err(RunError::Timeout {
            command: String::from("cp in out"),
            timeout_secs: 1,
        })
    });
    let runner = ProcessRunner::new(executor);

    let err = runner
        .run(&invocation(artifact.clone()), CleanupPolicy::Preserve)
        .expect_err("timeout");

    assert!(err.is_timeout());
    assert!(!artifact.exists());
}

#[rstest]
fn launch_errors_propagate_untouched(scratch: TempDir) {
    let artifact = scratch.path().join("out.png");
    let mut executor = MockExecutor::new();
    executor.expect_execute().once().returning(|invocation| {
        Err(RunError::Launch {
            command: invocation.command().to_string(),
            source: Arc::new(io::Error::from(io::ErrorKind::NotFound)),
        })
    });
    let runner = ProcessRunner::new(executor);

    let err = runner
        .run(&invocation(artifact), CleanupPolicy::RemoveArtifacts)
        .expect_err("launch");

    assert!(matches!(err, RunError::Launch { ref command, .. } if command == "cp in out"));
}

#[rstest]
fn prepare_wraps_sandboxed_configurations(scratch: TempDir) {
    let context = SessionContext::new(scratch.path())
        .with_working_dir("/srv/session")
        .with_timeout(Duration::from_secs(7));
    let workload = Workload::new(
        "copy",
        "/usr/bin/cp",
        vec![String::from("{input}"), String::from("{output}")],
        "copy.out",
    );
    let landlock = Configuration::sandboxed(
        "landlock",
        Launcher::new("/opt/landlock_service", "/etc/policy.json"),
    );
    let output = scratch.path().join("copy.out");

    let prepared = Invocation::prepare(
        &context,
        &workload,
        &landlock,
        Path::new("/data/in.bin"),
        &output,
    )
    .expect("prepare");

    assert_eq!(prepared.configuration(), "landlock");
    assert_eq!(prepared.command().program(), Path::new("/opt/landlock_service"));
    assert_eq!(
        prepared.command().args().last().map(String::as_str),
        Some(format!("/usr/bin/cp /data/in.bin {}", output.display()).as_str())
    );
    assert_eq!(prepared.artifacts(), [output]);
    assert_eq!(prepared.working_dir(), Path::new("/srv/session"));
    assert_eq!(prepared.timeout(), Duration::from_secs(7));
}

#[rstest]
fn prepare_rejects_arguments_a_launcher_would_split(scratch: TempDir) {
    let context = SessionContext::new(scratch.path());
    let workload = Workload::new(
        "scale",
        "/usr/bin/magick",
        vec![String::from("{input}"), String::from("-resize 50%"), String::from("{output}")],
        "scaled.png",
    );
    let landlock = Configuration::sandboxed("landlock", Launcher::new("/opt/ll", "/etc/p.json"));

    let err = Invocation::prepare(
        &context,
        &workload,
        &landlock,
        Path::new("in.png"),
        &scratch.path().join("scaled.png"),
    )
    .expect_err("whitespace argument");
    assert!(matches!(err, SessionError::UnwrappableArgument { ref argument, .. } if argument == "-resize 50%"));

    let direct = Invocation::prepare(
        &context,
        &workload,
        &Configuration::unsandboxed("none"),
        Path::new("in.png"),
        &scratch.path().join("scaled.png"),
    );
    assert!(direct.is_ok(), "unwrapped commands keep their arguments intact");
}

#[rstest]
fn remove_artifacts_ignores_missing_paths(scratch: TempDir) {
    let dir = scratch.path().join("frames");
    fs::create_dir(&dir).expect("mkdir");
    fs::write(dir.join("0001.png"), b"x").expect("write");
    let missing = scratch.path().join("never-created");

    remove_artifacts(&[dir.clone(), missing]).expect("remove");

    assert!(!dir.exists());
}
