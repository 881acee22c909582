//! Child process execution on the host.
//!
//! [`SystemExecutor`] implements [`ProcessExecutor`] by spawning the command
//! in a fresh process group with stdout discarded and stderr piped. The
//! calling thread waits for the child while a watchdog thread enforces the
//! invocation's timeout by killing the whole group, so a launcher and the
//! subject it started are terminated together.

use std::io;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Command, Output, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::error::RunError;
use crate::record::ExitState;
use crate::runner::{Completion, Invocation, ProcessExecutor};

/// Tracing target for child process operations.
const PROCESS_TARGET: &str = "sandbench_harness::process";

/// Executes invocations as real child processes.
///
/// # Example
///
/// ```rust,no_run
/// use sandbench_harness::{CommandLine, Invocation, ProcessRunner, CleanupPolicy, SystemExecutor};
///
/// let runner = ProcessRunner::new(SystemExecutor);
/// let invocation = Invocation::new("echo", "none", CommandLine::new("echo", vec!["hi".into()]));
/// let record = runner.run(&invocation, CleanupPolicy::Preserve);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl ProcessExecutor for SystemExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<Completion, RunError> {
        let rendered = invocation.command().to_string();
        let mut command = Command::new(invocation.command().program());
        command
            .args(invocation.command().args())
            .current_dir(invocation.working_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .process_group(0);

        let started = Instant::now();
        let child = command.spawn().map_err(|err| RunError::Launch {
            command: rendered.clone(),
            source: Arc::new(err),
        })?;
        let pid = child.id();

        let timed_out = Arc::new(AtomicBool::new(false));
        let (finished, watchdog) = spawn_watchdog(pid, invocation, Arc::clone(&timed_out));
        let waited = child.wait_with_output();
        let elapsed = started.elapsed();
        drop(finished.send(()));
        if watchdog.join().is_err() {
            warn!(target: PROCESS_TARGET, pid, "watchdog thread panicked");
        }

        if timed_out.load(Ordering::SeqCst) {
            return Err(RunError::Timeout {
                command: rendered,
                timeout_secs: invocation.timeout().as_secs(),
            });
        }
        let output = waited.map_err(|err| RunError::Wait {
            command: rendered.clone(),
            source: Arc::new(err),
        })?;
        log_stderr(invocation, &output);

        let exit = ExitState::from_parts(output.status.code(), output.status.signal());
        debug!(
            target: PROCESS_TARGET,
            workload = invocation.workload(),
            configuration = invocation.configuration(),
            pid,
            %exit,
            "child process exited"
        );
        Ok(Completion::new(exit, elapsed))
    }
}

/// Starts the thread that kills the child's process group on timeout.
///
/// Sending on (or dropping) the returned sender tells the watchdog that the
/// child has been reaped.
fn spawn_watchdog(
    pid: u32,
    invocation: &Invocation,
    timed_out: Arc<AtomicBool>,
) -> (mpsc::Sender<()>, thread::JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel::<()>();
    let timeout = invocation.timeout();
    let workload = invocation.workload().to_owned();
    let handle = thread::spawn(move || {
        if receiver.recv_timeout(timeout) != Err(RecvTimeoutError::Timeout) {
            return;
        }
        timed_out.store(true, Ordering::SeqCst);
        warn!(
            target: PROCESS_TARGET,
            workload = workload.as_str(),
            pid,
            timeout_secs = timeout.as_secs(),
            "invocation timed out, killing process group"
        );
        if let Err(err) = kill_group(pid) {
            warn!(target: PROCESS_TARGET, pid, error = %err, "failed to kill process group");
        }
    });
    (sender, handle)
}

fn kill_group(pid: u32) -> io::Result<()> {
    let raw = i32::try_from(pid).map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    killpg(Pid::from_raw(raw), Signal::SIGKILL).map_err(io::Error::from)
}

fn log_stderr(invocation: &Invocation, output: &Output) {
    if output.stderr.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(&output.stderr);
    debug!(
        target: PROCESS_TARGET,
        workload = invocation.workload(),
        configuration = invocation.configuration(),
        stderr = %text.trim(),
        "child stderr output"
    );
}
