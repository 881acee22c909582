//! CLI entrypoint for the sandbench harness.
//!
//! The binary delegates to [`sandbench_cli::run`], which loads configuration,
//! parses the subcommand, drives the harness and renders the result.

use std::io::{self, IsTerminal, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let stdout_is_terminal = io::stdout().is_terminal();
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    // Left unlocked: the tracing subscriber writes to stderr from the
    // process watchdog thread.
    let mut stderr = io::stderr();
    sandbench_cli::run(
        std::env::args_os(),
        &mut stdout,
        &mut stderr,
        stdout_is_terminal,
    )
}
