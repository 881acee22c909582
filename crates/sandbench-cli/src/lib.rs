//! Command-line runtime for the sandbench harness.
//!
//! The module owns argument parsing, configuration bootstrapping, telemetry
//! installation and result rendering. It can be driven from the binary
//! entrypoint or from tests, where the configuration loader and the IO
//! streams are substituted.
//!
//! Exit codes: `0` when every asserted phase and every benchmark pair
//! succeeded, `1` when a security phase was unexpected or a benchmark pair
//! failed, `2` for usage, configuration and session errors.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;

mod cli;
mod commands;
mod config;
mod errors;
pub mod output;
mod telemetry;

use cli::Cli;
use commands::{CommandContext, execute};
use config::split_config_arguments;
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;
pub use output::{OutputFormat, ResolvedOutputFormat};

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: keep in sync with the fields of `sandbench_config::Config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--log-filter",
    "--log-format",
    "--timeout-secs",
];

const USAGE_EXIT_STATUS: u8 = 2;

/// Bundles the IO streams provided to the CLI runtime.
pub(crate) struct IoStreams<'a, W: Write, E: Write> {
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
    stdout_is_terminal: bool,
}

impl<'a, W: Write, E: Write> IoStreams<'a, W, E> {
    pub(crate) const fn new(
        stdout: &'a mut W,
        stderr: &'a mut E,
        stdout_is_terminal: bool,
    ) -> Self {
        Self {
            stdout,
            stderr,
            stdout_is_terminal,
        }
    }

    pub(crate) const fn stdout_is_terminal(&self) -> bool {
        self.stdout_is_terminal
    }
}

struct CliRunner<'a, 'io, W: Write, E: Write, L: ConfigLoader> {
    io: &'a mut IoStreams<'io, W, E>,
    loader: &'a L,
}

impl<'a, 'io, W, E, L> CliRunner<'a, 'io, W, E, L>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    const fn new(io: &'a mut IoStreams<'io, W, E>, loader: &'a L) -> Self {
        Self { io, loader }
    }

    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let arguments: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&arguments);

        let cli = match Cli::try_parse_from(&split.command_arguments) {
            Ok(cli) => cli,
            Err(error) => return self.report_clap_error(&error),
        };

        let format = cli.output.resolve(self.io.stdout_is_terminal());
        let result = self
            .loader
            .load(&split.config_arguments)
            .and_then(|config| {
                telemetry::initialise(&config)?;
                Ok(config)
            })
            .and_then(|config| {
                let mut context = CommandContext {
                    config: &config,
                    format,
                    stdout: &mut *self.io.stdout,
                };
                execute(cli.command, &mut context)
            });

        match result {
            Ok(outcome) => outcome.exit_code(),
            Err(error) => {
                let _ = writeln!(self.io.stderr, "error: {error}");
                ExitCode::from(error.exit_status())
            }
        }
    }

    /// Prints help and version requests to stdout and usage errors to stderr.
    fn report_clap_error(&mut self, error: &clap::Error) -> ExitCode {
        let rendered = error.render();
        if error.use_stderr() {
            let _ = write!(self.io.stderr, "{rendered}");
            ExitCode::from(USAGE_EXIT_STATUS)
        } else {
            let _ = write!(self.io.stdout, "{rendered}");
            ExitCode::SUCCESS
        }
    }
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    stdout_is_terminal: bool,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdout, stderr, stdout_is_terminal);
    run_with_loader(args, &mut io, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
#[must_use]
pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    io: &mut IoStreams<'_, W, E>,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    CliRunner::new(io, loader).run(args)
}

#[cfg(test)]
mod tests;
