//! Test support for driving the CLI runtime in-process.
//!
//! Commands run against scratch directories holding `/bin/sh` stand-ins for
//! the subject program and the enforcement launcher.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, ensure};
use rstest::fixture;
use sandbench_config::Config;
use tempfile::TempDir;

use crate::{AppError, ConfigLoader, IoStreams, run_with_loader};

/// Copies its input, but an exploit input leaks the copy and then crashes.
pub(super) const SUBJECT_SCRIPT: &str = r#"
if grep -q EXPLOIT "$1"; then
  cp "$1" "$2"
  exit 1
fi
cp "$1" "$2"
"#;

/// Runs `--command` under `--policy`, refusing everything for deny-all.
pub(super) const LAUNCHER_SCRIPT: &str = r#"
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
  exit 126
fi
exec $command
"#;

pub(super) const COPY_SESSION: &str = r#"
output_dir: out
workloads:
  - name: copy
    label: Copy
    program: /bin/sh
    args: ["copy.sh", "{input}", "{output}"]
    output: copy.out
    security:
      legitimate: { input: benign.txt }
      exploit: { input: exploit.txt }
configurations:
  - name: none
    label: None
  - name: landlock
    label: Landlock
    launcher:
      program: /bin/sh
      extra_args: ["landlock_service.sh"]
      policy: policy.txt
"#;

/// A config loader that returns a fixed configuration for tests.
pub(super) struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    pub(super) fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

/// Test world holding a scratch directory and the captured CLI output.
pub(super) struct TestWorld {
    pub config: Config,
    pub dir: TempDir,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<ExitCode>,
}

impl TestWorld {
    pub fn new() -> Result<Self> {
        Ok(Self {
            config: Config::default().with_log_filter("warn"),
            dir: TempDir::new().context("create scratch directory")?,
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: None,
        })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write_file(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.path(name);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    /// Lays out the copy workload, its launcher and a policy file.
    pub fn write_copy_session(&self, policy: &str) -> Result<()> {
        self.write_file("copy.sh", SUBJECT_SCRIPT)?;
        self.write_file("landlock_service.sh", LAUNCHER_SCRIPT)?;
        self.write_file("benign.txt", "frame data\n")?;
        self.write_file("exploit.txt", "EXPLOIT\n")?;
        self.write_file("policy.txt", &format!("{policy}\n"))?;
        self.write_file("session.yaml", COPY_SESSION)
    }

    /// Runs `command`, expanding `@name` tokens to scratch directory paths.
    pub fn run(&mut self, command: &str) -> Result<()> {
        self.stdout.clear();
        self.stderr.clear();
        let args = self.build_args(command);
        let loader = StaticConfigLoader::new(self.config.clone());
        let mut io = IoStreams::new(&mut self.stdout, &mut self.stderr, false);
        self.exit_code = Some(run_with_loader(args, &mut io, &loader));
        Ok(())
    }

    fn build_args(&self, command: &str) -> Vec<OsString> {
        let mut args = vec![OsString::from("sandbench")];
        args.extend(command.trim().trim_matches('"').split_whitespace().map(|token| {
            token.strip_prefix('@').map_or_else(
                || OsString::from(token),
                |name| self.path(name).into_os_string(),
            )
        }));
        args
    }

    pub fn stdout_text(&self) -> Result<String> {
        decode_utf8(self.stdout.clone(), "stdout")
    }

    pub fn stderr_text(&self) -> Result<String> {
        decode_utf8(self.stderr.clone(), "stderr")
    }

    pub fn stdout_json(&self) -> Result<serde_json::Value> {
        serde_json::from_slice(&self.stdout).context("stdout is JSON")
    }

    pub fn read_file(&self, name: &str) -> Result<String> {
        let path = self.path(name);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    pub fn assert_exit_code(&self, expected: u8) -> Result<()> {
        let exit = self.exit_code.context("exit code recorded")?;
        ensure!(
            exit == ExitCode::from(expected),
            "expected exit code {expected}, got {:?}; stderr: {}",
            exit,
            self.stderr_text().unwrap_or_default()
        );
        Ok(())
    }
}

pub(super) fn decode_utf8(buffer: Vec<u8>, label: &str) -> Result<String> {
    String::from_utf8(buffer).with_context(|| format!("{label} utf8"))
}

// ── Fixtures ───────────────────────────────────────────────────────────────────

#[fixture]
pub(super) fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new().expect("test world"))
}
