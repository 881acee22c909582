//! Precedence checks for the layered configuration loader.

use std::ffi::OsString;
use std::fs;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use ortho_config::OrthoConfig;
use sandbench_config::{Config, LogFormat, default_log_filter, default_log_format};

struct Harness {
    temp_dir: TempDir,
    cli_args: Vec<OsString>,
}

impl Harness {
    fn new() -> Self {
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("failed to create temporary directory: {error}"),
        };
        Self {
            temp_dir,
            cli_args: vec![OsString::from("sandbench")],
        }
    }

    fn write_config(&mut self, contents: &str) {
        let path = self.temp_dir.path().join("sandbench.toml");
        if let Err(error) = fs::write(&path, contents) {
            panic!("failed to write configuration: {error}");
        }
        self.cli_args.push(OsString::from("--config-path"));
        self.cli_args.push(path.into_os_string());
    }

    fn push_cli_arg(&mut self, arg: &str) {
        self.cli_args.push(OsString::from(arg));
    }

    fn load(&self) -> Config {
        match Config::load_from_iter(self.cli_args.clone()) {
            Ok(config) => config,
            Err(error) => panic!("configuration failed to load: {error}"),
        }
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[rstest]
fn built_in_defaults_apply_without_overrides(harness: Harness) {
    let config = harness.load();
    assert_eq!(config.log_filter(), default_log_filter());
    assert_eq!(config.log_format(), default_log_format());
}

#[rstest]
fn configuration_file_overrides_defaults(mut harness: Harness) {
    harness.write_config("log_format = \"json\"\ntimeout_secs = 12\n");
    let config = harness.load();
    assert_eq!(config.log_format(), LogFormat::Json);
    assert_eq!(config.timeout_secs(), 12);
}

#[rstest]
fn cli_flags_override_configuration_file(mut harness: Harness) {
    harness.write_config("log_filter = \"warn\"\n");
    harness.push_cli_arg("--log-filter");
    harness.push_cli_arg("debug");
    let config = harness.load();
    assert_eq!(config.log_filter(), "debug");
}
