//! Declarative session model.
//!
//! A [`Session`] names the workloads under test, the enforcement
//! configurations they can be run under and, optionally, the security case
//! attached to each workload. Sessions are immutable once loaded: relative
//! paths are resolved against the session file's directory and the whole
//! document is validated before any process is launched, so configuration
//! mistakes surface as a [`SessionError`] instead of a half-finished run.
//!
//! ```yaml
//! output_dir: out
//! workloads:
//!   - name: convert_resize
//!     program: ./magick
//!     args: ["{input}", "-resize", "50%", "{output}"]
//!     output: resized.png
//!     benchmark_input: inputs/large.png
//! configurations:
//!   - name: none
//!   - name: landlock
//!     launcher: { program: ./landlock_service, policy: policy.json }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::classify::ExpectedOutcome;
use crate::error::SessionError;

/// Placeholder replaced by the input path in workload arguments.
pub const INPUT_PLACEHOLDER: &str = "{input}";
/// Placeholder replaced by the output path in workload arguments.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";
/// Name given to the implicit configuration used for unwrapped runs.
pub const UNSANDBOXED_CONFIGURATION: &str = "none";

const DEFAULT_OUTPUT_DIR: &str = "output";
const DEFAULT_POLICY_FLAG: &str = "--policy";
const DEFAULT_COMMAND_FLAG: &str = "--command";

/// A concrete program plus arguments, ready to be spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandLine {
    /// Creates a command line from a program and its arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Returns the program to execute.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Returns the arguments passed to the program.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Wraps this command in an enforcement launcher.
    ///
    /// The launcher receives its extra arguments, the policy flag and path,
    /// then the command flag followed by this command rendered as a single
    /// whitespace-separated string.
    #[must_use]
    pub fn wrap(&self, launcher: &Launcher) -> Self {
        let mut args = launcher.extra_args.clone();
        args.push(launcher.policy_flag.clone());
        args.push(launcher.policy.to_string_lossy().into_owned());
        args.push(launcher.command_flag.clone());
        args.push(self.to_string());
        Self {
            program: launcher.program.clone(),
            args,
        }
    }

    /// Ensures the command survives being flattened into one launcher string.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnwrappableArgument`] when the program or any
    /// argument contains whitespace.
    pub fn ensure_wrappable(&self, workload: &str) -> Result<(), SessionError> {
        let program = self.program.to_string_lossy();
        let offending = std::iter::once(&*program)
            .chain(self.args.iter().map(String::as_str))
            .find(|part| part.is_empty() || part.chars().any(char::is_whitespace));
        match offending {
            Some(argument) => Err(SessionError::UnwrappableArgument {
                workload: workload.to_owned(),
                argument: argument.to_owned(),
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// External enforcement binary that runs a command under a policy file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Launcher {
    program: PathBuf,
    policy: PathBuf,
    #[serde(default = "default_policy_flag")]
    policy_flag: String,
    #[serde(default = "default_command_flag")]
    command_flag: String,
    #[serde(default)]
    extra_args: Vec<String>,
}

fn default_policy_flag() -> String {
    DEFAULT_POLICY_FLAG.to_owned()
}

fn default_command_flag() -> String {
    DEFAULT_COMMAND_FLAG.to_owned()
}

impl Launcher {
    /// Creates a launcher using the default `--policy`/`--command` flags.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, policy: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            policy: policy.into(),
            policy_flag: default_policy_flag(),
            command_flag: default_command_flag(),
            extra_args: Vec::new(),
        }
    }

    /// Adds arguments placed before the policy flag.
    #[must_use]
    pub fn with_extra_args(mut self, extra_args: Vec<String>) -> Self {
        self.extra_args = extra_args;
        self
    }

    /// Returns the launcher executable.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Returns the policy file handed to the launcher.
    #[must_use]
    pub fn policy(&self) -> &Path {
        &self.policy
    }

    fn resolve(&mut self, base: &Path) {
        self.program = resolve_program(base, &self.program);
        self.policy = resolve_path(base, &self.policy);
    }
}

/// A named enforcement mode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    launcher: Option<Launcher>,
}

impl Configuration {
    /// Creates a configuration that runs subjects directly.
    #[must_use]
    pub fn unsandboxed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            launcher: None,
        }
    }

    /// Creates a configuration that runs subjects through a launcher.
    #[must_use]
    pub fn sandboxed(name: impl Into<String>, launcher: Launcher) -> Self {
        Self {
            name: name.into(),
            label: None,
            launcher: Some(launcher),
        }
    }

    /// Sets the display label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Returns the configuration name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the display label, falling back to the name.
    #[must_use]
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(self.name.as_str())
    }

    /// Returns the launcher, if this configuration wraps its subjects.
    #[must_use]
    pub const fn launcher(&self) -> Option<&Launcher> {
        self.launcher.as_ref()
    }
}

/// Legitimate input for the baseline phase.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LegitimateCase {
    /// Benign sample handed to the subject.
    pub input: PathBuf,
    /// Artifact to check instead of the `{output}` path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

/// Malicious input run without any enforcement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExploitCase {
    /// Exploit payload handed to the subject.
    pub input: PathBuf,
    /// Evidence artifact to observe instead of the `{output}` path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    /// Asserted outcome; when absent the phase is only observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<ExpectedOutcome>,
}

/// Malicious input run under an enforcement launcher.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProtectedCase {
    /// Configuration to protect with; defaults to the first one with a launcher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
    /// Payload override; defaults to the exploit input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
    /// Artifact that must not appear; defaults to the `{output}` path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    /// Expected outcome under enforcement.
    #[serde(default = "default_protected_expectation")]
    pub expect: ExpectedOutcome,
}

const fn default_protected_expectation() -> ExpectedOutcome {
    ExpectedOutcome::MustNotProduceArtifact
}

impl Default for ProtectedCase {
    fn default() -> Self {
        Self {
            configuration: None,
            input: None,
            artifact: None,
            expect: default_protected_expectation(),
        }
    }
}

/// The three inputs driving a workload through the security suite.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityCase {
    /// Baseline phase input.
    pub legitimate: LegitimateCase,
    /// Unprotected exploit phase input.
    pub exploit: ExploitCase,
    /// Protected exploit phase settings.
    #[serde(default)]
    pub protected: ProtectedCase,
}

impl SecurityCase {
    fn resolve(&mut self, base: &Path) {
        self.legitimate.input = resolve_path(base, &self.legitimate.input);
        self.legitimate.artifact = self
            .legitimate
            .artifact
            .as_deref()
            .map(|path| resolve_path(base, path));
        self.exploit.input = resolve_path(base, &self.exploit.input);
        self.exploit.artifact = self
            .exploit
            .artifact
            .as_deref()
            .map(|path| resolve_path(base, path));
        self.protected.input = self
            .protected
            .input
            .as_deref()
            .map(|path| resolve_path(base, path));
        self.protected.artifact = self
            .protected
            .artifact
            .as_deref()
            .map(|path| resolve_path(base, path));
    }
}

/// A named subject operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Workload {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    program: PathBuf,
    #[serde(default)]
    args: Vec<String>,
    output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    benchmark_input: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    security: Option<SecurityCase>,
}

impl Workload {
    /// Creates a workload from its command template.
    ///
    /// `args` may contain [`INPUT_PLACEHOLDER`] and [`OUTPUT_PLACEHOLDER`];
    /// `output` is the file name substituted for the latter.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        program: impl Into<PathBuf>,
        args: Vec<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            label: None,
            program: program.into(),
            args,
            output: output.into(),
            benchmark_input: None,
            security: None,
        }
    }

    /// Sets the display label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the input used for every benchmark repetition.
    #[must_use]
    pub fn with_benchmark_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.benchmark_input = Some(input.into());
        self
    }

    /// Attaches a security case.
    #[must_use]
    pub fn with_security(mut self, security: SecurityCase) -> Self {
        self.security = Some(security);
        self
    }

    /// Returns the workload name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the display label, falling back to the name.
    #[must_use]
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(self.name.as_str())
    }

    /// Returns the output file name substituted for `{output}`.
    #[must_use]
    pub const fn output(&self) -> &str {
        self.output.as_str()
    }

    /// Returns the security case, if any.
    #[must_use]
    pub const fn security(&self) -> Option<&SecurityCase> {
        self.security.as_ref()
    }

    /// Returns the input used for benchmarking.
    ///
    /// Falls back to the legitimate security input so every repetition of a
    /// pair always sees the same file.
    #[must_use]
    pub fn benchmark_input(&self) -> Option<&Path> {
        self.benchmark_input.as_deref().or_else(|| {
            self.security
                .as_ref()
                .map(|case| case.legitimate.input.as_path())
        })
    }

    /// Substitutes the placeholders and returns the concrete command.
    #[must_use]
    pub fn render(&self, input: &Path, output: &Path) -> CommandLine {
        let input_text = input.to_string_lossy();
        let output_text = output.to_string_lossy();
        let args = self
            .args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input_text)
                    .replace(OUTPUT_PLACEHOLDER, &output_text)
            })
            .collect();
        CommandLine::new(self.program.clone(), args)
    }

    fn resolve(&mut self, base: &Path) {
        self.program = resolve_program(base, &self.program);
        self.benchmark_input = self
            .benchmark_input
            .as_deref()
            .map(|path| resolve_path(base, path));
        if let Some(security) = self.security.as_mut() {
            security.resolve(base);
        }
    }
}

/// The declared workloads and configurations for one harness session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Session {
    #[serde(default = "default_output_dir")]
    output_dir: PathBuf,
    workloads: Vec<Workload>,
    configurations: Vec<Configuration>,
    #[serde(skip)]
    base_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

impl Session {
    /// Creates a session rooted at the current directory.
    ///
    /// Call [`Session::validate`] before handing the session to the suite or
    /// the sampler; [`Session::load`] does so automatically.
    #[must_use]
    pub fn new(workloads: Vec<Workload>, configurations: Vec<Configuration>) -> Self {
        Self {
            output_dir: default_output_dir(),
            workloads,
            configurations,
            base_dir: PathBuf::from("."),
        }
    }

    /// Sets the directory that receives per-phase and per-sample outputs.
    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Reads, resolves and validates a session file.
    ///
    /// Relative paths in the document are resolved against the absolute
    /// directory of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Read`] when the file cannot be read, or any
    /// error reported by [`Session::from_yaml`].
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let text = fs::read_to_string(path).map_err(|source| SessionError::Read {
            path: path.to_path_buf(),
            source: Arc::new(source),
        })?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        // Subjects run from the base directory, so it must not be relative
        // to the caller's working directory.
        let base_dir = std::path::absolute(parent).map_err(|source| SessionError::Read {
            path: path.to_path_buf(),
            source: Arc::new(source),
        })?;
        Self::from_yaml(&text, &base_dir)
    }

    /// Parses a YAML session, resolving relative paths against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Parse`] for malformed documents and any
    /// validation error reported by [`Session::validate`].
    pub fn from_yaml(text: &str, base_dir: &Path) -> Result<Self, SessionError> {
        let mut session: Self = serde_saphyr::from_str(text).map_err(|error| {
            SessionError::Parse {
                message: error.to_string(),
            }
        })?;
        session.resolve(base_dir);
        session.validate()?;
        Ok(session)
    }

    fn resolve(&mut self, base_dir: &Path) {
        self.base_dir = base_dir.to_path_buf();
        self.output_dir = resolve_path(base_dir, &self.output_dir);
        for workload in &mut self.workloads {
            workload.resolve(base_dir);
        }
        for configuration in &mut self.configurations {
            if let Some(launcher) = configuration.launcher.as_mut() {
                launcher.resolve(base_dir);
            }
        }
    }

    /// Checks the invariants that must hold before anything is launched.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant: empty workload or configuration
    /// sets, duplicate or unencodable names, missing policy files, or a
    /// security case whose protected phase cannot be enforced.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.workloads.is_empty() {
            return Err(SessionError::NoWorkloads);
        }
        if self.configurations.is_empty() {
            return Err(SessionError::NoConfigurations);
        }
        ensure_unique_names("workload", self.workloads.iter().map(Workload::name))?;
        ensure_unique_names(
            "configuration",
            self.configurations.iter().map(Configuration::name),
        )?;

        for configuration in &self.configurations {
            let Some(launcher) = configuration.launcher() else {
                continue;
            };
            if !launcher.policy().exists() {
                return Err(SessionError::MissingPolicy {
                    configuration: configuration.name().to_owned(),
                    path: launcher.policy().to_path_buf(),
                });
            }
        }

        for workload in &self.workloads {
            let Some(security) = workload.security() else {
                continue;
            };
            if security.protected.expect == ExpectedOutcome::MustSucceedWithArtifact {
                return Err(SessionError::InvalidProtectedExpectation {
                    workload: workload.name().to_owned(),
                });
            }
            self.protecting_configuration(workload)?;
        }
        Ok(())
    }

    /// Returns the declared workloads in declaration order.
    #[must_use]
    pub fn workloads(&self) -> &[Workload] {
        &self.workloads
    }

    /// Returns the declared configurations in declaration order.
    #[must_use]
    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    /// Looks up a workload by name.
    #[must_use]
    pub fn workload(&self, name: &str) -> Option<&Workload> {
        self.workloads.iter().find(|workload| workload.name() == name)
    }

    /// Looks up a configuration by name.
    #[must_use]
    pub fn configuration(&self, name: &str) -> Option<&Configuration> {
        self.configurations
            .iter()
            .find(|configuration| configuration.name() == name)
    }

    /// Returns the resolved output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Returns the directory relative paths were resolved against.
    ///
    /// Subjects are started with this directory as their working directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the configuration used for unwrapped runs.
    ///
    /// This is the first declared configuration without a launcher, or an
    /// implicit one named [`UNSANDBOXED_CONFIGURATION`].
    #[must_use]
    pub fn unsandboxed_configuration(&self) -> Configuration {
        self.configurations
            .iter()
            .find(|configuration| configuration.launcher().is_none())
            .cloned()
            .unwrap_or_else(|| Configuration::unsandboxed(UNSANDBOXED_CONFIGURATION))
    }

    /// Resolves the configuration that protects a workload's exploit phase.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownConfiguration`] when the named
    /// configuration does not exist and
    /// [`SessionError::ProtectionWithoutLauncher`] when it, or every declared
    /// configuration, lacks a launcher.
    pub fn protecting_configuration(
        &self,
        workload: &Workload,
    ) -> Result<&Configuration, SessionError> {
        let requested = workload
            .security()
            .and_then(|security| security.protected.configuration.as_deref());
        let configuration = match requested {
            Some(name) => {
                self.configuration(name)
                    .ok_or_else(|| SessionError::UnknownConfiguration {
                        name: name.to_owned(),
                    })?
            }
            None => self
                .configurations
                .iter()
                .find(|configuration| configuration.launcher().is_some())
                .ok_or_else(|| SessionError::ProtectionWithoutLauncher {
                    workload: workload.name().to_owned(),
                    configuration: String::from("<none declared>"),
                })?,
        };
        if configuration.launcher().is_none() {
            return Err(SessionError::ProtectionWithoutLauncher {
                workload: workload.name().to_owned(),
                configuration: configuration.name().to_owned(),
            });
        }
        Ok(configuration)
    }
}

fn ensure_unique_names<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), SessionError> {
    let mut seen = HashSet::new();
    for name in names {
        if !is_encodable_name(name) {
            return Err(SessionError::InvalidName {
                kind,
                name: name.to_owned(),
            });
        }
        if !seen.insert(name) {
            return Err(SessionError::DuplicateName {
                kind,
                name: name.to_owned(),
            });
        }
    }
    Ok(())
}

fn is_encodable_name(name: &str) -> bool {
    !name.trim().is_empty() && !name.contains([',', '\n', '\r'])
}

fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Bare program names are left for `PATH` lookup; anything with a directory
/// component is resolved like any other relative path.
fn resolve_program(base: &Path, program: &Path) -> PathBuf {
    let mut components = program.components();
    let bare = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if bare {
        program.to_path_buf()
    } else {
        resolve_path(base, program)
    }
}
