//! Configuration loading helpers for the `sandbench` CLI.
//!
//! Flags destined for `ortho-config` are peeled off the front of the argument
//! list so the loader only sees options it understands while clap parses the
//! subcommand and its arguments.

use std::ffi::{OsStr, OsString};

use ortho_config::OrthoConfig;
use sandbench_config::Config;

use crate::AppError;

pub(crate) trait ConfigLoader {
    /// Loads configuration for the CLI.
    ///
    /// Configuration flags (listed in `CONFIG_CLI_FLAGS`) must appear before
    /// the subcommand. Anything after the first unrecognised token belongs to
    /// the command.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

impl OrthoConfigLoader {
    fn process_config_flag(argument: &OsStr) -> FlagAction {
        let argument_text = argument.to_string_lossy();
        let Some(body) = argument_text.strip_prefix("--") else {
            return FlagAction::Skip;
        };

        let (flag, has_inline_value) = body
            .split_once('=')
            .map_or((body, false), |(name, _)| (name, true));

        if super::CONFIG_CLI_FLAGS
            .iter()
            .any(|known| known.strip_prefix("--") == Some(flag))
        {
            return FlagAction::Include {
                needs_value: !has_inline_value,
            };
        }

        FlagAction::Skip
    }
}

pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_arguments: Vec<OsString>,
}

/// Separates leading configuration flags from the command tokens.
///
/// Both halves keep the program name in first position so each can be fed
/// to its own parser.
pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let mut remaining = args.iter();
    let Some(program) = remaining.next() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_arguments: Vec::new(),
        };
    };

    let mut config_arguments = vec![program.clone()];
    let mut command_arguments = vec![program.clone()];
    let mut pending_value = false;

    for argument in remaining.by_ref() {
        if pending_value {
            config_arguments.push(argument.clone());
            pending_value = false;
            continue;
        }
        match OrthoConfigLoader::process_config_flag(argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.push(argument.clone());
                pending_value = needs_value;
            }
            FlagAction::Skip => {
                command_arguments.push(argument.clone());
                break;
            }
        }
    }
    command_arguments.extend(remaining.cloned());

    ConfigArgumentSplit {
        config_arguments,
        command_arguments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn os(values: &[&str]) -> Vec<OsString> {
        values.iter().map(OsString::from).collect()
    }

    #[rstest]
    #[case("--log-filter=debug", FlagAction::Include { needs_value: false })]
    #[case("--log-filter", FlagAction::Include { needs_value: true })]
    #[case("--timeout-secs", FlagAction::Include { needs_value: true })]
    #[case("--unknown", FlagAction::Skip)]
    #[case("report", FlagAction::Skip)]
    #[case("-v", FlagAction::Skip)]
    fn classifies_flags(#[case] argument: &str, #[case] expected: FlagAction) {
        let action = OrthoConfigLoader::process_config_flag(OsStr::new(argument));
        assert_eq!(action, expected);
    }

    #[test]
    fn leading_flags_go_to_the_loader() {
        let args = os(&[
            "sandbench",
            "--log-filter",
            "debug",
            "--timeout-secs=5",
            "aggregate",
            "bench.csv",
        ]);
        let split = split_config_arguments(&args);
        assert_eq!(
            split.config_arguments,
            os(&["sandbench", "--log-filter", "debug", "--timeout-secs=5"])
        );
        assert_eq!(
            split.command_arguments,
            os(&["sandbench", "aggregate", "bench.csv"])
        );
    }

    #[test]
    fn flags_after_the_subcommand_stay_with_the_command() {
        let args = os(&["sandbench", "aggregate", "--log-filter", "debug"]);
        let split = split_config_arguments(&args);
        assert_eq!(split.config_arguments, os(&["sandbench"]));
        assert_eq!(
            split.command_arguments,
            os(&["sandbench", "aggregate", "--log-filter", "debug"])
        );
    }

    #[test]
    fn empty_arguments_split_into_nothing() {
        let split = split_config_arguments(&[]);
        assert!(split.config_arguments.is_empty());
        assert!(split.command_arguments.is_empty());
    }
}
