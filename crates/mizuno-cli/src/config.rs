//! Configuration loading helpers for the `mizuno` CLI.
//!
//! The logic here filters CLI arguments destined for `ortho_config` so the
//! loader only receives supported flags while clap parses the remaining
//! command tokens.

use std::ffi::{OsStr, OsString};

use mizuno_config::{Config, OrthoConfig};

use crate::AppError;

/// CLI flags recognised by the configuration loader.
///
/// Keep in sync with the fields of [`mizuno_config::Config`].
pub(crate) const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--host",
    "--port",
    "--pidfile",
    "--root",
    "--log",
    "--public",
    "--user",
    "--group",
    "--log-filter",
    "--log-format",
    "--probe-timeout",
];

pub(crate) trait ConfigLoader {
    /// Loads configuration for the CLI.
    ///
    /// Configuration flags must appear before the command word; anything
    /// after it is left to the command parser.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    let (flag, inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (text.as_ref(), false),
    };
    if CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !inline_value,
        }
    } else {
        FlagAction::Stop
    }
}

pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_start: usize,
}

/// Splits `args` into the loader's share (program name plus leading
/// configuration flags) and the index where command tokens begin.
pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some(program) = args.first() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_start: 0,
        };
    };

    let mut config_arguments = vec![program.clone()];
    let mut index = 1;
    while let Some(argument) = args.get(index) {
        match classify(argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.push(argument.clone());
                index += 1;
                if needs_value && let Some(value) = args.get(index) {
                    config_arguments.push(value.clone());
                    index += 1;
                }
            }
            FlagAction::Stop => break,
        }
    }

    ConfigArgumentSplit {
        config_arguments,
        command_start: index,
    }
}

/// Program name followed by the command tokens.
pub(crate) fn command_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    args.first()
        .into_iter()
        .chain(args.iter().skip(split.command_start.max(1)))
        .cloned()
        .collect()
}
