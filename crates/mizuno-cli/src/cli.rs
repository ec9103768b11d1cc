//! CLI argument definitions for `mizuno`.
//!
//! Configuration flags are peeled off before clap sees the arguments (see
//! [`crate::config::split_config_arguments`]), so this parser only knows the
//! command word and its target.

use clap::{Parser, Subcommand};

use crate::lifecycle::LifecycleCommand;

const CONFIGURATION_HELP: &str = "\
Configuration flags must come before the command:
  --config-path <FILE>      configuration file (TOML)
  --host <HOST>             address to bind and probe [default: 127.0.0.1]
  --port <PORT>             port to bind and probe [default: 9292]
  --pidfile <FILE>          pid file, required by start/status/reload/stop/kill
  --root <DIR>              directory relative paths resolve against
  --log <FILE>              log file for the served process
  --public <DIR>            directory of static assets
  --user <NAME>             user to switch to after binding
  --group <NAME>            group to switch to after binding
  --log-filter <FILTER>     tracing filter [default: info]
  --log-format <FORMAT>     compact or json [default: compact]
  --probe-timeout <SECS>    liveness probe budget [default: 10]

Each flag may also be set as MIZUNO_<NAME> in the environment.";

/// Serve a web application and manage it as a daemon.
#[derive(Parser, Debug)]
#[command(
    name = "mizuno",
    version,
    disable_help_subcommand = true,
    after_help = CONFIGURATION_HELP
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<CliCommand>,
}

impl Cli {
    /// The command to run; a bare invocation serves the default target.
    pub(crate) fn into_command(self) -> CliCommand {
        self.command
            .unwrap_or(CliCommand::Serve { target: None })
    }
}

/// Commands understood by `mizuno`.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Launch the service in the background and wait until it answers.
    Start {
        /// Application file served at `/`, relative to the root.
        #[arg(value_name = "TARGET")]
        target: Option<String>,
    },
    /// Report whether the daemon is running and answering.
    Status,
    /// Ask the daemon to reload its application (SIGHUP).
    Reload,
    /// Stop the daemon (SIGKILL) and wait for it to go away.
    Stop,
    /// Terminate the daemon (SIGTERM) and wait for it to go away.
    Kill,
    /// Run the service in the foreground.
    Serve {
        /// Application file served at `/`, relative to the root.
        #[arg(value_name = "TARGET")]
        target: Option<String>,
    },
}

impl CliCommand {
    /// The lifecycle command, or `None` for `serve`.
    pub(crate) const fn lifecycle(&self) -> Option<LifecycleCommand> {
        match self {
            Self::Start { .. } => Some(LifecycleCommand::Start),
            Self::Status => Some(LifecycleCommand::Status),
            Self::Reload => Some(LifecycleCommand::Reload),
            Self::Stop => Some(LifecycleCommand::Stop),
            Self::Kill => Some(LifecycleCommand::Kill),
            Self::Serve { .. } => None,
        }
    }

    /// Application target named on the command line.
    pub(crate) fn target(&self) -> Option<&str> {
        match self {
            Self::Start { target } | Self::Serve { target } => target.as_deref(),
            Self::Status | Self::Reload | Self::Stop | Self::Kill => None,
        }
    }
}
