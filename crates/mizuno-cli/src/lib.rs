//! Command-line runtime for `mizuno`.
//!
//! The runtime splits configuration flags from the command, loads layered
//! configuration, resolves it into [`ServiceOptions`], and then either serves
//! in the foreground or drives one lifecycle command against a daemonised
//! instance. It can be exercised from the binary entrypoint or from tests
//! with substituted configuration loaders and output streams.

use std::env;
use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;

use mizuno_config::ServiceOptions;
use mizuno_server::telemetry;

mod cli;
mod config;
mod errors;
mod lifecycle;

use cli::Cli;
use config::{command_arguments, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;
use lifecycle::{LifecycleCommand, LifecycleOutput, Report, SystemLifecycle};

struct CliRunner<'a, W: Write, E: Write, L: ConfigLoader> {
    output: LifecycleOutput<&'a mut W, &'a mut E>,
    loader: &'a L,
}

impl<'a, W, E, L> CliRunner<'a, W, E, L>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    fn new(stdout: &'a mut W, stderr: &'a mut E, loader: &'a L) -> Self {
        Self {
            output: LifecycleOutput::new(stdout, stderr),
            loader,
        }
    }

    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);

        let cli = match Cli::try_parse_from(command_arguments(&args, &split)) {
            Ok(cli) => cli,
            Err(error) => return self.clap_exit(&error),
        };

        let result = self
            .loader
            .load(&split.config_arguments)
            .and_then(|config| {
                let command = cli.into_command();
                let working_dir = env::current_dir().map_err(AppError::WorkingDirectory)?;
                let options = ServiceOptions::resolve(&config, command.target(), &working_dir)?;
                Ok((command, options))
            })
            .and_then(|(command, options)| match command.lifecycle() {
                Some(lifecycle) => self.lifecycle(lifecycle, options),
                None => serve(&options),
            });

        match result {
            Ok(report) => self.output.report(&report),
            Err(error) => self.output.report(&Report::failure(error.to_string())),
        }
    }

    fn lifecycle(
        &mut self,
        command: LifecycleCommand,
        options: ServiceOptions,
    ) -> Result<Report, AppError> {
        telemetry::initialise(&options, None)?;
        let controller = SystemLifecycle::from_options(options)?;
        Ok(controller.handle(command, &mut self.output)?)
    }

    /// Help and version go to stdout with a zero status; usage errors go to
    /// stderr with clap's status.
    fn clap_exit(&mut self, error: &clap::Error) -> ExitCode {
        let rendered = error.render();
        let written = match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                write!(self.output.stdout, "{rendered}")
            }
            _ => write!(self.output.stderr, "{rendered}"),
        };
        if written.is_err() {
            return ExitCode::FAILURE;
        }
        u8::try_from(error.exit_code()).map_or(ExitCode::FAILURE, ExitCode::from)
    }
}

fn serve(options: &ServiceOptions) -> Result<Report, AppError> {
    telemetry::initialise(options, options.log())?;
    mizuno_server::run(options)?;
    Ok(Report::success("mizuno stopped."))
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    CliRunner::new(stdout, stderr, loader).run(args)
}
