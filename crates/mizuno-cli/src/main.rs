//! Binary entrypoint for `mizuno`.
//!
//! Delegates to [`mizuno_cli::run`], which loads configuration and either
//! serves in the foreground or drives a lifecycle command.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Unlocked handles: the served process logs to stderr from worker threads.
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    mizuno_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
