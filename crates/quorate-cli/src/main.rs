//! Entry point for the `quorate` cluster client.
//!
//! The binary delegates to [`quorate_cli::run`], which loads configuration,
//! parses the subcommand, and talks to the cluster daemon.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    quorate_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
