//! Command-line runtime for the quorate cluster client.
//!
//! The runtime owns argument parsing, configuration bootstrapping, logging
//! setup, and command execution. It can be driven from the binary entrypoint
//! or from tests, where configuration loading and output streams are
//! substituted.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

mod cli;
mod commands;
mod config;
mod errors;
mod telemetry;

#[cfg(test)]
mod tests;

use cli::Cli;
use config::{ConfigLoader, OrthoConfigLoader, prepare_cli_arguments, split_config_arguments};
use errors::AppError;
pub use telemetry::TelemetryError;

/// CLI flags recognised by the configuration loader.
///
/// Keep in step with the fields of `quorate_config::Config`.
pub(crate) const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--client-socket",
    "--admin-socket",
    "--log-filter",
    "--log-format",
];

const CLI_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::cli");

/// Output writers handed to the runtime.
pub(crate) struct IoStreams<'a, W: Write, E: Write> {
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
}

impl<'a, W: Write, E: Write> IoStreams<'a, W, E> {
    pub(crate) const fn new(stdout: &'a mut W, stderr: &'a mut E) -> Self {
        Self { stdout, stderr }
    }
}

/// Runs the CLI using the provided arguments and output handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdout, stderr);
    run_with_loader(args, &mut io, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
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
    let args: Vec<OsString> = args.into_iter().collect();
    match try_run(&args, io, loader) {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::CliUsage(error)) if !error.use_stderr() => {
            emit(&mut *io.stdout, &error.render());
            ExitCode::SUCCESS
        }
        Err(error) => {
            emit(&mut *io.stderr, &error);
            ExitCode::FAILURE
        }
    }
}

fn try_run<W, E, L>(
    args: &[OsString],
    io: &mut IoStreams<'_, W, E>,
    loader: &L,
) -> Result<(), AppError>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let split = split_config_arguments(args);
    let cli =
        Cli::try_parse_from(prepare_cli_arguments(args, &split)).map_err(AppError::CliUsage)?;
    let config = loader.load(&split.config_arguments)?;
    telemetry::initialise(&config)?;
    debug!(target: CLI_TARGET, command = ?cli.command, "running command");
    commands::execute(&cli.command, &config, &mut *io.stdout)
}

fn emit<S: Write>(stream: &mut S, message: &dyn std::fmt::Display) {
    if let Err(error) = writeln!(stream, "{message}") {
        debug!(target: CLI_TARGET, %error, "failed to write CLI message");
    }
}
