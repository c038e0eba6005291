//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use quorate::ClientError;
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Connect(ClientError),
    #[error("{operation} failed: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: ClientError,
    },
    #[error("failed to serialise output: {0}")]
    Serialise(serde_json::Error),
    #[error("failed to write output: {0}")]
    WriteOutput(io::Error),
}

impl AppError {
    /// Wraps a session failure with the operation that raised it.
    pub(crate) const fn operation(operation: &'static str, source: ClientError) -> Self {
        Self::Operation { operation, source }
    }
}
