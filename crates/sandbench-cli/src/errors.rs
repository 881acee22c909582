//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use sandbench_harness::{LogError, ReportError, SamplerError, SessionError};
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("failed to initialise logging: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("invalid session: {0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Log(#[from] LogError),
    #[error("cannot build report: {0}")]
    Report(#[from] ReportError),
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(serde_json::Error),
    #[error("failed to write output: {0}")]
    WriteOutput(io::Error),
}

impl From<SamplerError> for AppError {
    fn from(error: SamplerError) -> Self {
        match error {
            SamplerError::Session(source) => Self::Session(source),
            SamplerError::Log(source) => Self::Log(source),
        }
    }
}

impl AppError {
    /// Returns the process exit status for errors raised before or instead
    /// of a run verdict.
    pub(crate) const fn exit_status(&self) -> u8 {
        match self {
            Self::WriteOutput(_) | Self::SerialiseOutput(_) => 1,
            _ => 2,
        }
    }
}
