//! Operation orchestration error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpsError {
    #[error("context creation failed: {message}")]
    ContextCreationFailed { message: String },

    #[error("run worker terminated abnormally: {message}")]
    WorkerFailed { message: String },

    #[error("no run is active")]
    NoActiveRun,

    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

impl OpsError {
    #[must_use]
    pub fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::ContextCreationFailed { .. } => "ops.context_creation_failed",
            Self::WorkerFailed { .. } => "ops.worker_failed",
            Self::NoActiveRun => "ops.no_active_run",
            Self::SerializationError { .. } => "ops.serialization",
        };
        Some(code)
    }
}
