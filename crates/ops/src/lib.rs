#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! High-level operations orchestration for appset
//!
//! This crate sits between the CLI and the library crates. It wires an
//! `OpsCtx` from configuration, runs install and uninstall through the
//! coordinators and keeps at most one run active at a time.

mod context;
mod large_ops;
mod run;
mod small_ops;
mod types;

pub use context::{OpsContextBuilder, OpsCtx};
pub use run::RunManager;
pub use types::{AppStatus, RunOutcome, RunRequest, RunStatus, RunSummary};

pub use appset_install::ProgressSnapshot;

pub use large_ops::{install, uninstall};
pub use small_ops::status;

use appset_errors::Error;
use appset_install::{InstallSummary, UninstallSummary};

/// Operation result that can be serialized for CLI output
#[derive(Clone, Debug, serde::Serialize)]
#[serde(tag = "type", content = "data")]
pub enum OperationResult {
    /// Install run report
    InstallSummary(InstallSummary),
    /// Uninstall run report
    UninstallSummary(UninstallSummary),
    /// Installed versions of the managed set
    Status(Vec<AppStatus>),
    /// Failed run
    Failed {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl OperationResult {
    /// Convert to JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|e| {
            appset_errors::OpsError::SerializationError {
                message: e.to_string(),
            }
            .into()
        })
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

impl From<RunOutcome> for OperationResult {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Succeeded {
                summary: RunSummary::Install(summary),
            } => Self::InstallSummary(summary),
            RunOutcome::Succeeded {
                summary: RunSummary::Uninstall(summary),
            } => Self::UninstallSummary(summary),
            RunOutcome::Failed { message, code } => Self::Failed { message, code },
        }
    }
}
