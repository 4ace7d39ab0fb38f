//! Types for operations and results

use appset_errors::UserFacingError;
use appset_install::{InstallSummary, ProgressSnapshot, UninstallSummary};
use appset_types::VersionCode;
use serde::Serialize;

/// Installed state of one managed application
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppStatus {
    pub package: String,
    /// Version installed for the current user
    pub installed: Option<VersionCode>,
}

/// What a finished run produced
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "summary", rename_all = "snake_case")]
pub enum RunSummary {
    Install(InstallSummary),
    Uninstall(UninstallSummary),
}

/// Terminal outcome of a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded { summary: RunSummary },
    Failed {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl RunOutcome {
    pub(crate) fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::Failed {
            message: error.user_message().into_owned(),
            code: error.user_code().map(str::to_string),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Answer to a request to start a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunRequest {
    Started,
    /// Another run is still active; nothing was started
    Ignored,
}

/// What the run manager is doing right now
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Idle { last_outcome: Option<RunOutcome> },
    Installing(ProgressSnapshot),
    Uninstalling,
}
