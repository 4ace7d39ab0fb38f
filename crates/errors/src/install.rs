//! Installation system error types

use std::borrow::Cow;

use thiserror::Error;

use crate::{FailureKind, UserFacingError};

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstallError {
    /// The package manager reported a definitive failure. The message is
    /// passed through verbatim.
    #[error("{message}")]
    Rejected { message: String },

    #[error("{package}: confirmation still pending after {attempts} prompts")]
    ConfirmationExhausted { package: String, attempts: u32 },

    #[error("{package}: package manager closed the status channel without a result")]
    StatusLost { package: String },

    #[error("session operation failed: {operation} on {session}: {message}")]
    SessionFailed {
        operation: String,
        session: String,
        message: String,
    },

    #[error("unknown install session: {session}")]
    UnknownSession { session: String },

    #[error("confirmation prompt failed: {message}")]
    ConfirmationFailed { message: String },

    #[error("filesystem operation failed: {operation} on {path}: {message}")]
    FilesystemError {
        operation: String,
        path: String,
        message: String,
    },
}

impl InstallError {
    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::FilesystemError { .. } => FailureKind::Transport,
            _ => FailureKind::OsRejection,
        }
    }
}

impl UserFacingError for InstallError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::ConfirmationExhausted { .. } => {
                Some("Approve the installation prompt, then run the operation again.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Rejected { .. } => "install.rejected",
            Self::ConfirmationExhausted { .. } => "install.confirmation_exhausted",
            Self::StatusLost { .. } => "install.status_lost",
            Self::SessionFailed { .. } => "install.session_failed",
            Self::UnknownSession { .. } => "install.unknown_session",
            Self::ConfirmationFailed { .. } => "install.confirmation_failed",
            Self::FilesystemError { .. } => "install.filesystem",
        };
        Some(code)
    }
}
