//! Network-related error types

use std::borrow::Cow;

use thiserror::Error;

use crate::{FailureKind, UserFacingError};

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NetworkError {
    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported protocol: {protocol}")]
    UnsupportedProtocol { protocol: String },

    #[error("HTTP error {status} for {url}")]
    HttpError { status: u16, url: String },

    #[error("corrupted artifact {path}: expected {expected}, got {actual}")]
    CorruptedArtifact {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("download worker stopped before {path} was fetched")]
    WorkerStopped { path: String },
}

impl NetworkError {
    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::CorruptedArtifact { .. } => FailureKind::Trust,
            Self::WorkerStopped { .. } => FailureKind::Internal,
            _ => FailureKind::Transport,
        }
    }
}

impl UserFacingError for NetworkError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::DownloadFailed(_) | Self::ConnectionRefused(_) | Self::HttpError { .. } => {
                Some("Check your network connection and try again.")
            }
            Self::CorruptedArtifact { .. } => {
                Some("The downloaded file does not match the signed repository metadata.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::DownloadFailed(_) => "network.download_failed",
            Self::ConnectionRefused(_) => "network.connection_refused",
            Self::InvalidUrl(_) => "network.invalid_url",
            Self::UnsupportedProtocol { .. } => "network.unsupported_protocol",
            Self::HttpError { .. } => "network.http_error",
            Self::CorruptedArtifact { .. } => "network.corrupted_artifact",
            Self::WorkerStopped { .. } => "network.worker_stopped",
        };
        Some(code)
    }
}
