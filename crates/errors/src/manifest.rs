//! Repository manifest error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ManifestError {
    #[error("failed to parse manifest: {message}")]
    ParseError { message: String },

    #[error("{app}/{channel}: {packages} packages but {hashes} hashes")]
    ArityMismatch {
        app: String,
        channel: String,
        packages: usize,
        hashes: usize,
    },

    #[error("{app}/{channel}: release lists no packages")]
    EmptyRelease { app: String, channel: String },

    #[error("{app}/{channel}: invalid hash {value:?}: {message}")]
    InvalidHash {
        app: String,
        channel: String,
        value: String,
        message: String,
    },

    #[error("application not in manifest: {app}")]
    MissingApp { app: String },

    #[error("application {app} has no {channel} release")]
    MissingChannel { app: String, channel: String },
}

impl ManifestError {
    #[must_use]
    pub fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::ParseError { .. } => "manifest.parse_error",
            Self::ArityMismatch { .. } => "manifest.arity_mismatch",
            Self::EmptyRelease { .. } => "manifest.empty_release",
            Self::InvalidHash { .. } => "manifest.invalid_hash",
            Self::MissingApp { .. } => "manifest.missing_app",
            Self::MissingChannel { .. } => "manifest.missing_channel",
        };
        Some(code)
    }
}
