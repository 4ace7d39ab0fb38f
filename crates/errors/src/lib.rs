#![warn(mismatched_lifetime_syntaxes)]
#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for appset
//!
//! Errors are organized by domain. Every error is `Clone` so it can cross
//! task boundaries and be stored as the terminal outcome of a run.

use std::borrow::Cow;

use thiserror::Error;

pub mod config;
pub mod install;
pub mod manifest;
pub mod network;
pub mod ops;
pub mod signing;

pub use config::ConfigError;
pub use install::InstallError;
pub use manifest::ManifestError;
pub use network::NetworkError;
pub use ops::OpsError;
pub use signing::SigningError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("signing error: {0}")]
    Signing(#[from] SigningError),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("install error: {0}")]
    Install(#[from] InstallError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("ops error: {0}")]
    Ops(#[from] OpsError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {message}")]
    Io {
        #[cfg_attr(feature = "serde", serde(skip, default = "default_io_kind"))]
        kind: std::io::ErrorKind,
        message: String,
        path: Option<std::path::PathBuf>,
    },
}

/// Failure classes a run can end with.
///
/// Every fatal error maps onto exactly one of these. None of them is ever
/// retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Signature or content hash did not match
    Trust,
    /// Network or local I/O failed
    Transport,
    /// Manifest could not be parsed or violates its invariants
    Structural,
    /// The package manager reported a definitive failure
    OsRejection,
    /// Anything else (worker panics, cancellation, bugs)
    Internal,
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<std::path::PathBuf>) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: Some(path.into()),
        }
    }

    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Network(err) => err.kind(),
            Error::Signing(_) => FailureKind::Trust,
            Error::Manifest(_) => FailureKind::Structural,
            Error::Install(err) => err.kind(),
            Error::Io { .. } => FailureKind::Transport,
            Error::Config(_) | Error::Ops(_) | Error::Internal(_) | Error::Cancelled => {
                FailureKind::Internal
            }
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {err}"))
    }
}

/// Result type alias for appset operations
pub type Result<T> = std::result::Result<T, Error>;

/// Minimal interface for rendering user-facing error information.
pub trait UserFacingError {
    /// Short message suitable for display.
    fn user_message(&self) -> Cow<'_, str>;

    /// Optional remediation hint.
    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    /// Whether retrying the same operation is likely to succeed.
    fn is_retryable(&self) -> bool {
        false
    }

    /// Stable error code for structured reporting.
    fn user_code(&self) -> Option<&'static str> {
        None
    }
}

impl UserFacingError for Error {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Error::Network(err) => err.user_message(),
            Error::Install(err) => err.user_message(),
            Error::Io { message, .. } => Cow::Owned(message.clone()),
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Error::Network(err) => err.user_hint(),
            Error::Install(err) => err.user_hint(),
            Error::Signing(_) => {
                Some("The repository could not be authenticated. Check the configured public key.")
            }
            Error::Config(_) => Some("Check your appset configuration file."),
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Error::Network(err) => err.user_code(),
            Error::Signing(err) => err.user_code(),
            Error::Manifest(err) => err.user_code(),
            Error::Install(err) => err.user_code(),
            Error::Config(err) => err.user_code(),
            Error::Ops(err) => err.user_code(),
            Error::Internal(_) => Some("error.internal"),
            Error::Cancelled => Some("error.cancelled"),
            Error::Io { .. } => Some("error.io"),
        }
    }
}

#[cfg(feature = "serde")]
fn default_io_kind() -> std::io::ErrorKind {
    std::io::ErrorKind::Other
}
