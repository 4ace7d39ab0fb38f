//! Package manager operations consumed by the coordinators

use crate::status::StatusReceiver;
use appset_errors::InstallError;
use appset_types::VersionCode;
use async_trait::async_trait;
use std::fmt;
use std::pin::Pin;
use tokio::io::AsyncWrite;

/// Package manager handle for one staged install session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// What a per-package session is going to install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub package: String,
    pub version_code: VersionCode,
}

impl SessionParams {
    #[must_use]
    pub fn new(package: impl Into<String>, version_code: VersionCode) -> Self {
        Self {
            package: package.into(),
            version_code,
        }
    }
}

/// Write slot for one split inside a session
///
/// Callers must `shutdown()` the writer once all bytes are written.
pub type SessionWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// Operations on the device package manager
///
/// Methods returning a `StatusReceiver` complete asynchronously: the call
/// only submits the request, and the final result arrives on the channel.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Installed version of `package`, for the current user or for any user
    async fn installed_version(
        &self,
        package: &str,
        any_user: bool,
    ) -> Result<Option<VersionCode>, InstallError>;

    /// Create a parent session whose children commit as one unit
    async fn create_group_session(&self) -> Result<SessionId, InstallError>;

    /// Create a per-package session, optionally as a child of `parent`
    async fn create_session(
        &self,
        params: SessionParams,
        parent: Option<SessionId>,
    ) -> Result<SessionId, InstallError>;

    /// Open a writer for `split_name`, which will receive exactly `length` bytes
    async fn open_write(
        &self,
        session: SessionId,
        split_name: &str,
        length: u64,
    ) -> Result<SessionWriter, InstallError>;

    /// Submit a session (or group) for installation
    async fn commit(&self, session: SessionId) -> Result<StatusReceiver, InstallError>;

    /// Discard a session and everything staged in it
    async fn abandon(&self, session: SessionId) -> Result<(), InstallError>;

    /// Make a package already installed for another user available to this one
    async fn install_existing(&self, package: &str) -> Result<StatusReceiver, InstallError>;

    /// Remove a package for the current user without confirmation
    async fn uninstall_existing(&self, package: &str) -> Result<StatusReceiver, InstallError>;

    /// Ask for removal of a package through the user confirmation flow
    async fn request_uninstall(&self, package: &str) -> Result<StatusReceiver, InstallError>;
}
