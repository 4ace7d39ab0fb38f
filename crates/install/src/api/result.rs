use serde::Serialize;

/// What an install run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallSummary {
    /// Downloaded, staged and committed
    pub installed: Vec<String>,
    /// Made available from another user's install
    pub linked: Vec<String>,
    /// Already at or above the released version
    pub up_to_date: Vec<String>,
    pub downloaded_bytes: u64,
}

impl InstallSummary {
    /// Whether the run changed nothing on the device
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.installed.is_empty() && self.linked.is_empty()
    }
}

/// What an uninstall run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UninstallSummary {
    pub removed: Vec<String>,
    /// Not installed for the current user
    pub skipped: Vec<String>,
}
