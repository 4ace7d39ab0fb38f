use appset_types::{Capability, ManagedSet};
use std::path::PathBuf;

/// Install and uninstall run configuration
///
/// Capability is read once when a run starts.
#[derive(Clone, Debug)]
pub struct InstallConfig {
    /// What the package manager lets this process do
    pub capability: Capability,
    /// Applications handled, in install order
    pub managed: ManagedSet,
    /// Release channel to install from
    pub channel: String,
    /// Purged at the start and end of every install run
    pub scratch_dir: PathBuf,
    /// Upper bound on confirmation prompts per package manager request
    pub max_user_actions: u32,
    /// Chunk size used when copying downloaded files into sessions
    pub copy_buffer_size: usize,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            capability: Capability::Standard,
            managed: ManagedSet::default(),
            channel: "stable".to_string(),
            scratch_dir: std::env::temp_dir().join("appset-repo"),
            max_user_actions: 5,
            copy_buffer_size: 64 * 1024,
        }
    }
}

impl InstallConfig {
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = capability;
        self
    }

    #[must_use]
    pub fn with_managed(mut self, managed: ManagedSet) -> Self {
        self.managed = managed;
        self
    }

    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    #[must_use]
    pub fn with_scratch_dir(mut self, scratch_dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = scratch_dir.into();
        self
    }

    #[must_use]
    pub fn with_max_user_actions(mut self, max_user_actions: u32) -> Self {
        self.max_user_actions = max_user_actions;
        self
    }

    /// Set the staging copy chunk size (at least one byte)
    #[must_use]
    pub fn with_copy_buffer_size(mut self, size: usize) -> Self {
        self.copy_buffer_size = size.max(1);
        self
    }
}
