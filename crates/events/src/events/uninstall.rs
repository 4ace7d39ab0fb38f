use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Uninstall run events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UninstallEvent {
    Started { packages: Vec<String> },

    /// Not installed for the current user
    Skipped { package: String },

    Removing { package: String, direct: bool },

    Removed { package: String },

    Completed { removed: usize },

    Failed {
        package: Option<String>,
        failure: FailureContext,
    },
}
