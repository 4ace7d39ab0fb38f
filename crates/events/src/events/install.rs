use appset_types::{Capability, VersionCode};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::FailureContext;

/// States of one install run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallPhase {
    Init,
    Resolving,
    SelectingApps,
    Staging,
    Committing,
    RollingBack,
    Done,
    Failed,
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Resolving => "resolving",
            Self::SelectingApps => "selecting apps",
            Self::Staging => "downloading and staging",
            Self::Committing => "committing",
            Self::RollingBack => "rolling back",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Install run events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InstallEvent {
    Started {
        capability: Capability,
        apps: Vec<String>,
    },

    PhaseChanged { phase: InstallPhase },

    /// The installed version already satisfies the release
    AppUpToDate {
        package: String,
        installed: VersionCode,
        available: VersionCode,
    },

    /// An install belonging to another user was made available
    ExistingLinked { package: String },

    AppSelected {
        package: String,
        version_code: VersionCode,
        artifacts: usize,
    },

    SessionOpened { package: String, session: String },

    ArtifactStaged {
        package: String,
        split: String,
        bytes: u64,
    },

    PackageProcessed {
        package: String,
        processed: usize,
        total: usize,
    },

    /// Sessions opened so far are being abandoned
    RollingBack { sessions: usize },

    Completed { installed: usize },

    Failed { failure: FailureContext },
}
