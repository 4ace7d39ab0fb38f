use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Manifest retrieval events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RepoEvent {
    /// Signature and manifest downloads were queued
    ResolveStarted { source: String },

    /// The manifest was authenticated and parsed
    Resolved { apps: usize, time: i64 },

    /// Download, verification or parsing failed
    Failed { failure: FailureContext },
}
