use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Download queue events, keyed by repository path
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DownloadEvent {
    Queued {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        expected_hash: Option<String>,
    },

    Completed { path: String },

    Failed {
        path: String,
        failure: FailureContext,
    },

    /// Every artifact queued for the run has been processed
    AllFinished { total_bytes: u64 },
}
