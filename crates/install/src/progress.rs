//! Progress counters shared between a running install and its observers

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Live progress of one install run
///
/// Only the run mutates these values; any thread may read a snapshot.
#[derive(Debug, Default)]
pub struct InstallProgress {
    downloaded_bytes: Arc<AtomicU64>,
    processed_installs: AtomicUsize,
    num_installs: AtomicUsize,
    downloads_finished: AtomicBool,
}

/// Point-in-time copy of `InstallProgress`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub downloaded_bytes: u64,
    pub processed_installs: usize,
    pub num_installs: usize,
    pub downloads_finished: bool,
}

impl InstallProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            downloaded_bytes: self.downloaded_bytes.load(Ordering::Relaxed),
            processed_installs: self.processed_installs.load(Ordering::Acquire),
            num_installs: self.num_installs.load(Ordering::Acquire),
            downloads_finished: self.downloads_finished.load(Ordering::Acquire),
        }
    }

    /// Counter handed to the download queue
    pub(crate) fn bytes_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.downloaded_bytes)
    }

    pub(crate) fn set_num_installs(&self, total: usize) {
        self.num_installs.store(total, Ordering::Release);
    }

    /// Returns the new number of processed installs
    pub(crate) fn record_processed(&self) -> usize {
        self.processed_installs.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn mark_downloads_finished(&self) {
        self.downloads_finished.store(true, Ordering::Release);
    }
}
