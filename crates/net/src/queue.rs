//! Single worker FIFO download queue with streaming digest checks

use crate::source::{checked_relative, RemoteSource};
use appset_errors::{Error, NetworkError};
use appset_hash::{Sha256Digest, StreamingHasher};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

type Marker = Box<dyn FnOnce() + Send>;

enum Job {
    Fetch {
        remote_path: String,
        expected: Option<Sha256Digest>,
        reply: oneshot::Sender<Result<PathBuf, Error>>,
    },
    Marker(Marker),
}

/// Downloads repository files one at a time, in submission order
///
/// Every job is written to `<dest_dir>/<remote_path>`. When an expected
/// digest is supplied the bytes are hashed as they are written and a
/// mismatch fails the job. Files are never removed here; the owner of
/// `dest_dir` cleans up.
///
/// Stopping is cooperative: the worker notices a stop request while it waits
/// for the next job or for network bytes, never in the middle of creating a
/// file or directory.
pub struct DownloadQueue {
    jobs: mpsc::UnboundedSender<Job>,
    stop: watch::Sender<bool>,
    worker: Option<JoinHandle<()>>,
    downloaded: Arc<AtomicU64>,
}

impl DownloadQueue {
    /// Spawn the worker on the current tokio runtime
    ///
    /// `downloaded` receives the byte count of every chunk written.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn start(
        source: Arc<dyn RemoteSource>,
        dest_dir: impl Into<PathBuf>,
        downloaded: Arc<AtomicU64>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop, stop_rx) = watch::channel(false);
        let worker = tokio::spawn(run_worker(
            source,
            dest_dir.into(),
            Arc::clone(&downloaded),
            rx,
            stop_rx,
        ));

        Self {
            jobs: tx,
            stop,
            worker: Some(worker),
            downloaded,
        }
    }

    /// Submit a download and get a handle to its eventual local file
    pub fn enqueue(
        &self,
        remote_path: impl Into<String>,
        expected: Option<Sha256Digest>,
    ) -> DownloadHandle {
        let remote_path = remote_path.into();
        let (reply, rx) = oneshot::channel();

        // A stopped worker drops the job and its reply sender, which the
        // handle reports as `WorkerStopped`.
        let _ = self.jobs.send(Job::Fetch {
            remote_path: remote_path.clone(),
            expected,
            reply,
        });

        DownloadHandle { remote_path, rx }
    }

    /// Run `f` on the worker once every previously enqueued job has finished
    pub fn enqueue_marker<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let _ = self.jobs.send(Job::Marker(Box::new(f)));
    }

    /// Total bytes written across all jobs so far
    #[must_use]
    pub fn downloaded_bytes(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    /// Ask the worker to stop and drop every outstanding job
    ///
    /// Pending handles resolve to `WorkerStopped`. Safe to call repeatedly.
    pub fn shutdown(&self) {
        self.stop.send_replace(true);
    }

    /// Stop the worker and wait until it has exited
    ///
    /// Once this returns nothing is writing below the destination directory.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "download worker ended abnormally");
            }
        }
    }
}

impl Drop for DownloadQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Future result of one enqueued download
#[derive(Debug)]
pub struct DownloadHandle {
    remote_path: String,
    rx: oneshot::Receiver<Result<PathBuf, Error>>,
}

impl DownloadHandle {
    #[must_use]
    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    /// Wait for the job to finish
    ///
    /// # Errors
    ///
    /// Returns the job's transport, I/O or corruption error, or
    /// `WorkerStopped` if the queue was shut down first.
    pub async fn wait(self) -> Result<PathBuf, Error> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::WorkerStopped {
                path: self.remote_path,
            }
            .into()),
        }
    }
}

async fn run_worker(
    source: Arc<dyn RemoteSource>,
    dest_dir: PathBuf,
    downloaded: Arc<AtomicU64>,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let job = tokio::select! {
            biased;
            () = stop_requested(&mut stop) => break,
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };
        match job {
            Job::Fetch {
                remote_path,
                expected,
                reply,
            } => {
                tracing::debug!(path = %remote_path, source = %source.describe(), "download started");
                let result = fetch(
                    source.as_ref(),
                    &dest_dir,
                    &remote_path,
                    expected.as_ref(),
                    &downloaded,
                    &mut stop,
                )
                .await;

                match &result {
                    Ok(path) => {
                        tracing::debug!(path = %remote_path, file = %path.display(), "download finished");
                    }
                    Err(e) => tracing::debug!(path = %remote_path, error = %e, "download failed"),
                }

                // The waiter may have gone away after an earlier failure.
                let _ = reply.send(result);
            }
            Job::Marker(f) => f(),
        }
    }
    tracing::debug!("download worker stopped");
}

/// Resolves once a stop was requested or the queue is gone
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            return;
        }
    }
}

fn worker_stopped(remote_path: &str) -> Error {
    NetworkError::WorkerStopped {
        path: remote_path.to_string(),
    }
    .into()
}

async fn fetch(
    source: &dyn RemoteSource,
    dest_dir: &Path,
    remote_path: &str,
    expected: Option<&Sha256Digest>,
    downloaded: &AtomicU64,
    stop: &mut watch::Receiver<bool>,
) -> Result<PathBuf, Error> {
    let dest = dest_dir.join(checked_relative(remote_path)?);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io_with_path(&e, parent))?;
    }

    let mut stream = tokio::select! {
        biased;
        () = stop_requested(stop) => return Err(worker_stopped(remote_path)),
        stream = source.open(remote_path) => stream?,
    };
    let mut file = tokio::fs::File::create(&dest)
        .await
        .map_err(|e| Error::io_with_path(&e, &dest))?;
    let mut hasher = expected.map(|_| StreamingHasher::new());

    loop {
        let next = tokio::select! {
            biased;
            () = stop_requested(stop) => {
                // Settle the write still queued on the blocking pool.
                let _ = file.flush().await;
                return Err(worker_stopped(remote_path));
            }
            next = stream.next() => next,
        };
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::io_with_path(&e, &dest))?;
        if let Some(hasher) = hasher.as_mut() {
            hasher.update(&chunk);
        }
        downloaded.fetch_add(chunk.len() as u64, Ordering::Relaxed);
    }
    file.flush()
        .await
        .map_err(|e| Error::io_with_path(&e, &dest))?;

    if let (Some(expected), Some(hasher)) = (expected, hasher) {
        let actual = hasher.finalize();
        if actual != *expected {
            return Err(NetworkError::CorruptedArtifact {
                path: remote_path.to_string(),
                expected: expected.to_hex(),
                actual: actual.to_hex(),
            }
            .into());
        }
    }

    Ok(dest)
}
