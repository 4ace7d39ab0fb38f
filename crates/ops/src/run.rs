//! At most one active run, observable from any thread
//!
//! A run executes on its own tokio task. Observers poll `status()` for a
//! progress snapshot and `wait()` for the terminal outcome. Requests to start
//! a run while one is active are ignored.
//!
//! Cancelling raises the run's cancel flag and gives it `CANCEL_GRACE` to roll
//! back and clean up before the task is aborted.

use crate::large_ops::{install_with, uninstall_with};
use crate::{OpsCtx, RunOutcome, RunRequest, RunStatus, RunSummary};
use appset_errors::{Error, OpsError};
use appset_install::InstallProgress;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// How long a cancelled run may take to wind down before it is aborted
pub const CANCEL_GRACE: Duration = Duration::from_secs(5);

enum RunKind {
    Install(Arc<InstallProgress>),
    Uninstall,
}

struct ActiveRun {
    id: Uuid,
    kind: RunKind,
    task: JoinHandle<()>,
    cancel: watch::Sender<bool>,
    outcome: watch::Receiver<Option<RunOutcome>>,
}

#[derive(Default)]
struct State {
    active: Option<ActiveRun>,
    last_outcome: Option<RunOutcome>,
}

/// Owner of the single active install or uninstall run
#[derive(Clone, Default)]
pub struct RunManager {
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for RunManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunManager")
            .field("active", &self.lock().active.as_ref().map(|run| run.id))
            .finish()
    }
}

impl RunManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start an install run unless one is active
    #[must_use = "the run may have been ignored"]
    pub fn start_install(&self, ctx: Arc<OpsCtx>) -> RunRequest {
        let (cancel, cancelled) = watch::channel(false);
        let coordinator = ctx.install_coordinator().with_cancel(cancelled);
        let progress = coordinator.progress();
        self.start(RunKind::Install(progress), cancel, async move {
            install_with(&ctx, coordinator)
                .await
                .map(RunSummary::Install)
        })
    }

    /// Start an uninstall run unless one is active
    #[must_use = "the run may have been ignored"]
    pub fn start_uninstall(&self, ctx: Arc<OpsCtx>) -> RunRequest {
        let (cancel, cancelled) = watch::channel(false);
        self.start(RunKind::Uninstall, cancel, async move {
            uninstall_with(&ctx, ctx.uninstall_coordinator().with_cancel(cancelled))
                .await
                .map(RunSummary::Uninstall)
        })
    }

    fn start<F>(&self, kind: RunKind, cancel: watch::Sender<bool>, run: F) -> RunRequest
    where
        F: Future<Output = Result<RunSummary, Error>> + Send + 'static,
    {
        let mut state = self.lock();
        if state.active.is_some() {
            tracing::info!("run already active, ignoring request");
            return RunRequest::Ignored;
        }

        let id = Uuid::new_v4();
        let (tx, rx) = watch::channel(None);
        let shared = Arc::clone(&self.state);

        // Completion takes the lock, so it cannot overtake the insert below.
        let task = tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(run).catch_unwind().await {
                Ok(Ok(summary)) => RunOutcome::Succeeded { summary },
                Ok(Err(e)) => RunOutcome::from_error(&e),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(run = %id, %message, "run panicked");
                    RunOutcome::from_error(&Error::from(OpsError::WorkerFailed { message }))
                }
            };
            {
                let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                if state.active.as_ref().is_some_and(|run| run.id == id) {
                    state.active = None;
                }
                state.last_outcome = Some(outcome.clone());
            }
            let _ = tx.send(Some(outcome));
        });

        tracing::debug!(run = %id, "run started");
        state.active = Some(ActiveRun {
            id,
            kind,
            task,
            cancel,
            outcome: rx,
        });
        RunRequest::Started
    }

    /// Snapshot of what is happening now
    #[must_use]
    pub fn status(&self) -> RunStatus {
        let state = self.lock();
        match &state.active {
            Some(ActiveRun {
                kind: RunKind::Install(progress),
                ..
            }) => RunStatus::Installing(progress.snapshot()),
            Some(ActiveRun {
                kind: RunKind::Uninstall,
                ..
            }) => RunStatus::Uninstalling,
            None => RunStatus::Idle {
                last_outcome: state.last_outcome.clone(),
            },
        }
    }

    /// Wait for the active run to end and return its outcome
    ///
    /// With no active run this returns the outcome of the last one.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::NoActiveRun` if no run has ever been started.
    pub async fn wait(&self) -> Result<RunOutcome, Error> {
        let mut receiver = {
            let state = self.lock();
            match &state.active {
                Some(run) => run.outcome.clone(),
                None => {
                    return state
                        .last_outcome
                        .clone()
                        .ok_or_else(|| OpsError::NoActiveRun.into())
                }
            }
        };

        let finished = receiver
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|outcome| (*outcome).clone());
        match finished {
            Some(outcome) => Ok(outcome),
            // Sender dropped without a value: the run was cancelled.
            None => self
                .lock()
                .last_outcome
                .clone()
                .ok_or_else(|| OpsError::NoActiveRun.into()),
        }
    }

    /// Stop the active run and wait for it to wind down
    ///
    /// The run stops at its next await point, rolls back open sessions and
    /// removes its scratch directory. A run still going after `CANCEL_GRACE`
    /// is aborted; blocking filesystem calls already handed off at that point
    /// may still finish after this returns. Returns whether a run was active.
    pub async fn cancel(&self) -> bool {
        let (id, mut outcome) = {
            let state = self.lock();
            let Some(run) = &state.active else {
                return false;
            };
            run.cancel.send_replace(true);
            (run.id, run.outcome.clone())
        };
        tracing::warn!(run = %id, "cancelling run");

        let settled = matches!(
            tokio::time::timeout(CANCEL_GRACE, outcome.wait_for(Option::is_some)).await,
            Ok(Ok(_))
        );
        if settled {
            return true;
        }

        let mut state = self.lock();
        if state.active.as_ref().is_some_and(|run| run.id == id) {
            if let Some(run) = state.active.take() {
                run.task.abort();
                tracing::warn!(run = %id, "run did not stop in time, aborted");
                state.last_outcome = Some(RunOutcome::from_error(&Error::Cancelled));
            }
        }
        true
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "run panicked".to_string()
    }
}
