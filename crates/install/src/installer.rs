//! Install run coordination
//!
//! One run resolves the signed manifest, decides per managed app whether
//! anything has to be done, downloads and stages what is needed and commits
//! it. Elevated runs stage every app into children of one group session so
//! the whole set commits atomically; standard runs commit app by app and
//! leave earlier commits in place when a later app fails.

use crate::cancel::until_cancelled;
use crate::staging::{copy_into_session, ScratchDir, SessionSet};
use crate::{InstallConfig, InstallProgress, InstallSummary};
use appset_errors::Error;
use appset_events::{
    AppEvent, DownloadEvent, EventEmitter, EventSender, FailureContext, InstallEvent,
    InstallPhase, RepoEvent,
};
use appset_manifest::{ArtifactRef, ManifestResolver, Release};
use appset_net::{DownloadHandle, DownloadQueue, RemoteSource};
use appset_platform::{await_outcome, ConfirmationLauncher, PackageInstaller, SessionParams};
use appset_types::VersionCode;
use std::sync::Arc;
use tokio::sync::watch;

/// An app whose artifacts are queued for download
struct PendingApp {
    package: String,
    version_code: VersionCode,
    artifacts: Vec<(ArtifactRef, DownloadHandle)>,
}

pub struct InstallCoordinator {
    config: InstallConfig,
    source: Arc<dyn RemoteSource>,
    resolver: ManifestResolver,
    installer: Arc<dyn PackageInstaller>,
    launcher: Arc<dyn ConfirmationLauncher>,
    progress: Arc<InstallProgress>,
    tx: Option<EventSender>,
    cancel: Option<watch::Receiver<bool>>,
}

impl std::fmt::Debug for InstallCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallCoordinator")
            .field("config", &self.config)
            .field("source", &self.source.describe())
            .finish_non_exhaustive()
    }
}

impl EventEmitter for InstallCoordinator {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl InstallCoordinator {
    #[must_use]
    pub fn new(
        config: InstallConfig,
        source: Arc<dyn RemoteSource>,
        resolver: ManifestResolver,
        installer: Arc<dyn PackageInstaller>,
        launcher: Arc<dyn ConfirmationLauncher>,
    ) -> Self {
        Self {
            config,
            source,
            resolver,
            installer,
            launcher,
            progress: Arc::new(InstallProgress::new()),
            tx: None,
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Stop the run once `cancel` turns true
    ///
    /// The run fails with `Error::Cancelled` after rolling back open
    /// sessions, stopping the downloader and removing the scratch directory.
    #[must_use]
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Live counters for this coordinator's run
    #[must_use]
    pub fn progress(&self) -> Arc<InstallProgress> {
        Arc::clone(&self.progress)
    }

    /// Bring every managed app up to the released version
    ///
    /// The scratch directory is purged before the run and removed after it
    /// whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns the first failure. Trust failures (bad signature, hash
    /// mismatch) are never retried; uncommitted sessions are abandoned before
    /// the error is returned.
    pub async fn run(&self) -> Result<InstallSummary, Error> {
        self.emit(AppEvent::Install(InstallEvent::Started {
            capability: self.config.capability,
            apps: self
                .config
                .managed
                .install_order()
                .map(str::to_string)
                .collect(),
        }));
        self.emit_install_phase(InstallPhase::Init);
        tracing::info!(
            capability = %self.config.capability,
            channel = %self.config.channel,
            source = %self.source.describe(),
            "install run started"
        );

        let result = self.run_scoped().await;

        match &result {
            Ok(summary) => {
                self.emit_install_phase(InstallPhase::Done);
                self.emit(AppEvent::Install(InstallEvent::Completed {
                    installed: summary.installed.len(),
                }));
                tracing::info!(
                    installed = summary.installed.len(),
                    linked = summary.linked.len(),
                    up_to_date = summary.up_to_date.len(),
                    "install run finished"
                );
            }
            Err(e) => {
                self.emit_install_phase(InstallPhase::Failed);
                self.emit_install_failed(e);
                tracing::error!(error = %e, kind = ?e.kind(), "install run failed");
            }
        }
        result
    }

    async fn run_scoped(&self) -> Result<InstallSummary, Error> {
        let scratch = ScratchDir::create(&self.config.scratch_dir).await?;
        let queue = DownloadQueue::start(
            Arc::clone(&self.source),
            scratch.path(),
            self.progress.bytes_counter(),
        );

        let outcome = self.run_in(&queue).await;

        // The worker must be gone before its destination is deleted.
        queue.stop().await;
        if let Err(e) = scratch.remove().await {
            tracing::warn!(error = %e, "failed to remove scratch directory");
            self.emit_warning_with_context("failed to remove scratch directory", e.to_string());
        }

        outcome.map(|mut summary| {
            summary.downloaded_bytes = self.progress.snapshot().downloaded_bytes;
            summary
        })
    }

    async fn run_in(&self, queue: &DownloadQueue) -> Result<InstallSummary, Error> {
        self.emit_install_phase(InstallPhase::Resolving);
        self.emit(AppEvent::Repo(RepoEvent::ResolveStarted {
            source: self.source.describe(),
        }));
        let resolved = until_cancelled(self.cancel.as_ref(), self.resolver.resolve(queue)).await;
        let manifest = match resolved {
            Ok(manifest) => manifest,
            Err(e) => {
                self.emit(AppEvent::Repo(RepoEvent::Failed {
                    failure: FailureContext::from_error(&e),
                }));
                return Err(e);
            }
        };
        self.emit(AppEvent::Repo(RepoEvent::Resolved {
            apps: manifest.apps.len(),
            time: manifest.time,
        }));

        self.emit_install_phase(InstallPhase::SelectingApps);
        let mut summary = InstallSummary::default();
        let mut pending = Vec::new();
        for app in self.config.managed.install_order() {
            let release = manifest.release(app, &self.config.channel)?;
            let selected = until_cancelled(
                self.cancel.as_ref(),
                self.select(app, release, queue, &mut summary),
            )
            .await?;
            if let Some(selected) = selected {
                pending.push(selected);
            }
        }

        if pending.is_empty() {
            tracing::info!("every managed app is up to date");
            return Ok(summary);
        }

        self.progress.set_num_installs(pending.len());
        let progress = Arc::clone(&self.progress);
        let tx = self.tx.clone();
        queue.enqueue_marker(move || {
            progress.mark_downloads_finished();
            if let Some(tx) = &tx {
                tx.emit(AppEvent::Download(DownloadEvent::AllFinished {
                    total_bytes: progress.snapshot().downloaded_bytes,
                }));
            }
        });

        let mut sessions = SessionSet::new(Arc::clone(&self.installer));
        let staged = until_cancelled(
            self.cancel.as_ref(),
            self.stage_and_commit(pending, &mut sessions, &mut summary),
        )
        .await;
        match staged {
            Ok(()) => Ok(summary),
            Err(e) => {
                self.roll_back(&mut sessions).await;
                Err(e)
            }
        }
    }

    /// Decide what one app needs; returns it when artifacts were queued
    async fn select(
        &self,
        app: &str,
        release: &Release,
        queue: &DownloadQueue,
        summary: &mut InstallSummary,
    ) -> Result<Option<PendingApp>, Error> {
        let available = release.version_code;

        let current = self.installer.installed_version(app, false).await?;
        if let Some(installed) = current.filter(|v| v.meets(available)) {
            tracing::debug!(package = app, %installed, %available, "already up to date");
            self.emit(AppEvent::Install(InstallEvent::AppUpToDate {
                package: app.to_string(),
                installed,
                available,
            }));
            summary.up_to_date.push(app.to_string());
            return Ok(None);
        }

        if self.config.capability.is_elevated() {
            let other_user = self.installer.installed_version(app, true).await?;
            if other_user.is_some_and(|v| v.meets(available)) {
                let status = self.installer.install_existing(app).await?;
                await_outcome(
                    status,
                    self.launcher.as_ref(),
                    self.config.max_user_actions,
                    app,
                )
                .await?;
                tracing::info!(package = app, "linked install from another user");
                self.emit(AppEvent::Install(InstallEvent::ExistingLinked {
                    package: app.to_string(),
                }));
                summary.linked.push(app.to_string());
                return Ok(None);
            }
        }

        let artifacts: Vec<_> = release
            .artifacts(app)
            .into_iter()
            .map(|artifact| {
                self.emit(AppEvent::Download(DownloadEvent::Queued {
                    path: artifact.remote_path.clone(),
                    expected_hash: Some(artifact.expected_hash.to_hex()),
                }));
                let handle =
                    queue.enqueue(artifact.remote_path.clone(), Some(artifact.expected_hash));
                (artifact, handle)
            })
            .collect();

        self.emit(AppEvent::Install(InstallEvent::AppSelected {
            package: app.to_string(),
            version_code: available,
            artifacts: artifacts.len(),
        }));

        Ok(Some(PendingApp {
            package: app.to_string(),
            version_code: available,
            artifacts,
        }))
    }

    async fn stage_and_commit(
        &self,
        pending: Vec<PendingApp>,
        sessions: &mut SessionSet,
        summary: &mut InstallSummary,
    ) -> Result<(), Error> {
        self.emit_install_phase(InstallPhase::Staging);

        let group = if self.config.capability.is_elevated() {
            let group = self.installer.create_group_session().await?;
            sessions.track_group(group);
            Some(group)
        } else {
            None
        };

        let total = pending.len();
        let mut staged = Vec::with_capacity(total);
        for app in pending {
            let session = self
                .installer
                .create_session(SessionParams::new(&app.package, app.version_code), group)
                .await?;
            if group.is_none() {
                sessions.track(session);
            }
            self.emit(AppEvent::Install(InstallEvent::SessionOpened {
                package: app.package.clone(),
                session: session.to_string(),
            }));

            for (artifact, handle) in app.artifacts {
                let file = match handle.wait().await {
                    Ok(file) => file,
                    Err(e) => {
                        self.emit(AppEvent::Download(DownloadEvent::Failed {
                            path: artifact.remote_path,
                            failure: FailureContext::from_error(&e),
                        }));
                        return Err(e);
                    }
                };
                self.emit(AppEvent::Download(DownloadEvent::Completed {
                    path: artifact.remote_path.clone(),
                }));

                let bytes = copy_into_session(
                    self.installer.as_ref(),
                    session,
                    &artifact.split_name,
                    &file,
                    self.config.copy_buffer_size,
                )
                .await?;
                self.emit(AppEvent::Install(InstallEvent::ArtifactStaged {
                    package: app.package.clone(),
                    split: artifact.split_name,
                    bytes,
                }));
            }

            if group.is_none() {
                let status = self.installer.commit(session).await?;
                sessions.committed(session);
                await_outcome(
                    status,
                    self.launcher.as_ref(),
                    self.config.max_user_actions,
                    &app.package,
                )
                .await?;
                summary.installed.push(app.package.clone());
            }

            let processed = self.progress.record_processed();
            self.emit(AppEvent::Install(InstallEvent::PackageProcessed {
                package: app.package.clone(),
                processed,
                total,
            }));
            staged.push(app.package);
        }

        if let Some(group) = group {
            self.emit_install_phase(InstallPhase::Committing);
            let status = self.installer.commit(group).await?;
            sessions.committed(group);
            await_outcome(
                status,
                self.launcher.as_ref(),
                self.config.max_user_actions,
                &staged.join(", "),
            )
            .await?;
            summary.installed = staged;
        }

        Ok(())
    }

    async fn roll_back(&self, sessions: &mut SessionSet) {
        let open = sessions.len();
        if open == 0 {
            return;
        }
        self.emit_install_phase(InstallPhase::RollingBack);
        self.emit(AppEvent::Install(InstallEvent::RollingBack { sessions: open }));
        tracing::warn!(sessions = open, "abandoning uncommitted sessions");
        sessions.abandon_all(self.tx.as_ref()).await;
    }
}
