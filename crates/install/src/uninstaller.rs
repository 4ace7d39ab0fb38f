//! Removal of the managed set

use crate::cancel::until_cancelled;
use crate::{InstallConfig, UninstallSummary};
use appset_errors::Error;
use appset_events::{AppEvent, EventEmitter, EventSender, FailureContext, UninstallEvent};
use appset_platform::{await_outcome, ConfirmationLauncher, PackageInstaller};
use std::sync::Arc;
use tokio::sync::watch;

/// Removes managed apps in reverse install order, stopping at the first failure
pub struct UninstallCoordinator {
    config: InstallConfig,
    installer: Arc<dyn PackageInstaller>,
    launcher: Arc<dyn ConfirmationLauncher>,
    tx: Option<EventSender>,
    cancel: Option<watch::Receiver<bool>>,
}

impl std::fmt::Debug for UninstallCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UninstallCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EventEmitter for UninstallCoordinator {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl UninstallCoordinator {
    #[must_use]
    pub fn new(
        config: InstallConfig,
        installer: Arc<dyn PackageInstaller>,
        launcher: Arc<dyn ConfirmationLauncher>,
    ) -> Self {
        Self {
            config,
            installer,
            launcher,
            tx: None,
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Stop before the next removal completes once `cancel` turns true
    #[must_use]
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Remove every managed app installed for the current user
    ///
    /// Elevated runs remove apps directly; standard runs ask the user for
    /// each one. Apps later in the install order go first.
    ///
    /// # Errors
    ///
    /// Returns the first failed removal. Apps after it in removal order are
    /// left untouched.
    pub async fn run(&self) -> Result<UninstallSummary, Error> {
        let packages: Vec<String> = self
            .config
            .managed
            .uninstall_order()
            .map(str::to_string)
            .collect();
        self.emit(AppEvent::Uninstall(UninstallEvent::Started {
            packages: packages.clone(),
        }));

        let mut summary = UninstallSummary::default();
        for package in packages {
            let removed =
                until_cancelled(self.cancel.as_ref(), self.remove_one(&package, &mut summary))
                    .await;
            if let Err(e) = removed {
                tracing::error!(package = %package, error = %e, "uninstall aborted");
                self.emit(AppEvent::Uninstall(UninstallEvent::Failed {
                    package: Some(package),
                    failure: FailureContext::from_error(&e),
                }));
                return Err(e);
            }
        }

        tracing::info!(
            removed = summary.removed.len(),
            skipped = summary.skipped.len(),
            "uninstall finished"
        );
        self.emit(AppEvent::Uninstall(UninstallEvent::Completed {
            removed: summary.removed.len(),
        }));
        Ok(summary)
    }

    async fn remove_one(&self, package: &str, summary: &mut UninstallSummary) -> Result<(), Error> {
        if self
            .installer
            .installed_version(package, false)
            .await?
            .is_none()
        {
            tracing::debug!(package, "not installed, skipping");
            self.emit(AppEvent::Uninstall(UninstallEvent::Skipped {
                package: package.to_string(),
            }));
            summary.skipped.push(package.to_string());
            return Ok(());
        }

        let direct = self.config.capability.is_elevated();
        self.emit(AppEvent::Uninstall(UninstallEvent::Removing {
            package: package.to_string(),
            direct,
        }));

        let status = if direct {
            self.installer.uninstall_existing(package).await?
        } else {
            self.installer.request_uninstall(package).await?
        };
        await_outcome(
            status,
            self.launcher.as_ref(),
            self.config.max_user_actions,
            package,
        )
        .await?;

        self.emit(AppEvent::Uninstall(UninstallEvent::Removed {
            package: package.to_string(),
        }));
        summary.removed.push(package.to_string());
        Ok(())
    }
}
