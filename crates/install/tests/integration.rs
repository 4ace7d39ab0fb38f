//! Integration tests for install and uninstall runs

#[cfg(test)]
mod tests {
    use appset_errors::{Error, FailureKind, InstallError};
    use appset_events::{AppEvent, DownloadEvent, InstallEvent, InstallPhase};
    use appset_hash::Sha256Digest;
    use appset_install::{InstallConfig, InstallCoordinator, UninstallCoordinator};
    use appset_manifest::ManifestResolver;
    use appset_net::{ByteStream, LocalSource, RemoteSource};
    use appset_platform::{
        await_outcome, AutoConfirm, ConfirmationLauncher, DirectoryPackageInstaller,
        PackageInstaller, SessionId, SessionParams, SessionWriter, StatusReceiver, UserAction,
    };
    use appset_signing::testing::TestKeypair;
    use appset_signing::ContentVerifier;
    use appset_types::{Capability, ManagedSet, VersionCode};
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::task::{ready, Context, Poll};
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tokio::io::{AsyncWrite, AsyncWriteExt};
    use tokio::sync::{watch, Notify};

    const MANIFEST: &str = "metadata.json";
    const SIGNATURE: &str = "metadata.json.0.sig";

    /// Local repository that remembers every path it served
    struct RecordingSource {
        inner: LocalSource,
        opened: Mutex<Vec<String>>,
    }

    impl RecordingSource {
        fn opened(&self) -> Vec<String> {
            self.opened.lock().unwrap().clone()
        }

        fn artifacts(&self) -> Vec<String> {
            self.opened()
                .into_iter()
                .filter(|path| path.starts_with("packages/"))
                .collect()
        }
    }

    #[async_trait]
    impl RemoteSource for RecordingSource {
        async fn open(&self, relative_path: &str) -> Result<ByteStream, Error> {
            self.opened.lock().unwrap().push(relative_path.to_string());
            self.inner.open(relative_path).await
        }

        fn describe(&self) -> String {
            self.inner.describe()
        }
    }

    struct Decline;

    #[async_trait]
    impl ConfirmationLauncher for Decline {
        async fn launch(&self, action: UserAction) -> Result<(), InstallError> {
            action.decline();
            Ok(())
        }
    }

    /// Shows the prompt and never answers it
    struct Unanswered {
        shown: Arc<Notify>,
    }

    #[async_trait]
    impl ConfirmationLauncher for Unanswered {
        async fn launch(&self, _action: UserAction) -> Result<(), InstallError> {
            self.shown.notify_one();
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    struct Fixture {
        _temp: TempDir,
        repo: PathBuf,
        device: PathBuf,
        scratch: PathBuf,
        key: TestKeypair,
        source: Arc<RecordingSource>,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = tempdir().unwrap();
            let repo = temp.path().join("repo");
            let device = temp.path().join("device");
            std::fs::create_dir_all(&repo).unwrap();
            std::fs::create_dir_all(&device).unwrap();
            Self {
                scratch: temp.path().join("scratch"),
                source: Arc::new(RecordingSource {
                    inner: LocalSource::new(&repo),
                    opened: Mutex::new(Vec::new()),
                }),
                key: TestKeypair::from_seed(9),
                repo,
                device,
                _temp: temp,
            }
        }

        /// Publish a signed manifest with one single-split release per app
        fn publish(&self, releases: &[(&str, u64)]) {
            let mut apps = serde_json::Map::new();
            for (app, version_code) in releases {
                let split = format!("{app}.apk");
                let body = format!("{app} build {version_code}").into_bytes();
                let dir = self.repo.join(format!("packages/{app}/{version_code}"));
                std::fs::create_dir_all(&dir).unwrap();
                std::fs::write(dir.join(&split), &body).unwrap();

                apps.insert(
                    (*app).to_string(),
                    json!({
                        "stable": {
                            "packages": [split],
                            "hashes": [Sha256Digest::from_data(&body).to_hex()],
                            "versionCode": version_code,
                        }
                    }),
                );
            }
            let body = serde_json::to_vec(&json!({ "time": 1_700_000_000, "apps": apps })).unwrap();
            std::fs::write(self.repo.join(MANIFEST), &body).unwrap();
            std::fs::write(self.repo.join(SIGNATURE), self.key.signature_file(&body)).unwrap();
        }

        fn installer(&self, capability: Capability) -> DirectoryPackageInstaller {
            DirectoryPackageInstaller::new(&self.device, capability)
        }

        fn config(&self, capability: Capability, apps: &[&str]) -> InstallConfig {
            InstallConfig::default()
                .with_capability(capability)
                .with_managed(ManagedSet::new(apps.iter().copied()))
                .with_scratch_dir(&self.scratch)
                .with_copy_buffer_size(7)
        }

        fn coordinator(
            &self,
            config: InstallConfig,
            installer: Arc<dyn PackageInstaller>,
            launcher: Arc<dyn ConfirmationLauncher>,
        ) -> InstallCoordinator {
            let verifier = ContentVerifier::from_base64(&self.key.public_key_base64()).unwrap();
            let source: Arc<dyn RemoteSource> = self.source.clone();
            InstallCoordinator::new(
                config,
                source,
                ManifestResolver::new(verifier, MANIFEST, SIGNATURE),
                installer,
                launcher,
            )
        }
    }

    /// Install `package` directly through the package manager for `user`
    async fn preinstall(device: &Path, user: u32, package: &str, version_code: u64) {
        let installer = DirectoryPackageInstaller::for_user(device, Capability::Elevated, user);
        let session = installer
            .create_session(SessionParams::new(package, VersionCode::new(version_code)), None)
            .await
            .unwrap();
        let mut writer = installer.open_write(session, "base.apk", 4).await.unwrap();
        writer.write_all(b"apk!").await.unwrap();
        writer.shutdown().await.unwrap();
        let status = installer.commit(session).await.unwrap();
        await_outcome(status, &AutoConfirm, 5, package).await.unwrap();
    }

    async fn version_of(installer: &DirectoryPackageInstaller, package: &str) -> Option<u64> {
        installer
            .installed_version(package, false)
            .await
            .unwrap()
            .map(VersionCode::get)
    }

    #[tokio::test]
    async fn test_fresh_install_standard() {
        let fx = Fixture::new();
        fx.publish(&[("x", 5)]);
        preinstall(&fx.device, 0, "x", 3).await;

        let installer = fx.installer(Capability::Standard);
        let coordinator = fx.coordinator(
            fx.config(Capability::Standard, &["x"]),
            Arc::new(installer.clone()),
            Arc::new(AutoConfirm),
        );
        let progress = coordinator.progress();

        let summary = coordinator.run().await.unwrap();
        assert_eq!(summary.installed, vec!["x".to_string()]);
        assert_eq!(fx.source.artifacts(), vec!["packages/x/5/x.apk".to_string()]);
        assert_eq!(version_of(&installer, "x").await, Some(5));

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.processed_installs, 1);
        assert_eq!(snapshot.num_installs, 1);
        assert!(snapshot.downloads_finished);
        assert!(snapshot.downloaded_bytes > 0);
        assert_eq!(summary.downloaded_bytes, snapshot.downloaded_bytes);

        assert_eq!(installer.open_sessions(), 0);
        assert!(!fx.scratch.exists());
    }

    #[tokio::test]
    async fn test_up_to_date_is_noop() {
        let fx = Fixture::new();
        fx.publish(&[("x", 5)]);
        preinstall(&fx.device, 0, "x", 7).await;

        let installer = fx.installer(Capability::Standard);
        let coordinator = fx.coordinator(
            fx.config(Capability::Standard, &["x"]),
            Arc::new(installer.clone()),
            Arc::new(Decline),
        );

        let summary = coordinator.run().await.unwrap();
        assert!(summary.is_noop());
        assert_eq!(summary.up_to_date, vec!["x".to_string()]);
        assert!(fx.source.artifacts().is_empty());
        assert_eq!(
            fx.source.opened(),
            vec![SIGNATURE.to_string(), MANIFEST.to_string()]
        );
        assert_eq!(coordinator.progress().snapshot().num_installs, 0);
        assert_eq!(version_of(&installer, "x").await, Some(7));
        assert!(!fx.scratch.exists());
    }

    #[tokio::test]
    async fn test_downloads_follow_install_order() {
        let fx = Fixture::new();
        fx.publish(&[("c", 1), ("a", 1), ("b", 1)]);

        let installer = fx.installer(Capability::Elevated);
        let coordinator = fx.coordinator(
            fx.config(Capability::Elevated, &["a", "b", "c"]),
            Arc::new(installer.clone()),
            Arc::new(AutoConfirm),
        );

        let summary = coordinator.run().await.unwrap();
        assert_eq!(summary.installed, vec!["a", "b", "c"]);
        assert_eq!(
            fx.source.opened(),
            vec![
                SIGNATURE,
                MANIFEST,
                "packages/a/1/a.apk",
                "packages/b/1/b.apk",
                "packages/c/1/c.apk",
            ]
        );
        for app in ["a", "b", "c"] {
            assert_eq!(version_of(&installer, app).await, Some(1));
        }
    }

    #[tokio::test]
    async fn test_elevated_group_is_atomic_on_corruption() {
        let fx = Fixture::new();
        fx.publish(&[("a", 2), ("b", 2)]);
        std::fs::write(fx.repo.join("packages/b/2/b.apk"), b"tampered").unwrap();

        let installer = fx.installer(Capability::Elevated);
        let coordinator = fx.coordinator(
            fx.config(Capability::Elevated, &["a", "b"]),
            Arc::new(installer.clone()),
            Arc::new(AutoConfirm),
        );

        let err = coordinator.run().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Trust);
        assert_eq!(version_of(&installer, "a").await, None);
        assert_eq!(version_of(&installer, "b").await, None);
        assert_eq!(installer.open_sessions(), 0);
        assert!(!fx.scratch.exists());
    }

    #[tokio::test]
    async fn test_standard_keeps_earlier_commits() {
        let fx = Fixture::new();
        fx.publish(&[("a", 2), ("b", 2)]);
        std::fs::write(fx.repo.join("packages/b/2/b.apk"), b"tampered").unwrap();

        let installer = fx.installer(Capability::Standard);
        let coordinator = fx.coordinator(
            fx.config(Capability::Standard, &["a", "b"]),
            Arc::new(installer.clone()),
            Arc::new(AutoConfirm),
        );

        let err = coordinator.run().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Trust);
        assert_eq!(version_of(&installer, "a").await, Some(2));
        assert_eq!(version_of(&installer, "b").await, None);
        assert_eq!(installer.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_bad_signature_stops_before_downloads() {
        let fx = Fixture::new();
        fx.publish(&[("x", 5)]);
        let other = TestKeypair::from_seed(9).signature_file(b"something else");
        std::fs::write(fx.repo.join(SIGNATURE), other).unwrap();

        let installer = fx.installer(Capability::Standard);
        let coordinator = fx.coordinator(
            fx.config(Capability::Standard, &["x"]),
            Arc::new(installer.clone()),
            Arc::new(AutoConfirm),
        );

        let err = coordinator.run().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Trust);
        assert!(fx.source.artifacts().is_empty());
        assert_eq!(installer.open_sessions(), 0);
        assert!(!fx.scratch.exists());
    }

    #[tokio::test]
    async fn test_missing_release_is_structural() {
        let fx = Fixture::new();
        fx.publish(&[("x", 5)]);

        let installer = fx.installer(Capability::Standard);
        let coordinator = fx.coordinator(
            fx.config(Capability::Standard, &["x", "y"]),
            Arc::new(installer.clone()),
            Arc::new(AutoConfirm),
        );

        let err = coordinator.run().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Structural);
        assert_eq!(version_of(&installer, "x").await, None);
    }

    #[tokio::test]
    async fn test_declined_confirmation_is_rejection() {
        let fx = Fixture::new();
        fx.publish(&[("x", 5)]);

        let installer = fx.installer(Capability::Standard);
        let coordinator = fx.coordinator(
            fx.config(Capability::Standard, &["x"]),
            Arc::new(installer.clone()),
            Arc::new(Decline),
        );

        let err = coordinator.run().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::OsRejection);
        assert!(matches!(err, Error::Install(InstallError::Rejected { .. })));
        assert_eq!(version_of(&installer, "x").await, None);
    }

    #[tokio::test]
    async fn test_elevated_links_other_user_install() {
        let fx = Fixture::new();
        fx.publish(&[("x", 5)]);
        preinstall(&fx.device, 10, "x", 6).await;

        let installer = fx.installer(Capability::Elevated);
        let coordinator = fx.coordinator(
            fx.config(Capability::Elevated, &["x"]),
            Arc::new(installer.clone()),
            Arc::new(AutoConfirm),
        );

        let summary = coordinator.run().await.unwrap();
        assert_eq!(summary.linked, vec!["x".to_string()]);
        assert!(summary.installed.is_empty());
        assert!(fx.source.artifacts().is_empty());
        assert_eq!(version_of(&installer, "x").await, Some(6));
        assert_eq!(
            installer.installed_users("x").await.unwrap().into_iter().collect::<Vec<_>>(),
            vec![0, 10]
        );
    }

    #[tokio::test]
    async fn test_run_events() {
        let fx = Fixture::new();
        fx.publish(&[("x", 5)]);

        let (tx, mut rx) = appset_events::channel();
        let coordinator = fx
            .coordinator(
                fx.config(Capability::Standard, &["x"]),
                Arc::new(fx.installer(Capability::Standard)),
                Arc::new(AutoConfirm),
            )
            .with_event_sender(tx);
        coordinator.run().await.unwrap();
        drop(coordinator);

        let mut phases = Vec::new();
        let mut all_finished = false;
        while let Some(event) = rx.recv().await {
            match event {
                AppEvent::Install(InstallEvent::PhaseChanged { phase }) => phases.push(phase),
                AppEvent::Download(DownloadEvent::AllFinished { total_bytes }) => {
                    assert!(total_bytes > 0);
                    all_finished = true;
                }
                _ => {}
            }
        }
        assert!(all_finished);
        assert_eq!(
            phases,
            vec![
                InstallPhase::Init,
                InstallPhase::Resolving,
                InstallPhase::SelectingApps,
                InstallPhase::Staging,
                InstallPhase::Done,
            ]
        );
    }

    /// What a `Faulty` installer gets wrong
    enum Fault {
        /// Removing this package fails
        RefuseRemoval(&'static str),
        /// Writes into this split fail once `after` bytes are through
        BreakWrite { split: &'static str, after: usize },
        /// Every commit is consumed and reported as failed with this message
        RejectCommit(&'static str),
    }

    /// Delegates to a directory installer, except for one injected fault
    struct Faulty {
        inner: DirectoryPackageInstaller,
        fault: Fault,
        attempts: Mutex<Vec<String>>,
    }

    impl Faulty {
        fn new(inner: DirectoryPackageInstaller, fault: Fault) -> Self {
            Self {
                inner,
                fault,
                attempts: Mutex::new(Vec::new()),
            }
        }
    }

    fn failed_status(message: &str) -> StatusReceiver {
        let (tx, rx) = appset_platform::status_channel();
        tx.send(appset_platform::InstallStatus::Failure {
            message: message.to_string(),
        })
        .unwrap();
        rx
    }

    /// Passes `remaining` bytes through, then fails every write
    struct BrokenWriter {
        inner: SessionWriter,
        remaining: usize,
    }

    impl AsyncWrite for BrokenWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            let this = self.get_mut();
            if this.remaining == 0 {
                return Poll::Ready(Err(std::io::Error::other("device storage went away")));
            }
            let len = buf.len().min(this.remaining);
            let written = ready!(this.inner.as_mut().poll_write(cx, &buf[..len]))?;
            this.remaining -= written;
            Poll::Ready(Ok(written))
        }

        fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            self.get_mut().inner.as_mut().poll_flush(cx)
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            self.get_mut().inner.as_mut().poll_shutdown(cx)
        }
    }

    #[async_trait]
    impl PackageInstaller for Faulty {
        async fn installed_version(
            &self,
            package: &str,
            any_user: bool,
        ) -> Result<Option<VersionCode>, InstallError> {
            self.inner.installed_version(package, any_user).await
        }

        async fn create_group_session(&self) -> Result<SessionId, InstallError> {
            self.inner.create_group_session().await
        }

        async fn create_session(
            &self,
            params: SessionParams,
            parent: Option<SessionId>,
        ) -> Result<SessionId, InstallError> {
            self.inner.create_session(params, parent).await
        }

        async fn open_write(
            &self,
            session: SessionId,
            split_name: &str,
            length: u64,
        ) -> Result<SessionWriter, InstallError> {
            let writer = self.inner.open_write(session, split_name, length).await?;
            match self.fault {
                Fault::BreakWrite { split, after } if split == split_name => {
                    Ok(Box::pin(BrokenWriter {
                        inner: writer,
                        remaining: after,
                    }))
                }
                _ => Ok(writer),
            }
        }

        async fn commit(&self, session: SessionId) -> Result<StatusReceiver, InstallError> {
            if let Fault::RejectCommit(message) = self.fault {
                self.inner.abandon(session).await?;
                return Ok(failed_status(message));
            }
            self.inner.commit(session).await
        }

        async fn abandon(&self, session: SessionId) -> Result<(), InstallError> {
            self.inner.abandon(session).await
        }

        async fn install_existing(&self, package: &str) -> Result<StatusReceiver, InstallError> {
            self.inner.install_existing(package).await
        }

        async fn uninstall_existing(&self, package: &str) -> Result<StatusReceiver, InstallError> {
            self.attempts.lock().unwrap().push(package.to_string());
            match self.fault {
                Fault::RefuseRemoval(refused) if refused == package => {
                    Ok(failed_status("DELETE_FAILED_DEVICE_POLICY_MANAGER"))
                }
                _ => self.inner.uninstall_existing(package).await,
            }
        }

        async fn request_uninstall(&self, package: &str) -> Result<StatusReceiver, InstallError> {
            self.inner.request_uninstall(package).await
        }
    }

    fn staged_sessions(device: &Path) -> usize {
        std::fs::read_dir(device.join("sessions"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_elevated_rolls_back_broken_copy() {
        let fx = Fixture::new();
        fx.publish(&[("a", 2), ("b", 2)]);

        let installer = fx.installer(Capability::Elevated);
        let faulty = Arc::new(Faulty::new(
            installer.clone(),
            Fault::BreakWrite {
                split: "b.apk",
                after: 3,
            },
        ));
        let coordinator = fx.coordinator(
            fx.config(Capability::Elevated, &["a", "b"]),
            faulty,
            Arc::new(AutoConfirm),
        );

        let err = coordinator.run().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Install(InstallError::SessionFailed { .. })
        ));
        assert!(err.to_string().contains("device storage went away"));
        assert_eq!(version_of(&installer, "a").await, None);
        assert_eq!(version_of(&installer, "b").await, None);
        assert_eq!(installer.open_sessions(), 0);
        assert_eq!(staged_sessions(&fx.device), 0);
        assert!(!fx.scratch.exists());
    }

    #[tokio::test]
    async fn test_standard_broken_copy_keeps_earlier_commit() {
        let fx = Fixture::new();
        fx.publish(&[("a", 2), ("b", 2)]);

        let installer = fx.installer(Capability::Standard);
        let faulty = Arc::new(Faulty::new(
            installer.clone(),
            Fault::BreakWrite {
                split: "b.apk",
                after: 0,
            },
        ));
        let coordinator = fx.coordinator(
            fx.config(Capability::Standard, &["a", "b"]),
            faulty,
            Arc::new(AutoConfirm),
        );

        let err = coordinator.run().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::OsRejection);
        assert_eq!(version_of(&installer, "a").await, Some(2));
        assert_eq!(version_of(&installer, "b").await, None);
        assert_eq!(installer.open_sessions(), 0);
        assert_eq!(staged_sessions(&fx.device), 0);
        assert!(!fx.scratch.exists());
    }

    #[tokio::test]
    async fn test_rejected_group_commit_surfaces_message() {
        let fx = Fixture::new();
        fx.publish(&[("a", 2), ("b", 2)]);

        let installer = fx.installer(Capability::Elevated);
        let faulty = Arc::new(Faulty::new(
            installer.clone(),
            Fault::RejectCommit("INSTALL_FAILED_INSUFFICIENT_STORAGE"),
        ));
        let (tx, mut rx) = appset_events::channel();
        let coordinator = fx
            .coordinator(
                fx.config(Capability::Elevated, &["a", "b"]),
                faulty,
                Arc::new(AutoConfirm),
            )
            .with_event_sender(tx);

        let err = coordinator.run().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::OsRejection);
        assert!(matches!(
            &err,
            Error::Install(InstallError::Rejected { message })
                if message == "INSTALL_FAILED_INSUFFICIENT_STORAGE"
        ));
        assert_eq!(version_of(&installer, "a").await, None);
        assert_eq!(version_of(&installer, "b").await, None);
        assert_eq!(installer.open_sessions(), 0);
        assert!(!fx.scratch.exists());

        drop(coordinator);
        let mut phases = Vec::new();
        while let Some(event) = rx.recv().await {
            if let AppEvent::Install(InstallEvent::PhaseChanged { phase }) = event {
                phases.push(phase);
            }
        }
        assert!(phases.contains(&InstallPhase::Committing));
        assert_eq!(phases.last(), Some(&InstallPhase::Failed));
    }

    #[tokio::test]
    async fn test_uninstall_reverse_order_aborts_on_failure() {
        let fx = Fixture::new();
        for app in ["a", "b", "c"] {
            preinstall(&fx.device, 0, app, 1).await;
        }

        let installer = Arc::new(Faulty::new(
            fx.installer(Capability::Elevated),
            Fault::RefuseRemoval("b"),
        ));
        let coordinator = UninstallCoordinator::new(
            fx.config(Capability::Elevated, &["a", "b", "c"]),
            installer.clone(),
            Arc::new(AutoConfirm),
        );

        let err = coordinator.run().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::OsRejection);
        assert_eq!(*installer.attempts.lock().unwrap(), vec!["c", "b"]);

        let check = fx.installer(Capability::Standard);
        assert_eq!(version_of(&check, "c").await, None);
        assert_eq!(version_of(&check, "b").await, Some(1));
        assert_eq!(version_of(&check, "a").await, Some(1));
    }

    #[tokio::test]
    async fn test_uninstall_standard_skips_missing() {
        let fx = Fixture::new();
        preinstall(&fx.device, 0, "a", 1).await;

        let installer = fx.installer(Capability::Standard);
        let coordinator = UninstallCoordinator::new(
            fx.config(Capability::Standard, &["a", "b"]),
            Arc::new(installer.clone()),
            Arc::new(AutoConfirm),
        );

        let summary = coordinator.run().await.unwrap();
        assert_eq!(summary.removed, vec!["a".to_string()]);
        assert_eq!(summary.skipped, vec!["b".to_string()]);
        assert_eq!(version_of(&installer, "a").await, None);
    }

    #[tokio::test]
    async fn test_cancel_during_prompt_cleans_up() {
        let fx = Fixture::new();
        fx.publish(&[("a", 2), ("b", 2)]);

        let installer = fx.installer(Capability::Standard);
        let shown = Arc::new(Notify::new());
        let (cancel, cancel_rx) = watch::channel(false);
        let coordinator = fx
            .coordinator(
                fx.config(Capability::Standard, &["a", "b"]),
                Arc::new(installer.clone()),
                Arc::new(Unanswered {
                    shown: Arc::clone(&shown),
                }),
            )
            .with_cancel(cancel_rx);
        let run = tokio::spawn(async move { coordinator.run().await });

        shown.notified().await;
        cancel.send_replace(true);

        let err = run.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(!fx.scratch.exists());
        assert_eq!(version_of(&installer, "a").await, None);
        assert_eq!(version_of(&installer, "b").await, None);

        // The package manager drops the staged files once the prompt is gone.
        tokio::time::timeout(Duration::from_secs(5), async {
            while staged_sessions(&fx.device) > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(installer.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_uninstall_removes_nothing() {
        let fx = Fixture::new();
        preinstall(&fx.device, 0, "a", 1).await;

        let (cancel, cancel_rx) = watch::channel(false);
        cancel.send_replace(true);
        let coordinator = UninstallCoordinator::new(
            fx.config(Capability::Elevated, &["a"]),
            Arc::new(fx.installer(Capability::Elevated)),
            Arc::new(AutoConfirm),
        )
        .with_cancel(cancel_rx);

        let err = coordinator.run().await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(
            version_of(&fx.installer(Capability::Standard), "a").await,
            Some(1)
        );
    }
}
