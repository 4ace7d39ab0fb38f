//! Integration tests for the directory-backed package manager

#[cfg(test)]
mod tests {
    use appset_errors::InstallError;
    use appset_platform::*;
    use appset_types::{Capability, VersionCode};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;

    struct Decline;

    #[async_trait]
    impl ConfirmationLauncher for Decline {
        async fn launch(&self, action: UserAction) -> Result<(), InstallError> {
            action.decline();
            Ok(())
        }
    }

    /// Closes every prompt without answering
    struct Dismiss;

    #[async_trait]
    impl ConfirmationLauncher for Dismiss {
        async fn launch(&self, action: UserAction) -> Result<(), InstallError> {
            drop(action);
            Ok(())
        }
    }

    fn session_dir(installer: &DirectoryPackageInstaller, session: SessionId) -> PathBuf {
        installer.root().join("sessions").join(session.0.to_string())
    }

    async fn stage(
        installer: &DirectoryPackageInstaller,
        session: SessionId,
        split: &str,
        bytes: &[u8],
        declared: u64,
    ) {
        let mut writer = installer.open_write(session, split, declared).await.unwrap();
        writer.write_all(bytes).await.unwrap();
        writer.shutdown().await.unwrap();
    }

    async fn install_one(installer: &DirectoryPackageInstaller, package: &str, version: u64) {
        let session = installer
            .create_session(SessionParams::new(package, VersionCode::new(version)), None)
            .await
            .unwrap();
        stage(installer, session, "base.apk", b"apk", 3).await;
        let status = installer.commit(session).await.unwrap();
        await_outcome(status, &AutoConfirm, 5, package).await.unwrap();
    }

    #[tokio::test]
    async fn test_standard_commit_with_confirmation() {
        let root = tempdir().unwrap();
        let installer = DirectoryPackageInstaller::new(root.path(), Capability::Standard);

        install_one(&installer, "com.example.a", 5).await;

        assert_eq!(
            installer.installed_version("com.example.a", false).await.unwrap(),
            Some(VersionCode::new(5))
        );
        assert!(root
            .path()
            .join("installed/com.example.a/splits/base.apk")
            .exists());
        assert_eq!(installer.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_declined_confirmation_is_rejected() {
        let root = tempdir().unwrap();
        let installer = DirectoryPackageInstaller::new(root.path(), Capability::Standard);
        let session = installer
            .create_session(SessionParams::new("com.example.a", VersionCode::new(1)), None)
            .await
            .unwrap();
        stage(&installer, session, "base.apk", b"apk", 3).await;

        let status = installer.commit(session).await.unwrap();
        let err = await_outcome(status, &Decline, 5, "com.example.a")
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::Rejected { .. }));
        assert!(err.to_string().starts_with("INSTALL_FAILED_ABORTED"));
        assert_eq!(
            installer.installed_version("com.example.a", true).await.unwrap(),
            None
        );
        assert_eq!(installer.open_sessions(), 0);
        assert!(!session_dir(&installer, session).exists());
    }

    #[tokio::test]
    async fn test_exhausted_confirmation_discards_staged_files() {
        let root = tempdir().unwrap();
        let installer = DirectoryPackageInstaller::new(root.path(), Capability::Standard);
        let session = installer
            .create_session(SessionParams::new("com.example.a", VersionCode::new(1)), None)
            .await
            .unwrap();
        stage(&installer, session, "base.apk", b"apk", 3).await;
        assert!(session_dir(&installer, session).exists());

        let status = installer.commit(session).await.unwrap();
        let err = await_outcome(status, &Dismiss, 2, "com.example.a")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InstallError::ConfirmationExhausted { attempts: 2, .. }
        ));

        // Staged files go once the package manager notices nobody is asking.
        let dir = session_dir(&installer, session);
        tokio::time::timeout(Duration::from_secs(5), async {
            while dir.exists() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(
            installer.installed_version("com.example.a", true).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_group_commit_is_atomic() {
        let root = tempdir().unwrap();
        let installer = DirectoryPackageInstaller::new(root.path(), Capability::Elevated);
        let group = installer.create_group_session().await.unwrap();

        let a = installer
            .create_session(SessionParams::new("a", VersionCode::new(1)), Some(group))
            .await
            .unwrap();
        let b = installer
            .create_session(SessionParams::new("b", VersionCode::new(1)), Some(group))
            .await
            .unwrap();
        stage(&installer, a, "a.apk", b"aaaa", 4).await;
        // Short write: declared 10 bytes, staged 2.
        stage(&installer, b, "b.apk", b"bb", 10).await;

        // Children cannot be committed on their own.
        assert!(installer.commit(a).await.is_err());

        let status = installer.commit(group).await.unwrap();
        let err = await_outcome(status, &AutoConfirm, 5, "group")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("declared 10 bytes"));

        assert_eq!(installer.installed_version("a", true).await.unwrap(), None);
        assert_eq!(installer.installed_version("b", true).await.unwrap(), None);
        assert!(!root.path().join("sessions").join(a.0.to_string()).exists());
    }

    #[tokio::test]
    async fn test_group_commit_installs_every_child() {
        let root = tempdir().unwrap();
        let installer = DirectoryPackageInstaller::new(root.path(), Capability::Elevated);
        let group = installer.create_group_session().await.unwrap();

        for (package, version) in [("a", 3), ("b", 4)] {
            let session = installer
                .create_session(SessionParams::new(package, VersionCode::new(version)), Some(group))
                .await
                .unwrap();
            stage(&installer, session, "base.apk", b"xyz", 3).await;
        }

        let status = installer.commit(group).await.unwrap();
        await_outcome(status, &AutoConfirm, 0, "group").await.unwrap();

        assert_eq!(
            installer.installed_version("a", false).await.unwrap(),
            Some(VersionCode::new(3))
        );
        assert_eq!(
            installer.installed_version("b", false).await.unwrap(),
            Some(VersionCode::new(4))
        );
    }

    #[tokio::test]
    async fn test_abandon_group_discards_children() {
        let root = tempdir().unwrap();
        let installer = DirectoryPackageInstaller::new(root.path(), Capability::Elevated);
        let group = installer.create_group_session().await.unwrap();
        let child = installer
            .create_session(SessionParams::new("a", VersionCode::new(1)), Some(group))
            .await
            .unwrap();
        stage(&installer, child, "a.apk", b"a", 1).await;

        installer.abandon(group).await.unwrap();

        assert_eq!(installer.open_sessions(), 0);
        assert!(!root.path().join("sessions").join(child.0.to_string()).exists());
        assert!(matches!(
            installer.abandon(group).await,
            Err(InstallError::UnknownSession { .. })
        ));
    }

    #[tokio::test]
    async fn test_group_sessions_need_elevation() {
        let root = tempdir().unwrap();
        let installer = DirectoryPackageInstaller::new(root.path(), Capability::Standard);
        assert!(installer.create_group_session().await.is_err());
        assert!(installer.install_existing("a").await.is_err());
        assert!(installer.uninstall_existing("a").await.is_err());
    }

    #[tokio::test]
    async fn test_install_existing_for_another_user() {
        let root = tempdir().unwrap();
        let owner = DirectoryPackageInstaller::for_user(root.path(), Capability::Elevated, 0);
        install_one(&owner, "a", 7).await;

        let other = DirectoryPackageInstaller::for_user(root.path(), Capability::Elevated, 10);
        assert_eq!(other.installed_version("a", false).await.unwrap(), None);
        assert_eq!(
            other.installed_version("a", true).await.unwrap(),
            Some(VersionCode::new(7))
        );

        let status = other.install_existing("a").await.unwrap();
        await_outcome(status, &AutoConfirm, 0, "a").await.unwrap();

        assert_eq!(
            other.installed_version("a", false).await.unwrap(),
            Some(VersionCode::new(7))
        );
        assert_eq!(
            other.installed_users("a").await.unwrap().into_iter().collect::<Vec<_>>(),
            vec![0, 10]
        );
    }

    #[tokio::test]
    async fn test_uninstall_variants() {
        let root = tempdir().unwrap();
        let elevated = DirectoryPackageInstaller::new(root.path(), Capability::Elevated);
        install_one(&elevated, "a", 1).await;
        install_one(&elevated, "b", 1).await;

        let status = elevated.uninstall_existing("a").await.unwrap();
        await_outcome(status, &AutoConfirm, 0, "a").await.unwrap();
        assert_eq!(elevated.installed_version("a", true).await.unwrap(), None);

        let standard = DirectoryPackageInstaller::new(root.path(), Capability::Standard);
        let status = standard.request_uninstall("b").await.unwrap();
        await_outcome(status, &AutoConfirm, 5, "b").await.unwrap();
        assert_eq!(standard.installed_version("b", true).await.unwrap(), None);

        let status = standard.request_uninstall("b").await.unwrap();
        let err = await_outcome(status, &AutoConfirm, 5, "b").await.unwrap_err();
        assert!(matches!(err, InstallError::Rejected { .. }));
    }
}
