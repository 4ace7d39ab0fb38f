//! Package manager emulation backed by a directory tree
//!
//! Layout below the device root:
//!
//! ```text
//! sessions/<id>/<split>            staged bytes of open sessions
//! installed/<package>/record.json  version and users of an install
//! installed/<package>/splits/      committed split files
//! ```
//!
//! Sessions live in memory for the lifetime of the installer. With
//! `Capability::Standard` every commit and removal asks for confirmation
//! first; group sessions and re-linking installs of other users need
//! `Capability::Elevated`.

use crate::installer::{PackageInstaller, SessionId, SessionParams, SessionWriter};
use crate::status::{status_channel, InstallStatus, StatusReceiver, StatusSender, UserAction};
use appset_errors::InstallError;
use appset_types::{Capability, VersionCode};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const RECORD_FILE: &str = "record.json";
const ABORTED_MESSAGE: &str = "INSTALL_FAILED_ABORTED: User rejected permissions";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InstalledRecord {
    version_code: VersionCode,
    users: BTreeSet<u32>,
    splits: Vec<String>,
}

#[derive(Debug, Clone)]
struct StagedSplit {
    name: String,
    length: u64,
}

#[derive(Debug)]
enum SessionKind {
    Group { children: Vec<SessionId> },
    Package {
        params: SessionParams,
        parent: Option<SessionId>,
        splits: Vec<StagedSplit>,
    },
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    sessions: HashMap<SessionId, SessionKind>,
}

#[derive(Debug)]
struct Inner {
    root: PathBuf,
    capability: Capability,
    user: u32,
    state: Mutex<State>,
}

/// A package to apply during commit, validated while the session was open
struct PlannedInstall {
    session: SessionId,
    params: SessionParams,
    splits: Vec<StagedSplit>,
}

/// Directory-backed `PackageInstaller`
#[derive(Debug, Clone)]
pub struct DirectoryPackageInstaller {
    inner: Arc<Inner>,
}

impl DirectoryPackageInstaller {
    /// Create an installer rooted at `root` acting for user 0
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, capability: Capability) -> Self {
        Self::for_user(root, capability, 0)
    }

    /// Create an installer acting for a specific device user
    #[must_use]
    pub fn for_user(root: impl Into<PathBuf>, capability: Capability, user: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                root: root.into(),
                capability,
                user,
                state: Mutex::new(State::default()),
            }),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Number of sessions that are neither committed nor abandoned
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.inner.state().sessions.len()
    }

    /// Users that have `package` installed
    ///
    /// # Errors
    ///
    /// Returns an error if an existing install record cannot be read.
    pub async fn installed_users(&self, package: &str) -> Result<BTreeSet<u32>, InstallError> {
        Ok(self
            .inner
            .read_record(package)
            .await?
            .map(|record| record.users)
            .unwrap_or_default())
    }

    /// Run `op` in the background and report its result on a status channel
    ///
    /// With standard capability the user is asked first. If the prompt is
    /// declined or abandoned, the staged files of `staged` are discarded.
    fn submit<F, Fut>(&self, prompt: String, staged: Vec<SessionId>, op: F) -> StatusReceiver
    where
        F: FnOnce(Arc<Inner>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let (tx, rx) = status_channel();
        let inner = Arc::clone(&self.inner);
        let confirm = !inner.capability.is_elevated();

        tokio::spawn(async move {
            if confirm {
                if let Err(declined) = request_confirmation(&tx, &prompt).await {
                    inner.discard(staged.into_iter()).await;
                    if let Some(message) = declined {
                        let _ = tx.send(InstallStatus::Failure { message });
                    }
                    return;
                }
            }
            let status = match op(inner).await {
                Ok(()) => InstallStatus::Success,
                Err(message) => InstallStatus::Failure { message },
            };
            let _ = tx.send(status);
        });

        rx
    }

    fn require_elevated(&self, operation: &str) -> Result<(), InstallError> {
        if self.inner.capability.is_elevated() {
            Ok(())
        } else {
            Err(InstallError::SessionFailed {
                operation: operation.to_string(),
                session: "-".to_string(),
                message: "requires elevated capability".to_string(),
            })
        }
    }
}

/// Prompt until the user answers
///
/// `Err(Some(message))` is a decline to report; `Err(None)` means nobody is
/// listening any more.
async fn request_confirmation(tx: &StatusSender, prompt: &str) -> Result<(), Option<String>> {
    loop {
        let (action, answer) = UserAction::new(prompt);
        if tx.send(InstallStatus::PendingUserAction(action)).is_err() {
            return Err(None);
        }
        match answer.await {
            Ok(true) => return Ok(()),
            Ok(false) => return Err(Some(ABORTED_MESSAGE.to_string())),
            // Dismissed without an answer; the package manager asks again.
            Err(_) => {}
        }
    }
}

fn fs_error(operation: &str, path: &Path, err: &std::io::Error) -> InstallError {
    InstallError::FilesystemError {
        operation: operation.to_string(),
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session_dir(&self, session: SessionId) -> PathBuf {
        self.root.join("sessions").join(session.0.to_string())
    }

    fn package_dir(&self, package: &str) -> PathBuf {
        self.root.join("installed").join(package)
    }

    async fn read_record(&self, package: &str) -> Result<Option<InstalledRecord>, InstallError> {
        let path = self.package_dir(package).join(RECORD_FILE);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                InstallError::FilesystemError {
                    operation: "read record".to_string(),
                    path: path.display().to_string(),
                    message: e.to_string(),
                }
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(fs_error("read record", &path, &e)),
        }
    }

    async fn write_record(&self, package: &str, record: &InstalledRecord) -> Result<(), String> {
        let path = self.package_dir(package).join(RECORD_FILE);
        let bytes = serde_json::to_vec_pretty(record).map_err(|e| e.to_string())?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| fs_error("write record", &path, &e).to_string())
    }

    fn new_session(&self, kind: SessionKind) -> SessionId {
        let mut state = self.state();
        state.next_id += 1;
        let id = SessionId(state.next_id);
        state.sessions.insert(id, kind);
        id
    }

    /// Remove `session` (and its children) from the table and plan the installs
    ///
    /// Fails without touching the table if the session is unknown or is a
    /// child of a group.
    fn take_for_commit(&self, session: SessionId) -> Result<Vec<PlannedInstall>, InstallError> {
        let mut state = self.state();
        let ids = match state.sessions.get(&session) {
            None => {
                return Err(InstallError::UnknownSession {
                    session: session.to_string(),
                })
            }
            Some(SessionKind::Package {
                parent: Some(parent),
                ..
            }) => {
                return Err(InstallError::SessionFailed {
                    operation: "commit".to_string(),
                    session: session.to_string(),
                    message: format!("child of {parent} cannot be committed on its own"),
                })
            }
            Some(SessionKind::Group { children }) => children.clone(),
            Some(SessionKind::Package { .. }) => vec![session],
        };

        state.sessions.remove(&session);
        let mut planned = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(SessionKind::Package { params, splits, .. }) = state.sessions.remove(&id) {
                planned.push(PlannedInstall {
                    session: id,
                    params,
                    splits,
                });
            }
        }
        Ok(planned)
    }

    /// Check staged bytes against the declared lengths of every split
    async fn verify_staged(&self, install: &PlannedInstall) -> Result<(), String> {
        if install.splits.is_empty() {
            return Err(format!(
                "INSTALL_FAILED_INVALID_APK: {} has no splits",
                install.params.package
            ));
        }
        let dir = self.session_dir(install.session);
        for split in &install.splits {
            let path = dir.join(&split.name);
            let written = tokio::fs::metadata(&path)
                .await
                .map_err(|e| fs_error("stat", &path, &e).to_string())?
                .len();
            if written != split.length {
                return Err(format!(
                    "INSTALL_FAILED_INVALID_APK: {} split {} declared {} bytes, got {written}",
                    install.params.package, split.name, split.length
                ));
            }
        }
        Ok(())
    }

    async fn apply(&self, install: PlannedInstall) -> Result<(), String> {
        let package = &install.params.package;
        let package_dir = self.package_dir(package);
        let splits_dir = package_dir.join("splits");

        let mut users = self
            .read_record(package)
            .await
            .map_err(|e| e.to_string())?
            .map(|record| record.users)
            .unwrap_or_default();
        users.insert(self.user);

        if tokio::fs::try_exists(&splits_dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&splits_dir)
                .await
                .map_err(|e| fs_error("remove", &splits_dir, &e).to_string())?;
        }
        tokio::fs::create_dir_all(&package_dir)
            .await
            .map_err(|e| fs_error("create", &package_dir, &e).to_string())?;
        let staged = self.session_dir(install.session);
        tokio::fs::rename(&staged, &splits_dir)
            .await
            .map_err(|e| fs_error("rename", &staged, &e).to_string())?;

        let record = InstalledRecord {
            version_code: install.params.version_code,
            users,
            splits: install.splits.into_iter().map(|s| s.name).collect(),
        };
        self.write_record(package, &record).await?;
        tracing::debug!(package = %package, version = %record.version_code, "package installed");
        Ok(())
    }

    async fn commit_planned(self: Arc<Self>, planned: Vec<PlannedInstall>) -> Result<(), String> {
        // All or nothing: every child is checked before any is applied.
        for install in &planned {
            if let Err(message) = self.verify_staged(install).await {
                self.discard(planned.iter().map(|p| p.session)).await;
                return Err(message);
            }
        }
        for install in planned {
            self.apply(install).await?;
        }
        Ok(())
    }

    async fn discard(&self, sessions: impl Iterator<Item = SessionId>) {
        for session in sessions {
            let dir = self.session_dir(session);
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(session = %session, error = %e, "failed to remove staged files");
                }
            }
        }
    }

    async fn remove_for_user(self: Arc<Self>, package: String) -> Result<(), String> {
        let Some(mut record) = self.read_record(&package).await.map_err(|e| e.to_string())?
        else {
            return Err(format!("DELETE_FAILED_INTERNAL_ERROR: {package} is not installed"));
        };
        if !record.users.remove(&self.user) {
            return Err(format!(
                "DELETE_FAILED_INTERNAL_ERROR: {package} is not installed for user {}",
                self.user
            ));
        }

        if record.users.is_empty() {
            let dir = self.package_dir(&package);
            tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|e| fs_error("remove", &dir, &e).to_string())?;
        } else {
            self.write_record(&package, &record).await?;
        }
        tracing::debug!(package = %package, user = self.user, "package removed");
        Ok(())
    }

    async fn link_existing(self: Arc<Self>, package: String) -> Result<(), String> {
        let Some(mut record) = self.read_record(&package).await.map_err(|e| e.to_string())?
        else {
            return Err(format!(
                "INSTALL_FAILED_INVALID_URI: {package} is not installed for any user"
            ));
        };
        record.users.insert(self.user);
        self.write_record(&package, &record).await
    }
}

#[async_trait]
impl PackageInstaller for DirectoryPackageInstaller {
    async fn installed_version(
        &self,
        package: &str,
        any_user: bool,
    ) -> Result<Option<VersionCode>, InstallError> {
        let record = self.inner.read_record(package).await?;
        Ok(record
            .filter(|record| any_user || record.users.contains(&self.inner.user))
            .map(|record| record.version_code))
    }

    async fn create_group_session(&self) -> Result<SessionId, InstallError> {
        self.require_elevated("create group session")?;
        Ok(self.inner.new_session(SessionKind::Group {
            children: Vec::new(),
        }))
    }

    async fn create_session(
        &self,
        params: SessionParams,
        parent: Option<SessionId>,
    ) -> Result<SessionId, InstallError> {
        let id = {
            let mut state = self.inner.state();
            if let Some(parent) = parent {
                if !matches!(state.sessions.get(&parent), Some(SessionKind::Group { .. })) {
                    return Err(InstallError::UnknownSession {
                        session: parent.to_string(),
                    });
                }
            }
            state.next_id += 1;
            let id = SessionId(state.next_id);
            state.sessions.insert(
                id,
                SessionKind::Package {
                    params,
                    parent,
                    splits: Vec::new(),
                },
            );
            if let Some(parent) = parent {
                if let Some(SessionKind::Group { children }) = state.sessions.get_mut(&parent) {
                    children.push(id);
                }
            }
            id
        };

        let dir = self.inner.session_dir(id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| fs_error("create session", &dir, &e))?;
        Ok(id)
    }

    async fn open_write(
        &self,
        session: SessionId,
        split_name: &str,
        length: u64,
    ) -> Result<SessionWriter, InstallError> {
        if split_name.is_empty() || split_name.contains(['/', '\\']) || split_name == ".." {
            return Err(InstallError::SessionFailed {
                operation: "open write".to_string(),
                session: session.to_string(),
                message: format!("invalid split name {split_name:?}"),
            });
        }

        {
            let mut state = self.inner.state();
            match state.sessions.get_mut(&session) {
                Some(SessionKind::Package { splits, .. }) => splits.push(StagedSplit {
                    name: split_name.to_string(),
                    length,
                }),
                _ => {
                    return Err(InstallError::UnknownSession {
                        session: session.to_string(),
                    })
                }
            }
        }

        let path = self.inner.session_dir(session).join(split_name);
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| fs_error("open write", &path, &e))?;
        Ok(Box::pin(file))
    }

    async fn commit(&self, session: SessionId) -> Result<StatusReceiver, InstallError> {
        let planned = self.inner.take_for_commit(session)?;
        let packages: Vec<_> = planned.iter().map(|p| p.params.package.clone()).collect();
        tracing::debug!(session = %session, packages = ?packages, "committing");

        let staged = planned.iter().map(|p| p.session).collect();
        Ok(self.submit(
            format!("Install {}?", packages.join(", ")),
            staged,
            move |inner| inner.commit_planned(planned),
        ))
    }

    async fn abandon(&self, session: SessionId) -> Result<(), InstallError> {
        let removed = {
            let mut state = self.inner.state();
            match state.sessions.remove(&session) {
                None => {
                    return Err(InstallError::UnknownSession {
                        session: session.to_string(),
                    })
                }
                Some(SessionKind::Group { children }) => {
                    for child in &children {
                        state.sessions.remove(child);
                    }
                    children
                }
                Some(SessionKind::Package { parent, .. }) => {
                    if let Some(SessionKind::Group { children }) =
                        parent.and_then(|p| state.sessions.get_mut(&p))
                    {
                        children.retain(|child| *child != session);
                    }
                    vec![session]
                }
            }
        };

        self.inner.discard(removed.into_iter()).await;
        tracing::debug!(session = %session, "session abandoned");
        Ok(())
    }

    async fn install_existing(&self, package: &str) -> Result<StatusReceiver, InstallError> {
        self.require_elevated("install existing")?;
        let package = package.to_string();
        Ok(self.submit(String::new(), Vec::new(), move |inner| {
            inner.link_existing(package)
        }))
    }

    async fn uninstall_existing(&self, package: &str) -> Result<StatusReceiver, InstallError> {
        self.require_elevated("uninstall existing")?;
        let package = package.to_string();
        Ok(self.submit(String::new(), Vec::new(), move |inner| {
            inner.remove_for_user(package)
        }))
    }

    async fn request_uninstall(&self, package: &str) -> Result<StatusReceiver, InstallError> {
        let owned = package.to_string();
        Ok(self.submit(format!("Uninstall {package}?"), Vec::new(), move |inner| {
            inner.remove_for_user(owned)
        }))
    }
}
