//! Tracking of install sessions that must be abandoned on failure

use appset_events::{EventEmitter, EventSender};
use appset_platform::{PackageInstaller, SessionId};
use std::sync::Arc;

/// Sessions opened by a run and not yet committed
///
/// With a group session only the group is tracked; abandoning it discards
/// every child. Sessions still tracked when the set is dropped are
/// abandoned in the background.
pub(crate) struct SessionSet {
    installer: Arc<dyn PackageInstaller>,
    group: Option<SessionId>,
    independent: Vec<SessionId>,
}

impl SessionSet {
    pub(crate) fn new(installer: Arc<dyn PackageInstaller>) -> Self {
        Self {
            installer,
            group: None,
            independent: Vec::new(),
        }
    }

    pub(crate) fn track_group(&mut self, group: SessionId) {
        self.group = Some(group);
    }

    /// Track a session that commits on its own
    pub(crate) fn track(&mut self, session: SessionId) {
        self.independent.push(session);
    }

    /// The package manager owns `session` from here on
    pub(crate) fn committed(&mut self, session: SessionId) {
        if self.group == Some(session) {
            self.group = None;
        }
        self.independent.retain(|id| *id != session);
    }

    pub(crate) fn len(&self) -> usize {
        usize::from(self.group.is_some()) + self.independent.len()
    }

    fn drain(&mut self) -> Vec<SessionId> {
        // The group already covers its children.
        match self.group.take() {
            Some(group) => {
                self.independent.clear();
                vec![group]
            }
            None => std::mem::take(&mut self.independent),
        }
    }

    /// Abandon everything still open. Failures are reported, never returned.
    pub(crate) async fn abandon_all(&mut self, events: Option<&EventSender>) {
        for session in self.drain() {
            if let Err(e) = self.installer.abandon(session).await {
                tracing::warn!(session = %session, error = %e, "failed to abandon session");
                if let Some(tx) = events {
                    tx.emit_warning_with_context(
                        format!("failed to abandon {session}"),
                        e.to_string(),
                    );
                }
            }
        }
    }
}

impl Drop for SessionSet {
    fn drop(&mut self) {
        let leftover = self.drain();
        if leftover.is_empty() {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let installer = Arc::clone(&self.installer);
            handle.spawn(async move {
                for session in leftover {
                    if let Err(e) = installer.abandon(session).await {
                        tracing::warn!(session = %session, error = %e, "failed to abandon session");
                    }
                }
            });
        }
    }
}
