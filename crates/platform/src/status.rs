//! Asynchronous commit outcomes and the user confirmation loop

use appset_errors::InstallError;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

/// One status report from the package manager
#[derive(Debug)]
pub enum InstallStatus {
    Success,
    /// The user has to confirm before the operation can continue
    PendingUserAction(UserAction),
    /// Definitive failure, message as reported by the package manager
    Failure { message: String },
}

pub type StatusSender = mpsc::UnboundedSender<InstallStatus>;
pub type StatusReceiver = mpsc::UnboundedReceiver<InstallStatus>;

#[must_use]
pub fn status_channel() -> (StatusSender, StatusReceiver) {
    mpsc::unbounded_channel()
}

/// A confirmation the package manager is waiting on
///
/// Dropping the action without answering counts as dismissing the prompt.
#[derive(Debug)]
pub struct UserAction {
    prompt: String,
    responder: oneshot::Sender<bool>,
}

impl UserAction {
    /// Create an action and the receiver that observes the user's answer
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> (Self, oneshot::Receiver<bool>) {
        let (responder, answer) = oneshot::channel();
        (
            Self {
                prompt: prompt.into(),
                responder,
            },
            answer,
        )
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn respond(self, accepted: bool) {
        let _ = self.responder.send(accepted);
    }

    pub fn accept(self) {
        self.respond(true);
    }

    pub fn decline(self) {
        self.respond(false);
    }
}

/// Presents confirmation prompts to the user
#[async_trait]
pub trait ConfirmationLauncher: Send + Sync {
    /// Show `action` and resolve it. Returns once the prompt is closed.
    async fn launch(&self, action: UserAction) -> Result<(), InstallError>;
}

/// Accepts every prompt without asking
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl ConfirmationLauncher for AutoConfirm {
    async fn launch(&self, action: UserAction) -> Result<(), InstallError> {
        tracing::debug!(prompt = action.prompt(), "confirming automatically");
        action.accept();
        Ok(())
    }
}

/// Wait for a definitive result on `status`
///
/// Each pending confirmation is handed to `launcher` and waiting resumes
/// afterwards. At most `max_user_actions` prompts are launched.
///
/// # Errors
///
/// Returns `Rejected` with the package manager's message on failure,
/// `ConfirmationExhausted` when the prompt bound is reached, and
/// `StatusLost` if the channel closes without a result.
pub async fn await_outcome(
    mut status: StatusReceiver,
    launcher: &dyn ConfirmationLauncher,
    max_user_actions: u32,
    package: &str,
) -> Result<(), InstallError> {
    let mut user_actions = 0u32;

    loop {
        match status.recv().await {
            Some(InstallStatus::Success) => return Ok(()),
            Some(InstallStatus::Failure { message }) => {
                return Err(InstallError::Rejected { message });
            }
            Some(InstallStatus::PendingUserAction(action)) => {
                if user_actions >= max_user_actions {
                    return Err(InstallError::ConfirmationExhausted {
                        package: package.to_string(),
                        attempts: user_actions,
                    });
                }
                user_actions += 1;
                tracing::debug!(package, attempt = user_actions, "user confirmation requested");
                launcher.launch(action).await?;
            }
            None => {
                return Err(InstallError::StatusLost {
                    package: package.to_string(),
                })
            }
        }
    }
}
