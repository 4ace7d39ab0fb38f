//! Terminal confirmation prompts for package manager requests

use appset_errors::InstallError;
use appset_platform::{ConfirmationLauncher, UserAction};
use async_trait::async_trait;
use dialoguer::Confirm;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Asks on the terminal; the progress line pauses while a prompt is open
pub struct TerminalConfirmation {
    prompting: Arc<AtomicBool>,
}

impl TerminalConfirmation {
    pub fn new(prompting: Arc<AtomicBool>) -> Self {
        Self { prompting }
    }
}

#[async_trait]
impl ConfirmationLauncher for TerminalConfirmation {
    async fn launch(&self, action: UserAction) -> Result<(), InstallError> {
        let prompt = action.prompt().to_string();
        self.prompting.store(true, Ordering::Release);
        let _ = console::Term::stderr().clear_line();

        let answer = tokio::task::spawn_blocking(move || {
            Confirm::new().with_prompt(prompt).default(false).interact()
        })
        .await;
        self.prompting.store(false, Ordering::Release);

        match answer {
            Ok(Ok(accepted)) => {
                action.respond(accepted);
                Ok(())
            }
            // The action is dropped unanswered, which the package manager sees as dismissed.
            Ok(Err(e)) => Err(InstallError::ConfirmationFailed {
                message: e.to_string(),
            }),
            Err(e) => Err(InstallError::ConfirmationFailed {
                message: e.to_string(),
            }),
        }
    }
}
