//! Event handling: structured logs plus the few lines a user should see

use appset_events::{AppEvent, GeneralEvent, InstallEvent, UninstallEvent};
use console::{style, Term};
use tracing::Level;

macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {{
        let level = $level;
        if level == Level::ERROR {
            tracing::error!(target: "appset::events", $($arg)+);
        } else if level == Level::WARN {
            tracing::warn!(target: "appset::events", $($arg)+);
        } else if level == Level::INFO {
            tracing::info!(target: "appset::events", $($arg)+);
        } else if level == Level::DEBUG {
            tracing::debug!(target: "appset::events", $($arg)+);
        } else {
            tracing::trace!(target: "appset::events", $($arg)+);
        }
    }};
}

/// Forwards every event to `tracing` and prints notable ones to stderr
pub struct EventHandler {
    term: Term,
    /// Print user-facing lines (off in JSON mode)
    interactive: bool,
    colors: bool,
}

impl EventHandler {
    pub fn new(interactive: bool, colors: bool) -> Self {
        Self {
            term: Term::stderr(),
            interactive,
            colors,
        }
    }

    pub fn handle_event(&self, event: &AppEvent) {
        log_at!(event.log_level(), domain = event.log_target(), event = ?event);

        if !self.interactive {
            return;
        }
        if let Some(line) = user_line(event) {
            let line = if !self.colors {
                line
            } else if event.log_level() == Level::ERROR {
                style(line).red().to_string()
            } else if event.log_level() == Level::WARN {
                style(line).yellow().to_string()
            } else {
                line
            };
            let _ = self.term.clear_line();
            let _ = self.term.write_line(&line);
        }
    }
}

/// The message shown to a user for `event`, if any
fn user_line(event: &AppEvent) -> Option<String> {
    let line = match event {
        AppEvent::General(GeneralEvent::Warning { message, context }) => match context {
            Some(context) => format!("warning: {message} ({context})"),
            None => format!("warning: {message}"),
        },
        AppEvent::General(GeneralEvent::Error { message, .. }) => format!("error: {message}"),
        AppEvent::Install(InstallEvent::AppUpToDate {
            package, installed, ..
        }) => format!("{package} is up to date ({installed})"),
        AppEvent::Install(InstallEvent::ExistingLinked { package }) => {
            format!("{package} enabled from another user's install")
        }
        AppEvent::Install(InstallEvent::AppSelected {
            package,
            version_code,
            ..
        }) => format!("{package} will be installed ({version_code})"),
        AppEvent::Install(InstallEvent::RollingBack { sessions }) => {
            format!("rolling back {sessions} uncommitted session(s)")
        }
        AppEvent::Uninstall(UninstallEvent::Skipped { package }) => {
            format!("{package} is not installed")
        }
        AppEvent::Uninstall(UninstallEvent::Removed { package }) => format!("removed {package}"),
        _ => return None,
    };
    Some(line)
}
