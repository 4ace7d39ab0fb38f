//! Output rendering and the live status line

use appset_ops::{AppStatus, OperationResult, RunStatus};
use appset_types::OutputFormat;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, ContentArrangement, Table};
use console::{style, Term};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    format: OutputFormat,
}

impl OutputRenderer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn render_result(&self, result: &OperationResult) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            let json = result.to_json().map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        match result {
            OperationResult::InstallSummary(summary) => {
                if summary.is_noop() {
                    println!("All managed applications are up to date.");
                } else {
                    for package in &summary.installed {
                        println!("installed {package}");
                    }
                    for package in &summary.linked {
                        println!("enabled {package}");
                    }
                    println!(
                        "Downloaded {} MB.",
                        summary.downloaded_bytes / 1_000_000
                    );
                }
            }
            OperationResult::UninstallSummary(summary) => {
                if summary.removed.is_empty() {
                    println!("Nothing to uninstall.");
                } else {
                    println!("Removed {}.", summary.removed.join(", "));
                }
            }
            OperationResult::Status(apps) => self.render_status(apps),
            OperationResult::Failed { message, .. } => {
                let line = format!("Error: {message}");
                if self.format == OutputFormat::Tty {
                    eprintln!("{}", style(line).red());
                } else {
                    eprintln!("{line}");
                }
            }
        }
        Ok(())
    }

    fn render_status(&self, apps: &[AppStatus]) {
        if self.format == OutputFormat::Plain {
            for app in apps {
                match app.installed {
                    Some(version) => println!("{}\t{version}", app.package),
                    None => println!("{}\t-", app.package),
                }
            }
            return;
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Application").add_attribute(Attribute::Bold),
            Cell::new("Installed").add_attribute(Attribute::Bold),
        ]);
        for app in apps {
            let installed = app
                .installed
                .map_or_else(|| "not installed".to_string(), |v| v.to_string());
            table.add_row(vec![Cell::new(&app.package), Cell::new(installed)]);
        }
        println!("{table}");
    }
}

/// Status text for a run, redrawn on every tick
///
/// `tick` animates a trailing run of zero to three dots.
pub fn status_text(status: &RunStatus, tick: u32) -> Option<String> {
    let mut text = match status {
        RunStatus::Installing(progress) => {
            let mut parts = Vec::with_capacity(2);
            if !progress.downloads_finished {
                parts.push(format!(
                    "Downloading: {} MB",
                    progress.downloaded_bytes / 1_000_000
                ));
            }
            if progress.num_installs != 0 {
                parts.push(format!(
                    "Installing: {}/{}",
                    progress.processed_installs, progress.num_installs
                ));
            }
            parts.join("  ")
        }
        RunStatus::Uninstalling => "Uninstalling".to_string(),
        RunStatus::Idle { .. } => return None,
    };
    for _ in 0..(tick & 0b11) {
        text.push('.');
    }
    Some(text)
}

/// Single redrawn terminal line showing run progress
pub struct ProgressLine {
    term: Term,
    enabled: bool,
    tick: u32,
    /// Set while a confirmation prompt owns the terminal
    paused: Arc<AtomicBool>,
}

impl ProgressLine {
    pub fn new(enabled: bool, paused: Arc<AtomicBool>) -> Self {
        Self {
            term: Term::stderr(),
            enabled: enabled && Term::stderr().is_term(),
            tick: 0,
            paused,
        }
    }

    pub fn draw(&mut self, status: &RunStatus) {
        if !self.enabled || self.paused.load(Ordering::Acquire) {
            return;
        }
        if let Some(text) = status_text(status, self.tick) {
            let _ = self.term.clear_line();
            let _ = self.term.write_str(&text);
        }
        self.tick = self.tick.wrapping_add(1);
    }

    pub fn clear(&self) {
        if self.enabled {
            let _ = self.term.clear_line();
        }
    }
}
