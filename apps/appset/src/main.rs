//! appset - keep a managed set of applications installed from a signed repository
//!
//! This is the CLI application; the work happens in the ops crate.

mod cli;
mod confirm;
mod display;
mod error;
mod events;

use crate::cli::{Cli, Commands, GlobalArgs};
use crate::confirm::TerminalConfirmation;
use crate::display::{OutputRenderer, ProgressLine};
use crate::error::CliError;
use crate::events::EventHandler;
use appset_config::Config;
use appset_events::EventReceiver;
use appset_ops::{OperationResult, OpsContextBuilder, OpsCtx, RunManager, RunRequest};
use appset_platform::{AutoConfirm, ConfirmationLauncher};
use appset_types::OutputFormat;
use clap::Parser;
use console::Term;
use std::path::Path;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tracing::{error, info, warn};

/// Progress redraw interval
const UPDATE_INTERVAL: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json || cli.global.output == Some(OutputFormat::Json);

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        if !json_mode || !matches!(e, CliError::RunFailed(_)) {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    // Precedence: defaults < file < environment < flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.global, &cli.command);

    let format = output_format(&cli.global, &config);
    init_tracing(format == OutputFormat::Json, cli.global.debug, &config.log_dir());
    info!("Starting appset v{}", env!("CARGO_PKG_VERSION"));

    let (event_sender, event_receiver) = appset_events::channel();
    let prompting = Arc::new(AtomicBool::new(false));
    let launcher: Arc<dyn ConfirmationLauncher> = if cli.global.yes {
        Arc::new(AutoConfirm)
    } else {
        Arc::new(TerminalConfirmation::new(Arc::clone(&prompting)))
    };

    let ctx = OpsContextBuilder::new()
        .with_config(config)
        .with_launcher(launcher)
        .with_event_sender(event_sender)
        .build()?;

    let interactive = format != OutputFormat::Json;
    let colors = format == OutputFormat::Tty && Term::stderr().features().colors_supported();
    let handler = EventHandler::new(interactive, colors);
    let progress = ProgressLine::new(format == OutputFormat::Tty, prompting);

    let result =
        execute_command(cli.command, Arc::new(ctx), event_receiver, &handler, progress).await?;

    OutputRenderer::new(format).render_result(&result)?;
    if let OperationResult::Failed { message, .. } = result {
        return Err(CliError::RunFailed(message));
    }

    info!("Command completed successfully");
    Ok(())
}

/// Execute the specified command
async fn execute_command(
    command: Commands,
    ctx: Arc<OpsCtx>,
    events: EventReceiver,
    handler: &EventHandler,
    progress: ProgressLine,
) -> Result<OperationResult, CliError> {
    let manager = RunManager::new();
    let request = match command {
        Commands::Status => {
            let apps = appset_ops::status(&ctx).await?;
            return Ok(OperationResult::Status(apps));
        }
        Commands::Install { .. } => manager.start_install(ctx),
        Commands::Uninstall => manager.start_uninstall(ctx),
    };
    if request == RunRequest::Ignored {
        warn!("a run is already active");
    }

    watch_run(&manager, events, handler, progress).await
}

/// Drive the progress line and event log until the run ends
///
/// Ctrl-C cancels the run; the scratch directory is still purged.
async fn watch_run(
    manager: &RunManager,
    mut events: EventReceiver,
    handler: &EventHandler,
    mut progress: ProgressLine,
) -> Result<OperationResult, CliError> {
    let mut ticker = tokio::time::interval(UPDATE_INTERVAL);
    let mut finished = Box::pin(manager.wait());
    let mut interrupted = false;

    let outcome = loop {
        select! {
            outcome = &mut finished => break outcome?,
            Some(event) = events.recv() => {
                progress.clear();
                handler.handle_event(&event);
            }
            _ = ticker.tick() => progress.draw(&manager.status()),
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                warn!("interrupted, cancelling run");
                manager.cancel().await;
            }
        }
    };

    progress.clear();
    while let Ok(event) = events.try_recv() {
        handler.handle_event(&event);
    }
    Ok(OperationResult::from(outcome))
}

fn output_format(global: &GlobalArgs, config: &Config) -> OutputFormat {
    if global.json {
        return OutputFormat::Json;
    }
    match global.output.unwrap_or(config.general.default_output) {
        OutputFormat::Tty if !Term::stdout().is_term() => OutputFormat::Plain,
        format => format,
    }
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, global: &GlobalArgs, command: &Commands) {
    if let Some(root) = &global.root {
        config.paths.device_root = Some(root.clone());
    }
    if let Some(capability) = global.capability {
        config.install.capability = capability;
    }
    if let Commands::Install { channel, base_url } = command {
        if let Some(channel) = channel {
            config.repository.channel.clone_from(channel);
        }
        if let Some(base_url) = base_url {
            config.repository.base_url.clone_from(base_url);
        }
    }
}

/// Initialize tracing/logging
fn init_tracing(json_mode: bool, debug_flag: bool, log_dir: &Path) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_flag;

    if debug_enabled {
        // Structured JSON logs to file
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            if !json_mode {
                eprintln!("Warning: Failed to create log directory: {e}");
            }
        }
        let log_file = log_dir.join(format!(
            "appset-{}.log",
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        ));

        match std::fs::File::create(&log_file) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(file)
                    .with_env_filter(
                        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
                            |_| tracing_subscriber::EnvFilter::new("info,appset=debug"),
                        ),
                    )
                    .init();
                if !json_mode {
                    eprintln!("Debug logging enabled: {}", log_file.display());
                }
                return;
            }
            Err(e) => {
                if !json_mode {
                    eprintln!("Warning: Failed to create log file: {e}");
                }
            }
        }
    }

    if json_mode {
        // Keep stdout clean for the JSON document
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }
}
