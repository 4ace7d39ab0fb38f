//! Command line interface definition

use appset_types::{Capability, OutputFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// appset - keep a managed set of applications installed from a signed repository
#[derive(Parser)]
#[command(name = "appset")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Keep a managed set of applications installed from a signed repository")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Output format (overrides the configured default)
    #[arg(long, global = true, value_enum, conflicts_with = "json")]
    pub output: Option<OutputFormat>,

    /// Write JSON debug logs to the log directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Root of the package manager's device directory
    #[arg(long, global = true, value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// What the package manager allows this process to do
    #[arg(long, global = true, value_enum)]
    pub capability: Option<Capability>,

    /// Accept every confirmation prompt
    #[arg(short, long, global = true)]
    pub yes: bool,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Install or update every managed application
    #[command(alias = "i")]
    Install {
        /// Release channel to install from
        #[arg(long)]
        channel: Option<String>,

        /// Repository base URL (http, https or file)
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
    },

    /// Remove every managed application, last installed first
    #[command(alias = "rm")]
    Uninstall,

    /// Show the installed version of each managed application
    #[command(alias = "st")]
    Status,
}
