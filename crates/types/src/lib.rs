#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for appset
//!
//! Value types shared by the manifest, install and CLI layers.

pub mod apps;
pub mod version;

pub use apps::{ManagedSet, GMS_PACKAGE_NAME, GSF_PACKAGE_NAME, PLAY_STORE_PACKAGE_NAME};
pub use version::VersionCode;

use serde::{Deserialize, Serialize};

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Plain,
    #[default]
    Tty,
    Json,
}

/// What the running process is allowed to ask of the package manager.
///
/// Read once when a run starts and never re-checked mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Every install and removal needs its own user confirmation
    #[default]
    Standard,
    /// Group sessions, installs for other users, confirmation-free commits
    Elevated,
}

impl Capability {
    #[must_use]
    pub fn is_elevated(self) -> bool {
        matches!(self, Self::Elevated)
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Elevated => write!(f, "elevated"),
        }
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "elevated" => Ok(Self::Elevated),
            other => Err(format!("unknown capability: {other}")),
        }
    }
}

impl clap::ValueEnum for Capability {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Standard, Self::Elevated]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Standard => clap::builder::PossibleValue::new("standard"),
            Self::Elevated => clap::builder::PossibleValue::new("elevated"),
        })
    }
}

impl clap::ValueEnum for OutputFormat {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Plain, Self::Tty, Self::Json]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Plain => clap::builder::PossibleValue::new("plain"),
            Self::Tty => clap::builder::PossibleValue::new("tty"),
            Self::Json => clap::builder::PossibleValue::new("json"),
        })
    }
}
