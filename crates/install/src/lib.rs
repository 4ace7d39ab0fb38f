#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Install and uninstall coordination for appset
//!
//! The coordinators drive a `PackageInstaller` through one run each: the
//! install side resolves the signed manifest, downloads and stages what is
//! out of date and commits it; the uninstall side removes the managed set in
//! reverse order.

mod api;
mod cancel;
mod installer;
mod progress;
mod staging;
mod uninstaller;

pub use api::config::InstallConfig;
pub use api::result::{InstallSummary, UninstallSummary};
pub use installer::InstallCoordinator;
pub use progress::{InstallProgress, ProgressSnapshot};
pub use staging::ScratchDir;
pub use uninstaller::UninstallCoordinator;

pub use appset_events::EventSender;
