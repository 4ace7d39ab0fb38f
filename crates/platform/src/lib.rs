//! Package manager abstraction for appset
//!
//! This crate describes what the install and uninstall coordinators need
//! from the device package manager:
//! - staged install sessions, optionally grouped for one atomic commit
//! - version queries, optionally across every device user
//! - removal, either direct or through a user confirmation
//!
//! Every commit-like call answers through a status channel. The channel may
//! first report that the user must confirm; `await_outcome` drives that
//! exchange to a definitive result with a bounded number of prompts.
//!
//! `DirectoryPackageInstaller` implements the interface over a plain
//! directory tree so the whole pipeline runs without a device.

pub mod implementations;
pub mod installer;
pub mod status;

pub use implementations::directory::DirectoryPackageInstaller;
pub use installer::{PackageInstaller, SessionId, SessionParams, SessionWriter};
pub use status::{
    await_outcome, status_channel, AutoConfirm, ConfirmationLauncher, InstallStatus,
    StatusReceiver, StatusSender, UserAction,
};
