//! The fixed set of applications appset manages

use serde::{Deserialize, Serialize};

pub const GSF_PACKAGE_NAME: &str = "com.google.android.gsf";
pub const GMS_PACKAGE_NAME: &str = "com.google.android.gms";
pub const PLAY_STORE_PACKAGE_NAME: &str = "com.android.vending";

/// Ordered list of managed application ids.
///
/// Installs walk the list front to back, removals back to front, so later
/// entries may depend on earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManagedSet {
    apps: Vec<String>,
}

impl ManagedSet {
    #[must_use]
    pub fn new<I, S>(apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            apps: apps.into_iter().map(Into::into).collect(),
        }
    }

    /// Canonical install order
    pub fn install_order(&self) -> impl Iterator<Item = &str> {
        self.apps.iter().map(String::as_str)
    }

    /// Reverse of the install order
    pub fn uninstall_order(&self) -> impl Iterator<Item = &str> {
        self.apps.iter().rev().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

impl Default for ManagedSet {
    fn default() -> Self {
        Self::new([
            GSF_PACKAGE_NAME,
            GMS_PACKAGE_NAME,
            PLAY_STORE_PACKAGE_NAME,
        ])
    }
}
