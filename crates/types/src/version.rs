//! Application version codes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic release number of an application.
///
/// Compared numerically; a higher code is a newer release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionCode(pub u64);

impl VersionCode {
    #[must_use]
    pub fn new(code: u64) -> Self {
        Self(code)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    /// Whether `self` already satisfies a release at `required`
    #[must_use]
    pub fn meets(self, required: VersionCode) -> bool {
        self >= required
    }
}

impl fmt::Display for VersionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for VersionCode {
    fn from(code: u64) -> Self {
        Self(code)
    }
}
