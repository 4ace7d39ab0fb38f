//! Package manager implementations

pub mod directory;
