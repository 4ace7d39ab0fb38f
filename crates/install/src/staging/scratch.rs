//! RAII guard for the run's scratch directory
//!
//! The directory is emptied when the guard is created and removed when the
//! run ends. Dropping the guard without `remove()` (for example when the
//! run task is aborted) still deletes the directory.

use appset_errors::Error;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    armed: bool,
}

impl ScratchDir {
    /// Purge and recreate `path`
    ///
    /// # Errors
    ///
    /// Returns an error if stale contents cannot be removed or the directory
    /// cannot be created.
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        remove_tree(&path).await?;
        fs::create_dir_all(&path)
            .await
            .map_err(|e| Error::io_with_path(&e, &path))?;

        Ok(Self { path, armed: true })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the directory and disarm the guard
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub async fn remove(mut self) -> Result<(), Error> {
        self.armed = false;
        remove_tree(&self.path).await
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.armed {
            // Synchronous: the runtime may be tearing down the aborted task.
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "failed to purge scratch directory");
                }
            }
        }
    }
}

async fn remove_tree(path: &Path) -> Result<(), Error> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io_with_path(&e, path)),
    }
}
