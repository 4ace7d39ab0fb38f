//! Signed manifest retrieval

use crate::RepositoryManifest;
use appset_errors::{Error, SigningError};
use appset_net::DownloadQueue;
use appset_signing::{extract_signature_line, ContentVerifier};

/// Fetches the manifest and its detached signature, then verifies before parsing
#[derive(Debug, Clone)]
pub struct ManifestResolver {
    verifier: ContentVerifier,
    manifest_path: String,
    signature_path: String,
}

impl ManifestResolver {
    #[must_use]
    pub fn new(
        verifier: ContentVerifier,
        manifest_path: impl Into<String>,
        signature_path: impl Into<String>,
    ) -> Self {
        Self {
            verifier,
            manifest_path: manifest_path.into(),
            signature_path: signature_path.into(),
        }
    }

    /// Download, authenticate and parse the repository manifest
    ///
    /// Both files go through `queue`, signature first. Nothing from the
    /// manifest body is interpreted until the signature has been checked.
    ///
    /// # Errors
    ///
    /// Returns a transport error if either download fails, a signing error if
    /// the signature is missing, malformed or does not match, and a manifest
    /// error if the verified body is structurally invalid.
    pub async fn resolve(&self, queue: &DownloadQueue) -> Result<RepositoryManifest, Error> {
        let signature = queue.enqueue(self.signature_path.as_str(), None);
        let manifest = queue.enqueue(self.manifest_path.as_str(), None);

        let signature_file = signature.wait().await?;
        let manifest_file = manifest.wait().await?;

        let signature_bytes = tokio::fs::read(&signature_file)
            .await
            .map_err(|e| Error::io_with_path(&e, &signature_file))?;
        let signature_text = String::from_utf8(signature_bytes).map_err(|_| {
            SigningError::InvalidSignatureFormat("signature file is not UTF-8".to_string())
        })?;
        let signature_line = extract_signature_line(&signature_text)?;

        let body = tokio::fs::read(&manifest_file)
            .await
            .map_err(|e| Error::io_with_path(&e, &manifest_file))?;

        self.verifier.check(&body, signature_line)?;
        tracing::debug!(path = %self.manifest_path, "manifest signature verified");

        let manifest = RepositoryManifest::parse(&body)?;
        tracing::info!(
            apps = manifest.apps.len(),
            time = manifest.time,
            "repository manifest resolved"
        );
        Ok(manifest)
    }
}
