//! Repository base locations that serve raw byte streams

use crate::client::{NetClient, NetConfig};
use crate::parse_base_url;
use appset_errors::{Error, NetworkError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use url::Url;

/// Stream of body chunks for one remote resource
pub type ByteStream = BoxStream<'static, Result<Bytes, Error>>;

const LOCAL_READ_CHUNK: usize = 64 * 1024;

/// A location that resolves relative paths to byte streams
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Open `relative_path` below the base location
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be opened.
    async fn open(&self, relative_path: &str) -> Result<ByteStream, Error>;

    /// Human readable location, used in logs
    fn describe(&self) -> String;
}

/// Build the source matching a base URL's scheme
///
/// # Errors
///
/// Returns an error if the URL is invalid or the HTTP client cannot be built.
pub fn source_for_url(base_url: &str, config: &NetConfig) -> Result<Arc<dyn RemoteSource>, Error> {
    let base = parse_base_url(base_url)?;
    if base.scheme() == "file" {
        let root = base
            .to_file_path()
            .map_err(|()| NetworkError::InvalidUrl(base_url.to_string()))?;
        Ok(Arc::new(LocalSource::new(root)))
    } else {
        Ok(Arc::new(HttpSource::new(NetClient::new(config)?, base)))
    }
}

/// Reject absolute paths and parent traversal in repository paths
pub(crate) fn checked_relative(relative_path: &str) -> Result<PathBuf, Error> {
    let path = Path::new(relative_path);
    let valid = !relative_path.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

    if valid {
        Ok(path.to_path_buf())
    } else {
        Err(NetworkError::InvalidUrl(format!("invalid repository path: {relative_path}")).into())
    }
}

/// `GET <base>/<path>` over HTTP(S)
#[derive(Clone)]
pub struct HttpSource {
    client: NetClient,
    base: Url,
}

impl HttpSource {
    #[must_use]
    pub fn new(client: NetClient, base: Url) -> Self {
        Self { client, base }
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn open(&self, relative_path: &str) -> Result<ByteStream, Error> {
        checked_relative(relative_path)?;
        let url = self
            .base
            .join(relative_path)
            .map_err(|e| NetworkError::InvalidUrl(e.to_string()))?;

        tracing::debug!(url = %url, "requesting");
        let response = self.client.get(url.as_str()).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpError {
                status: status.as_u16(),
                url: url.to_string(),
            }
            .into());
        }

        Ok(response
            .bytes_stream()
            .map_err(|e| Error::from(NetworkError::DownloadFailed(e.to_string())))
            .boxed())
    }

    fn describe(&self) -> String {
        self.base.to_string()
    }
}

/// A repository mirror on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl RemoteSource for LocalSource {
    async fn open(&self, relative_path: &str) -> Result<ByteStream, Error> {
        let path = self.root.join(checked_relative(relative_path)?);
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| Error::io_with_path(&e, &path))?;

        let chunks = stream::try_unfold((file, path), |(file, path)| read_chunk(file, path));

        Ok(chunks.boxed())
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

async fn read_chunk(
    mut file: tokio::fs::File,
    path: PathBuf,
) -> Result<Option<(Bytes, (tokio::fs::File, PathBuf))>, Error> {
    let mut buf = vec![0u8; LOCAL_READ_CHUNK];
    let read = file
        .read(&mut buf)
        .await
        .map_err(|e| Error::io_with_path(&e, &path))?;
    if read == 0 {
        return Ok(None);
    }
    buf.truncate(read);
    Ok(Some((Bytes::from(buf), (file, path))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_relative() {
        assert!(checked_relative("packages/x/5/x.apk").is_ok());
        assert!(checked_relative("metadata.json").is_ok());
        assert!(checked_relative("").is_err());
        assert!(checked_relative("/etc/passwd").is_err());
        assert!(checked_relative("packages/../../secret").is_err());
    }

    #[tokio::test]
    async fn test_local_source_reads_file() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("packages/a/1")).unwrap();
        let content = vec![7u8; LOCAL_READ_CHUNK + 10];
        std::fs::write(temp.path().join("packages/a/1/a.apk"), &content).unwrap();

        let source = LocalSource::new(temp.path());
        let chunks: Vec<Bytes> = source
            .open("packages/a/1/a.apk")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.concat(), content);
    }

    #[tokio::test]
    async fn test_local_source_missing_file() {
        let temp = tempfile::tempdir().unwrap();
        let source = LocalSource::new(temp.path());
        let result = source.open("missing.json").await;
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[tokio::test]
    async fn test_source_for_file_url() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("metadata.json"), b"{}").unwrap();
        let url = Url::from_directory_path(temp.path()).unwrap();

        let source = source_for_url(url.as_str(), &NetConfig::default()).unwrap();
        let body: Vec<Bytes> = source
            .open("metadata.json")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(body.concat(), b"{}");
    }
}
