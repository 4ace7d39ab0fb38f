#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Network operations for appset
//!
//! This crate owns every byte that crosses the network: a small HTTP client,
//! the `RemoteSource` abstraction over a repository base location, and the
//! single worker download queue that streams artifacts into a scratch
//! directory while verifying their SHA-256 digests.

mod client;
mod queue;
mod source;

pub use client::{NetClient, NetConfig};
pub use queue::{DownloadHandle, DownloadQueue};
pub use source::{source_for_url, ByteStream, HttpSource, LocalSource, RemoteSource};

use appset_errors::{Error, NetworkError};
use url::Url;

/// Parse a repository base URL, normalising it to end with `/`
///
/// Relative paths are joined onto the base, so a missing trailing slash
/// would otherwise drop the last path segment.
///
/// # Errors
///
/// Returns an error if the URL is invalid or uses an unsupported scheme.
pub fn parse_base_url(url: &str) -> Result<Url, Error> {
    let mut parsed = Url::parse(url).map_err(|e| NetworkError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" | "file" => {}
        scheme => {
            return Err(NetworkError::UnsupportedProtocol {
                protocol: scheme.to_string(),
            }
            .into())
        }
    }

    if !parsed.path().ends_with('/') {
        let path = format!("{}/", parsed.path());
        parsed.set_path(&path);
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let url = parse_base_url("https://apps.example.org/repo").unwrap();
        assert_eq!(url.as_str(), "https://apps.example.org/repo/");
        assert_eq!(
            url.join("metadata.json").unwrap().as_str(),
            "https://apps.example.org/repo/metadata.json"
        );
    }

    #[test]
    fn test_unsupported_scheme() {
        let err = parse_base_url("ftp://example.org/").unwrap_err();
        assert!(matches!(
            err,
            Error::Network(NetworkError::UnsupportedProtocol { .. })
        ));
    }

    #[test]
    fn test_invalid_url() {
        assert!(parse_base_url("not a url").is_err());
    }
}
