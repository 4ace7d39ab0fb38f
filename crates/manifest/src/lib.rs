#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Repository manifest handling for appset
//!
//! The repository publishes `metadata.json`, a JSON document listing every
//! application and, per release channel, the split files that make up the
//! release together with their SHA-256 digests. This crate parses that
//! document, enforces its structural invariants, and resolves it from the
//! network only after its detached signature has been verified.

mod resolver;

pub use resolver::ManifestResolver;

use appset_errors::ManifestError;
use appset_hash::Sha256Digest;
use appset_types::VersionCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parsed and validated repository manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryManifest {
    pub time: i64,
    pub apps: BTreeMap<String, BTreeMap<String, Release>>,
}

/// One release of one application
///
/// `packages` and `hashes` are parallel and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub packages: Vec<String>,
    pub hashes: Vec<Sha256Digest>,
    pub version_code: VersionCode,
}

/// One file to download and stage for a selected release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub owner: String,
    pub split_name: String,
    pub expected_hash: Sha256Digest,
    pub remote_path: String,
}

#[derive(Deserialize)]
struct RawManifest {
    time: i64,
    apps: BTreeMap<String, BTreeMap<String, RawRelease>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRelease {
    packages: Vec<String>,
    hashes: Vec<String>,
    version_code: VersionCode,
}

/// Repository path of one split: `packages/<app>/<versionCode>/<split>`
#[must_use]
pub fn artifact_path(app: &str, version_code: VersionCode, split_name: &str) -> String {
    format!("packages/{app}/{version_code}/{split_name}")
}

impl RepositoryManifest {
    /// Parse manifest bytes and validate every release
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, a required field is missing,
    /// a release is empty, the package and hash lists differ in length, or a
    /// hash is not 64 hex characters.
    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let raw: RawManifest =
            serde_json::from_slice(bytes).map_err(|e| ManifestError::ParseError {
                message: e.to_string(),
            })?;

        let mut apps = BTreeMap::new();
        for (app, channels) in raw.apps {
            let mut releases = BTreeMap::new();
            for (channel, release) in channels {
                let release = Release::validate(&app, &channel, release)?;
                releases.insert(channel, release);
            }
            apps.insert(app, releases);
        }

        Ok(Self {
            time: raw.time,
            apps,
        })
    }

    /// Look up the release of `app` on `channel`
    ///
    /// # Errors
    ///
    /// Returns an error if the application or channel is absent.
    pub fn release(&self, app: &str, channel: &str) -> Result<&Release, ManifestError> {
        self.apps
            .get(app)
            .ok_or_else(|| ManifestError::MissingApp {
                app: app.to_string(),
            })?
            .get(channel)
            .ok_or_else(|| ManifestError::MissingChannel {
                app: app.to_string(),
                channel: channel.to_string(),
            })
    }

    /// Publication time, if the timestamp is in range
    #[must_use]
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time, 0)
    }
}

impl Release {
    fn validate(app: &str, channel: &str, raw: RawRelease) -> Result<Self, ManifestError> {
        if raw.packages.is_empty() {
            return Err(ManifestError::EmptyRelease {
                app: app.to_string(),
                channel: channel.to_string(),
            });
        }
        if raw.packages.len() != raw.hashes.len() {
            return Err(ManifestError::ArityMismatch {
                app: app.to_string(),
                channel: channel.to_string(),
                packages: raw.packages.len(),
                hashes: raw.hashes.len(),
            });
        }

        let hashes = raw
            .hashes
            .iter()
            .map(|value| {
                Sha256Digest::from_hex(value).map_err(|e| ManifestError::InvalidHash {
                    app: app.to_string(),
                    channel: channel.to_string(),
                    value: value.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            packages: raw.packages,
            hashes,
            version_code: raw.version_code,
        })
    }

    /// Artifacts of this release in manifest order
    #[must_use]
    pub fn artifacts(&self, owner: &str) -> Vec<ArtifactRef> {
        self.packages
            .iter()
            .zip(&self.hashes)
            .map(|(split_name, hash)| ArtifactRef {
                owner: owner.to_string(),
                split_name: split_name.clone(),
                expected_hash: *hash,
                remote_path: artifact_path(owner, self.version_code, split_name),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH_A: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
    const HASH_B: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn manifest_json(packages: &str, hashes: &str) -> String {
        format!(
            r#"{{"time":1,"apps":{{"x":{{"stable":{{"packages":{packages},"hashes":{hashes},"versionCode":5}}}}}}}}"#
        )
    }

    #[test]
    fn test_parse_valid_manifest() {
        let json = manifest_json(
            r#"["base.apk","split_config.en.apk"]"#,
            &format!(r#"["{HASH_A}","{HASH_B}"]"#),
        );
        let manifest = RepositoryManifest::parse(json.as_bytes()).unwrap();

        assert_eq!(manifest.time, 1);
        let release = manifest.release("x", "stable").unwrap();
        assert_eq!(release.version_code, VersionCode::new(5));
        assert_eq!(release.packages, vec!["base.apk", "split_config.en.apk"]);
        assert_eq!(release.hashes[1].to_hex(), HASH_B);
    }

    #[test]
    fn test_artifacts_follow_manifest_order() {
        let json = manifest_json(
            r#"["base.apk","split_config.en.apk"]"#,
            &format!(r#"["{HASH_A}","{HASH_B}"]"#),
        );
        let manifest = RepositoryManifest::parse(json.as_bytes()).unwrap();
        let artifacts = manifest.release("x", "stable").unwrap().artifacts("x");

        let paths: Vec<_> = artifacts.iter().map(|a| a.remote_path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["packages/x/5/base.apk", "packages/x/5/split_config.en.apk"]
        );
        assert_eq!(artifacts[0].expected_hash.to_hex(), HASH_A);
        assert_eq!(artifacts[1].owner, "x");
    }

    #[test]
    fn test_arity_mismatch() {
        let json = manifest_json(r#"["a.apk","b.apk"]"#, &format!(r#"["{HASH_A}"]"#));
        let err = RepositoryManifest::parse(json.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::ArityMismatch {
                packages: 2,
                hashes: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_release() {
        let json = manifest_json("[]", "[]");
        let err = RepositoryManifest::parse(json.as_bytes()).unwrap_err();
        assert!(matches!(err, ManifestError::EmptyRelease { .. }));
    }

    #[test]
    fn test_invalid_hash() {
        let json = manifest_json(r#"["a.apk"]"#, r#"["abcd"]"#);
        let err = RepositoryManifest::parse(json.as_bytes()).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidHash { .. }));
    }

    #[test]
    fn test_missing_fields() {
        let err = RepositoryManifest::parse(br#"{"apps":{}}"#).unwrap_err();
        assert!(matches!(err, ManifestError::ParseError { .. }));

        let json = r#"{"time":1,"apps":{"x":{"stable":{"packages":["a"],"hashes":[]}}}}"#;
        assert!(RepositoryManifest::parse(json.as_bytes()).is_err());
    }

    #[test]
    fn test_lookup_errors() {
        let json = manifest_json(r#"["a.apk"]"#, &format!(r#"["{HASH_A}"]"#));
        let manifest = RepositoryManifest::parse(json.as_bytes()).unwrap();

        assert!(matches!(
            manifest.release("y", "stable"),
            Err(ManifestError::MissingApp { .. })
        ));
        assert!(matches!(
            manifest.release("x", "beta"),
            Err(ManifestError::MissingChannel { .. })
        ));
    }

    #[test]
    fn test_serializes_back_to_wire_form() {
        let json = manifest_json(r#"["a.apk"]"#, &format!(r#"["{HASH_A}"]"#));
        let manifest = RepositoryManifest::parse(json.as_bytes()).unwrap();
        let value = serde_json::to_value(&manifest).unwrap();
        let original: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, original);
    }

    #[test]
    fn test_published_at() {
        let manifest = RepositoryManifest::parse(br#"{"time":1700000000,"apps":{}}"#).unwrap();
        assert_eq!(manifest.published_at().unwrap().timestamp(), 1_700_000_000);
    }
}
