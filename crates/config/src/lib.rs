#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for appset
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/appset/config.toml)
//! - Environment variables
//! - CLI flags (applied by the binary)

pub mod constants;

use appset_errors::{ConfigError, Error};
use appset_types::{Capability, ManagedSet, OutputFormat};
use constants::{
    APP_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_BASE_URL, DEFAULT_CHANNEL,
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_COPY_BUFFER_SIZE, DEFAULT_MAX_USER_ACTIONS,
    DEFAULT_PUBLIC_KEY, ENV_BASE_URL, ENV_CAPABILITY, ENV_DEVICE_ROOT, ENV_OUTPUT,
    ENV_PUBLIC_KEY, MANIFEST_FILE, SIGNATURE_FILE,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub install: InstallConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeneralConfig {
    #[serde(default)]
    pub default_output: OutputFormat,
}

/// Where the signed manifest comes from and which key vouches for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_public_key")]
    pub public_key: String,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,
    #[serde(default = "default_signature_path")]
    pub signature_path: String,
}

/// Install run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    #[serde(default)]
    pub managed_apps: ManagedSet,
    #[serde(default)]
    pub capability: Capability,
    pub scratch_dir: Option<PathBuf>,
    #[serde(default = "default_max_user_actions")]
    pub max_user_actions: u32,
    #[serde(default = "default_copy_buffer_size")]
    pub copy_buffer_size: usize,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64, // seconds
    pub user_agent: Option<String>,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Root of the directory-backed package manager
    pub device_root: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            public_key: default_public_key(),
            channel: default_channel(),
            manifest_path: default_manifest_path(),
            signature_path: default_signature_path(),
        }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            managed_apps: ManagedSet::default(),
            capability: Capability::default(),
            scratch_dir: None,
            max_user_actions: DEFAULT_MAX_USER_ACTIONS,
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

// Default value functions for serde
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_public_key() -> String {
    DEFAULT_PUBLIC_KEY.to_string()
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

fn default_manifest_path() -> String {
    MANIFEST_FILE.to_string()
}

fn default_signature_path() -> String {
    SIGNATURE_FILE.to_string()
}

fn default_max_user_actions() -> u32 {
    DEFAULT_MAX_USER_ACTIONS
}

fn default_copy_buffer_size() -> usize {
    DEFAULT_COPY_BUFFER_SIZE
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        let config: Self = toml::from_str(&contents).map_err(ConfigError::from)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if fs::try_exists(&config_path).await.unwrap_or(false) {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        self.merge_env_from(|name| std::env::var(name).ok())
    }

    /// Merge values from an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds a value that cannot be parsed.
    pub fn merge_env_from<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.repository.base_url = url;
        }

        if let Some(key) = lookup(ENV_PUBLIC_KEY) {
            self.repository.public_key = key;
        }

        if let Some(capability) = lookup(ENV_CAPABILITY) {
            self.install.capability = capability.parse().map_err(|_| ConfigError::InvalidValue {
                field: ENV_CAPABILITY.to_string(),
                value: capability.clone(),
            })?;
        }

        if let Some(output) = lookup(ENV_OUTPUT) {
            self.general.default_output = match output.as_str() {
                "plain" => OutputFormat::Plain,
                "tty" => OutputFormat::Tty,
                "json" => OutputFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: ENV_OUTPUT.to_string(),
                        value: output,
                    }
                    .into())
                }
            };
        }

        if let Some(root) = lookup(ENV_DEVICE_ROOT) {
            self.paths.device_root = Some(PathBuf::from(root));
        }

        Ok(())
    }

    /// Check values that would otherwise fail deep inside a run
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<(), Error> {
        let required = [
            ("repository.base_url", &self.repository.base_url),
            ("repository.public_key", &self.repository.public_key),
            ("repository.channel", &self.repository.channel),
            ("repository.manifest_path", &self.repository.manifest_path),
            ("repository.signature_path", &self.repository.signature_path),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                }
                .into());
            }
        }

        if self.install.managed_apps.is_empty() {
            return Err(ConfigError::MissingField {
                field: "install.managed_apps".to_string(),
            }
            .into());
        }

        if self.install.copy_buffer_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "install.copy_buffer_size".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Scratch directory for downloads (with default)
    ///
    /// The directory is purged at the start and end of every install run.
    #[must_use]
    pub fn scratch_dir(&self) -> PathBuf {
        self.install.scratch_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR_NAME)
                .join("repo")
        })
    }

    /// Root of the directory-backed package manager (with default)
    #[must_use]
    pub fn device_root(&self) -> PathBuf {
        self.paths
            .device_root
            .clone()
            .unwrap_or_else(|| data_dir().join("device"))
    }

    /// Directory for debug log files (with default)
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.paths
            .log_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("logs"))
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}
