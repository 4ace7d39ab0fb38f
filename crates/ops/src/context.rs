//! Operations context for dependency injection

use appset_config::Config;
use appset_errors::{Error, OpsError};
use appset_events::{EventEmitter, EventSender};
use appset_install::{InstallConfig, InstallCoordinator, UninstallCoordinator};
use appset_manifest::ManifestResolver;
use appset_net::{source_for_url, NetConfig, RemoteSource};
use appset_platform::{ConfirmationLauncher, DirectoryPackageInstaller, PackageInstaller};
use appset_signing::ContentVerifier;
use std::sync::Arc;
use std::time::Duration;

/// Everything a run needs, wired once from configuration
pub struct OpsCtx {
    /// Effective configuration
    pub config: Config,
    /// Repository the manifest and artifacts come from
    pub source: Arc<dyn RemoteSource>,
    /// Trust anchor for the manifest signature
    pub verifier: ContentVerifier,
    /// Package manager collaborator
    pub installer: Arc<dyn PackageInstaller>,
    /// Presents confirmation prompts to the user
    pub launcher: Arc<dyn ConfirmationLauncher>,
    /// Event sender for progress reporting
    pub tx: EventSender,
}

impl std::fmt::Debug for OpsCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpsCtx")
            .field("source", &self.source.describe())
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

impl EventEmitter for OpsCtx {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(&self.tx)
    }
}

impl OpsCtx {
    /// Coordinator settings derived from the configuration
    #[must_use]
    pub fn install_config(&self) -> InstallConfig {
        let install = &self.config.install;
        InstallConfig::default()
            .with_capability(install.capability)
            .with_managed(install.managed_apps.clone())
            .with_channel(self.config.repository.channel.clone())
            .with_scratch_dir(self.config.scratch_dir())
            .with_max_user_actions(install.max_user_actions)
            .with_copy_buffer_size(install.copy_buffer_size)
    }

    #[must_use]
    pub fn install_coordinator(&self) -> InstallCoordinator {
        let resolver = ManifestResolver::new(
            self.verifier.clone(),
            self.config.repository.manifest_path.clone(),
            self.config.repository.signature_path.clone(),
        );
        InstallCoordinator::new(
            self.install_config(),
            Arc::clone(&self.source),
            resolver,
            Arc::clone(&self.installer),
            Arc::clone(&self.launcher),
        )
        .with_event_sender(self.tx.clone())
    }

    #[must_use]
    pub fn uninstall_coordinator(&self) -> UninstallCoordinator {
        UninstallCoordinator::new(
            self.install_config(),
            Arc::clone(&self.installer),
            Arc::clone(&self.launcher),
        )
        .with_event_sender(self.tx.clone())
    }
}

/// Builder for `OpsCtx`
///
/// Only the configuration, the event sender and the confirmation launcher
/// are required. The repository source, verifier and package installer are
/// derived from the configuration unless set explicitly.
#[derive(Default)]
pub struct OpsContextBuilder {
    config: Option<Config>,
    source: Option<Arc<dyn RemoteSource>>,
    installer: Option<Arc<dyn PackageInstaller>>,
    launcher: Option<Arc<dyn ConfirmationLauncher>>,
    tx: Option<EventSender>,
}

impl OpsContextBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Use `source` instead of the configured base URL
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn RemoteSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Use `installer` instead of the directory-backed package manager
    #[must_use]
    pub fn with_installer(mut self, installer: Arc<dyn PackageInstaller>) -> Self {
        self.installer = Some(installer);
        self
    }

    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn ConfirmationLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Build the context
    ///
    /// # Errors
    ///
    /// Returns an error if a required component is missing, the configuration
    /// is invalid, the public key cannot be decoded or the base URL is not
    /// usable.
    pub fn build(self) -> Result<OpsCtx, Error> {
        let config = self.config.ok_or_else(|| missing("config"))?;
        let tx = self.tx.ok_or_else(|| missing("event_sender"))?;
        let launcher = self.launcher.ok_or_else(|| missing("launcher"))?;
        config.validate()?;

        let verifier = ContentVerifier::from_base64(&config.repository.public_key)?;

        let source = match self.source {
            Some(source) => source,
            None => {
                let mut net = NetConfig::default()
                    .with_connect_timeout(Duration::from_secs(config.network.connect_timeout));
                if let Some(user_agent) = &config.network.user_agent {
                    net = net.with_user_agent(user_agent.clone());
                }
                source_for_url(&config.repository.base_url, &net)?
            }
        };

        let installer = self.installer.unwrap_or_else(|| {
            Arc::new(DirectoryPackageInstaller::new(
                config.device_root(),
                config.install.capability,
            ))
        });

        tracing::debug!(
            source = %source.describe(),
            key_id = %verifier.public_key().key_id(),
            capability = %config.install.capability,
            "operations context ready"
        );

        Ok(OpsCtx {
            config,
            source,
            verifier,
            installer,
            launcher,
            tx,
        })
    }
}

fn missing(component: &str) -> Error {
    OpsError::ContextCreationFailed {
        message: format!("missing component: {component}"),
    }
    .into()
}
