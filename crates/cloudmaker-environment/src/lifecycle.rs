// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Instance lifecycle manager.
//!
//! Ties a [`Provider`] to the archive factory:
//!
//! - `launch`: validate, render the boot payload, create the instance, archive
//! - `info`: find the instance, follow its `archive_bucket` tag, load the archive
//! - `terminate`: delegate to the provider; archives are kept

use cloudmaker_archive::{
    ArchiveContents, ArchiveFactory, BootPayloadRenderer, CloudConfigRenderer, LaunchConfig,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::provider::{Instance, PATH_TAG, Provider};

/// Result of a launch.
#[derive(Debug)]
pub struct Launched {
    /// The created instance
    pub instance: Instance,
    /// Set when the instance was created but its launch could not be archived
    pub archive_warning: Option<Error>,
}

/// Launches, inspects and terminates instances through one provider.
pub struct LifecycleManager {
    provider: Arc<dyn Provider>,
    archives: ArchiveFactory,
    renderer: Arc<dyn BootPayloadRenderer>,
}

impl LifecycleManager {
    /// Create a manager over `provider`, archiving through `archives`.
    pub fn new(provider: Arc<dyn Provider>, archives: ArchiveFactory) -> Self {
        Self {
            provider,
            archives,
            renderer: Arc::new(CloudConfigRenderer),
        }
    }

    /// Use `renderer` for boot payloads, both for the instance and its archive.
    pub fn with_renderer(mut self, renderer: Arc<dyn BootPayloadRenderer>) -> Self {
        self.archives = self.archives.with_renderer(renderer.clone());
        self.renderer = renderer;
        self
    }

    /// The provider instances are created with.
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Launch an instance and archive its launch metadata.
    ///
    /// Fails only if the instance could not be created. Archive failures
    /// are reported in [`Launched::archive_warning`].
    pub async fn launch(&self, config: &LaunchConfig) -> Result<Launched> {
        let config = config
            .validate(self.provider.config_schema())
            .map_err(Error::InvalidLaunchConfig)?;
        let user_data = self
            .renderer
            .render(&config)
            .map_err(Error::InvalidLaunchConfig)?;

        let instance = self.provider.create_instance(&config, &user_data).await?;

        info!(
            instance_id = %instance.id(),
            scope = %instance.scope,
            provider = self.provider.provider_type(),
            "Instance launched"
        );

        let archive_warning = self.archive(&config, &instance).await.err();
        if let Some(e) = &archive_warning {
            warn!(instance_id = %instance.id(), error = %e, "Failed to archive launch");
        }

        Ok(Launched {
            instance,
            archive_warning,
        })
    }

    async fn archive(&self, config: &LaunchConfig, instance: &Instance) -> Result<()> {
        let path = Self::archive_path(instance)?;
        let archive = self.archives.create(instance.id(), path).await?;
        archive.store(config, &instance.properties).await?;
        Ok(())
    }

    fn archive_path(instance: &Instance) -> Result<&str> {
        instance
            .tag(PATH_TAG)
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| Error::MissingArchiveTag {
                instance_id: instance.id().to_string(),
                tag: PATH_TAG,
            })
    }

    /// Load the archived launch metadata of an instance.
    pub async fn info(&self, instance_id: &str) -> Result<ArchiveContents> {
        let instance = self
            .provider
            .find_instance(instance_id)
            .await?
            .ok_or_else(|| Error::InstanceNotFound(instance_id.to_string()))?;
        let path = Self::archive_path(&instance)?;

        let archive = self.archives.create(instance.id(), path).await?;
        Ok(archive.load().await?)
    }

    /// Terminate an instance. Its archive is retained.
    pub async fn terminate(&self, instance_id: &str) -> Result<()> {
        self.provider.terminate_instance(instance_id).await?;
        info!(instance_id = %instance_id, "Instance terminated");
        Ok(())
    }
}
