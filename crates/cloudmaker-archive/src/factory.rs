// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Archive factory.
//!
//! Selects the archive backend from a `type` discriminator:
//!
//! | `type` | Backend |
//! |--------|---------|
//! | absent, `ec2` | S3 object storage |
//! | `local` | Local filesystem |
//!
//! Resolution into [`ArchiveSettings`] is pure: the caller's options are only
//! borrowed, and every missing field is reported at once.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::archive::Archive;
use crate::error::{Error, RequiredFields, Result};
use crate::keystore::{
    BucketClient, FilesystemKeyStore, KeyStore, ObjectStorageKeyStore, S3BucketClient,
    S3Credentials,
};
use crate::render::BootPayloadRenderer;

/// Archive backend selected by the `type` option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    /// S3 object storage (default)
    #[default]
    Ec2,
    /// Local filesystem
    Local,
}

impl std::fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveType::Ec2 => write!(f, "ec2"),
            ArchiveType::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for ArchiveType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ec2" => Ok(ArchiveType::Ec2),
            "local" => Ok(ArchiveType::Local),
            _ => Err(Error::UnknownArchiveType(s.to_string())),
        }
    }
}

/// Connection options shared by every archive a factory creates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveOptions {
    /// Backend discriminator; `None` selects the default.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub archive_type: Option<String>,
    /// S3 access key ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_access_key_id: Option<String>,
    /// S3 secret access key.
    #[serde(default, skip_serializing)]
    pub aws_secret_access_key: Option<String>,
    /// S3 region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Endpoint of an S3-compatible service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl ArchiveOptions {
    /// Options selecting the local filesystem backend.
    pub fn local() -> Self {
        Self {
            archive_type: Some(ArchiveType::Local.to_string()),
            ..Default::default()
        }
    }

    /// Parsed backend discriminator.
    pub fn archive_type(&self) -> Result<ArchiveType> {
        match self.archive_type.as_deref() {
            None => Ok(ArchiveType::default()),
            Some(value) => value.parse(),
        }
    }
}

/// Fully specified settings for one archive.
#[derive(Debug, Clone)]
pub enum ArchiveSettings {
    /// Filesystem archive.
    Local {
        /// Instance the archive describes.
        instance_id: String,
        /// Root directory.
        path: String,
    },
    /// Object storage archive.
    ObjectStorage {
        /// Instance the archive describes.
        instance_id: String,
        /// `bucket[/prefix]` root.
        path: String,
        /// Static credentials; `None` when the factory supplies its own client.
        credentials: Option<S3Credentials>,
        /// S3 region.
        region: Option<String>,
        /// S3-compatible endpoint.
        endpoint: Option<String>,
    },
}

impl ArchiveSettings {
    /// Resolve `options` for one instance.
    ///
    /// With `client_provided`, credentials are not required.
    pub fn resolve(
        options: &ArchiveOptions,
        instance_id: Option<&str>,
        path: Option<&str>,
        client_provided: bool,
    ) -> Result<Self> {
        let archive_type = options.archive_type()?;

        let mut fields = RequiredFields::new("Archive");
        let instance_id = fields.require("instance_id", instance_id).to_string();
        let path = fields.require("path", path).to_string();

        let settings = match archive_type {
            ArchiveType::Local => ArchiveSettings::Local { instance_id, path },
            ArchiveType::Ec2 => {
                let credentials = if client_provided {
                    None
                } else {
                    let access_key_id = fields
                        .require("aws_access_key_id", options.aws_access_key_id.as_deref())
                        .to_string();
                    let secret_access_key = fields
                        .require(
                            "aws_secret_access_key",
                            options.aws_secret_access_key.as_deref(),
                        )
                        .to_string();
                    Some(S3Credentials {
                        access_key_id,
                        secret_access_key,
                    })
                };

                ArchiveSettings::ObjectStorage {
                    instance_id,
                    path,
                    credentials,
                    region: options.region.clone(),
                    endpoint: options.endpoint.clone(),
                }
            }
        };

        fields.finish()?;
        Ok(settings)
    }

    /// Backend the settings select.
    pub fn archive_type(&self) -> ArchiveType {
        match self {
            ArchiveSettings::Local { .. } => ArchiveType::Local,
            ArchiveSettings::ObjectStorage { .. } => ArchiveType::Ec2,
        }
    }

    /// Instance the archive describes.
    pub fn instance_id(&self) -> &str {
        match self {
            ArchiveSettings::Local { instance_id, .. }
            | ArchiveSettings::ObjectStorage { instance_id, .. } => instance_id,
        }
    }

    /// Root path of the archive.
    pub fn path(&self) -> &str {
        match self {
            ArchiveSettings::Local { path, .. } | ArchiveSettings::ObjectStorage { path, .. } => {
                path
            }
        }
    }
}

/// Builds [`Archive`]s from shared options.
#[derive(Clone, Default)]
pub struct ArchiveFactory {
    options: ArchiveOptions,
    bucket_client: Option<Arc<dyn BucketClient>>,
    renderer: Option<Arc<dyn BootPayloadRenderer>>,
}

impl std::fmt::Debug for ArchiveFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveFactory")
            .field("options", &self.options)
            .field(
                "bucket_client",
                &self.bucket_client.as_ref().map(|c| c.client_type()),
            )
            .finish()
    }
}

impl ArchiveFactory {
    /// Create a factory.
    pub fn new(options: ArchiveOptions) -> Self {
        Self {
            options,
            bucket_client: None,
            renderer: None,
        }
    }

    /// Use `client` for object storage instead of building an S3 client from credentials.
    pub fn with_bucket_client(mut self, client: Arc<dyn BucketClient>) -> Self {
        self.bucket_client = Some(client);
        self
    }

    /// Use `renderer` for the boot payload of every archive.
    pub fn with_renderer(mut self, renderer: Arc<dyn BootPayloadRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Options the factory was created with.
    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Resolve settings for one instance without touching any backend.
    pub fn settings(&self, instance_id: &str, path: &str) -> Result<ArchiveSettings> {
        ArchiveSettings::resolve(
            &self.options,
            Some(instance_id),
            Some(path),
            self.bucket_client.is_some(),
        )
    }

    /// Build the archive for `instance_id` rooted at `path`.
    ///
    /// Object storage archives verify that the bucket exists.
    pub async fn create(&self, instance_id: &str, path: &str) -> Result<Archive> {
        let settings = self.settings(instance_id, path)?;

        let store: Box<dyn KeyStore> = match &settings {
            ArchiveSettings::Local { path, .. } => Box::new(FilesystemKeyStore::new(path)?),
            ArchiveSettings::ObjectStorage {
                path,
                credentials,
                region,
                endpoint,
                ..
            } => {
                let client: Arc<dyn BucketClient> = match (&self.bucket_client, credentials) {
                    (Some(client), _) => client.clone(),
                    (None, Some(credentials)) => Arc::new(S3BucketClient::new(
                        credentials,
                        region.as_deref(),
                        endpoint.as_deref(),
                    )),
                    (None, None) => {
                        return Err(Error::MissingFields {
                            context: "Archive",
                            fields: vec!["aws_access_key_id", "aws_secret_access_key"],
                        });
                    }
                };
                Box::new(ObjectStorageKeyStore::connect(client, path).await?)
            }
        };

        debug!(
            instance_id = %settings.instance_id(),
            archive_type = %settings.archive_type(),
            path = %settings.path(),
            "Created archive"
        );

        let archive = Archive::new(settings.instance_id(), store)?;
        Ok(match &self.renderer {
            Some(renderer) => archive.with_renderer(renderer.clone()),
            None => archive,
        })
    }
}

/// Build an archive from `options` for one instance.
pub async fn create_archive(
    options: &ArchiveOptions,
    instance_id: &str,
    path: &str,
) -> Result<Archive> {
    ArchiveFactory::new(options.clone())
        .create(instance_id, path)
        .await
}
