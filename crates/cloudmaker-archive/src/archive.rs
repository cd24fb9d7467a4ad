// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-instance launch archives.
//!
//! An archive holds three artifacts for one instance:
//!
//! ```text
//! <root-path>/<instance-id>/user_data          rendered boot payload
//! <root-path>/<instance-id>/instance.yaml      instance properties snapshot
//! <root-path>/<instance-id>/cloud_config.yaml  launch configuration snapshot
//! ```
//!
//! Keys are derived from the instance ID and root path alone, so any caller
//! holding both values can rebuild the archive without another index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Error, RequiredFields, Result};
use crate::keystore::{KeyStore, join_key, normalize_path};
use crate::launch_config::LaunchConfig;
use crate::render::{BootPayloadRenderer, CloudConfigRenderer};

/// The three artifacts stored per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// Rendered boot payload.
    UserData,
    /// Instance properties snapshot.
    InstanceYaml,
    /// Launch configuration snapshot.
    CloudConfigYaml,
}

impl Artifact {
    /// All artifacts, in write order.
    pub const ALL: [Artifact; 3] = [
        Artifact::UserData,
        Artifact::InstanceYaml,
        Artifact::CloudConfigYaml,
    ];

    /// File/object name of the artifact.
    pub const fn name(self) -> &'static str {
        match self {
            Artifact::UserData => "user_data",
            Artifact::InstanceYaml => "instance.yaml",
            Artifact::CloudConfigYaml => "cloud_config.yaml",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Full keys of an instance's artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveKeys {
    /// `<root>/<id>/user_data`
    pub user_data: String,
    /// `<root>/<id>/instance.yaml`
    pub instance_yaml: String,
    /// `<root>/<id>/cloud_config.yaml`
    pub cloud_config_yaml: String,
}

/// True when `instance_id` names a single path segment.
///
/// IDs are joined onto archive roots and data directories, so separators and
/// dot segments are refused.
pub fn is_valid_instance_id(instance_id: &str) -> bool {
    !instance_id.is_empty()
        && instance_id != "."
        && instance_id != ".."
        && !instance_id.contains(['/', '\\'])
}

impl ArchiveKeys {
    /// Derive the keys for `instance_id` under `root_path`.
    ///
    /// Both inputs are required; empty path segments are ignored.
    pub fn derive(instance_id: &str, root_path: &str) -> Result<Self> {
        let mut fields = RequiredFields::new("Archive");
        let instance_id = fields.require("instance_id", Some(instance_id));
        let root_path = fields.require("path", Some(root_path));
        fields.finish()?;
        if !is_valid_instance_id(instance_id) {
            return Err(Error::InvalidInstanceId(instance_id.to_string()));
        }

        let root = normalize_path(root_path);
        let key = |artifact: Artifact| join_key(&[root.as_str(), instance_id, artifact.name()]);

        Ok(Self {
            user_data: key(Artifact::UserData),
            instance_yaml: key(Artifact::InstanceYaml),
            cloud_config_yaml: key(Artifact::CloudConfigYaml),
        })
    }

    /// Key of one artifact.
    pub fn get(&self, artifact: Artifact) -> &str {
        match artifact {
            Artifact::UserData => &self.user_data,
            Artifact::InstanceYaml => &self.instance_yaml,
            Artifact::CloudConfigYaml => &self.cloud_config_yaml,
        }
    }
}

/// Provider-reported attributes of an instance right after launch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceProperties {
    /// Instance identifier.
    pub instance_id: String,
    /// Image (AMI or container template) the instance was launched from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Whether API termination is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_termination_disabled: Option<bool>,
    /// Public DNS name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,
    /// Public IP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Private IP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ip_address: Option<String>,
    /// SSH key pair name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    /// Account owning the instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Provider status (e.g., "pending", "running").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Region or scope the instance lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// When the instance was launched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_time: Option<DateTime<Utc>>,
    /// Instance tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl InstanceProperties {
    /// Properties with only the identifier set.
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Default::default()
        }
    }

    /// A single tag value.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }
}

/// Everything stored for one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveContents {
    /// Boot payload, byte-for-byte as rendered at launch.
    #[serde(with = "payload_text")]
    pub user_data: Vec<u8>,
    /// Launch configuration snapshot.
    pub cloud_config: LaunchConfig,
    /// Instance properties snapshot.
    pub instance: InstanceProperties,
}

/// Serializes the payload as text when it is valid UTF-8, bytes otherwise.
mod payload_text {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Payload {
        Text(String),
        Bytes(Vec<u8>),
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(bytes) {
            Ok(text) => text.serialize(serializer),
            Err(_) => bytes.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(match Payload::deserialize(deserializer)? {
            Payload::Text(text) => text.into_bytes(),
            Payload::Bytes(bytes) => bytes,
        })
    }
}

/// Launch archive for a single instance.
pub struct Archive {
    instance_id: String,
    keys: ArchiveKeys,
    store: Box<dyn KeyStore>,
    renderer: Arc<dyn BootPayloadRenderer>,
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("instance_id", &self.instance_id)
            .field("root", &self.store.root())
            .field("backend", &self.store.backend_type())
            .finish()
    }
}

impl Archive {
    /// Create an archive for `instance_id` over `store`.
    ///
    /// The root path is the store's root.
    pub fn new(instance_id: &str, store: Box<dyn KeyStore>) -> Result<Self> {
        let keys = ArchiveKeys::derive(instance_id, store.root())?;
        Ok(Self {
            instance_id: instance_id.trim().to_string(),
            keys,
            store,
            renderer: Arc::new(CloudConfigRenderer),
        })
    }

    /// Replace the boot payload renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn BootPayloadRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Instance this archive describes.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Normalized root path.
    pub fn root(&self) -> &str {
        self.store.root()
    }

    /// Backend type of the underlying store.
    pub fn backend_type(&self) -> &'static str {
        self.store.backend_type()
    }

    /// Full keys of the three artifacts.
    pub fn keys(&self) -> &ArchiveKeys {
        &self.keys
    }

    fn store_key(&self, artifact: Artifact) -> String {
        join_key(&[self.instance_id.as_str(), artifact.name()])
    }

    async fn write(&self, artifact: Artifact, value: &[u8]) -> Result<()> {
        self.store
            .write(&self.store_key(artifact), value)
            .await
            .map_err(|e| Error::Artifact {
                operation: "write",
                artifact,
                source: Box::new(e),
            })
    }

    async fn read(&self, artifact: Artifact) -> Result<Vec<u8>> {
        self.store
            .read(&self.store_key(artifact))
            .await
            .map_err(|e| Error::Artifact {
                operation: "read",
                artifact,
                source: Box::new(e),
            })
    }

    fn parse<T: serde::de::DeserializeOwned>(artifact: Artifact, bytes: &[u8]) -> Result<T> {
        serde_yaml::from_slice(bytes).map_err(|e| Error::Artifact {
            operation: "parse",
            artifact,
            source: Box::new(Error::Yaml(e)),
        })
    }

    fn serialize<T: Serialize>(artifact: Artifact, value: &T) -> Result<String> {
        serde_yaml::to_string(value).map_err(|e| Error::Artifact {
            operation: "serialize",
            artifact,
            source: Box::new(Error::Yaml(e)),
        })
    }

    /// Render the boot payload and write all three artifacts.
    ///
    /// Writes are independent: a failure is returned immediately and earlier
    /// writes are left in place.
    pub async fn store(
        &self,
        config: &LaunchConfig,
        properties: &InstanceProperties,
    ) -> Result<()> {
        let user_data = self.renderer.render(config)?;
        let instance_yaml = Self::serialize(Artifact::InstanceYaml, properties)?;
        let cloud_config_yaml = Self::serialize(Artifact::CloudConfigYaml, config)?;

        self.write(Artifact::UserData, &user_data).await?;
        self.write(Artifact::InstanceYaml, instance_yaml.as_bytes())
            .await?;
        self.write(Artifact::CloudConfigYaml, cloud_config_yaml.as_bytes())
            .await?;

        info!(
            instance_id = %self.instance_id,
            root = %self.root(),
            backend = self.backend_type(),
            "Stored launch archive"
        );

        Ok(())
    }

    /// Read all three artifacts and parse the two YAML documents.
    pub async fn load(&self) -> Result<ArchiveContents> {
        let user_data = self.read(Artifact::UserData).await?;
        let cloud_config = self.read(Artifact::CloudConfigYaml).await?;
        let instance = self.read(Artifact::InstanceYaml).await?;

        debug!(instance_id = %self.instance_id, root = %self.root(), "Loaded launch archive");

        Ok(ArchiveContents {
            user_data,
            cloud_config: Self::parse(Artifact::CloudConfigYaml, &cloud_config)?,
            instance: Self::parse(Artifact::InstanceYaml, &instance)?,
        })
    }
}
