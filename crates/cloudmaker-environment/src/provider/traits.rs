// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provider trait definitions.
//!
//! Defines the abstract interface for instance providers.

use async_trait::async_trait;
use cloudmaker_archive::{InstanceProperties, LaunchConfig, PropertySpec};
use thiserror::Error;

/// Tag naming the archive root path of an instance.
pub const PATH_TAG: &str = "archive_bucket";

/// Errors from provider operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    /// A required command-line tool is not installed.
    #[error("No {0} command. Install lxc?")]
    ToolNotFound(String),

    /// A provider command exited unsuccessfully.
    #[error("{command} failed (exit code {exit_code:?}): {stderr}")]
    CommandFailed {
        /// Command that was run.
        command: String,
        /// Exit code, if the process exited normally.
        exit_code: Option<i32>,
        /// Standard error output.
        stderr: String,
    },

    /// A region derived from an availability zone does not exist.
    #[error(
        "The region {region} doesn't exist - region name generated from availability_zone: {availability_zone}"
    )]
    UnknownRegion {
        /// Derived region name.
        region: String,
        /// Availability zone it was derived from.
        availability_zone: String,
    },

    /// Instance was not found in any scope.
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    /// The instance ID is not a single path segment.
    #[error("Invalid instance ID: {0:?}")]
    InvalidInstanceId(String),

    /// A launch configuration property has the wrong shape.
    #[error("Invalid launch property {property}: {message}")]
    InvalidProperty {
        /// Property name.
        property: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// A launched instance as seen by its provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Provider-reported properties
    pub properties: InstanceProperties,
    /// Scope (region, LXC path) the instance lives in
    pub scope: String,
}

impl Instance {
    /// Instance identifier.
    pub fn id(&self) -> &str {
        &self.properties.instance_id
    }

    /// A single tag value.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.properties.tag(name)
    }
}

/// Trait for instance providers.
///
/// Providers create, find and terminate instances. They do NOT archive
/// anything; archiving is handled by the lifecycle manager.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider type identifier (e.g., "lxc", "mock")
    fn provider_type(&self) -> &'static str;

    /// Launch configuration properties this provider relies on.
    fn config_schema(&self) -> &[PropertySpec];

    /// Create an instance that boots with `user_data`.
    ///
    /// `config` has already been validated against [`Provider::config_schema`].
    async fn create_instance(&self, config: &LaunchConfig, user_data: &[u8]) -> Result<Instance>;

    /// Find an instance in any scope. `Ok(None)` if it does not exist.
    async fn find_instance(&self, instance_id: &str) -> Result<Option<Instance>>;

    /// Terminate an instance.
    async fn terminate_instance(&self, instance_id: &str) -> Result<()>;
}

/// Instance lookup partitioned into scopes (regions, LXC paths).
#[async_trait]
pub trait ScopedLookup: Send + Sync {
    /// Scope searched first.
    fn default_scope(&self) -> &str;

    /// Every scope, in enumeration order.
    async fn scopes(&self) -> Result<Vec<String>>;

    /// Look up an instance in one scope.
    async fn lookup(&self, scope: &str, instance_id: &str) -> Result<Option<Instance>>;
}

/// Search the default scope, then every other scope in enumeration order.
///
/// Returns the first match.
pub async fn find_in_scopes<L>(lookup: &L, instance_id: &str) -> Result<Option<Instance>>
where
    L: ScopedLookup + ?Sized,
{
    let default_scope = lookup.default_scope();
    if let Some(instance) = lookup.lookup(default_scope, instance_id).await? {
        return Ok(Some(instance));
    }

    for scope in lookup.scopes().await? {
        if scope == default_scope {
            continue;
        }
        if let Some(instance) = lookup.lookup(&scope, instance_id).await? {
            return Ok(Some(instance));
        }
    }

    Ok(None)
}

/// Derive a region name from an availability zone and check it exists.
///
/// `us-east-1a` becomes `us-east-1`: a trailing character after a digit is dropped.
pub fn region_from_availability_zone<S: AsRef<str>>(
    availability_zone: &str,
    regions: &[S],
) -> Result<String> {
    let mut chars = availability_zone.chars().rev();
    let region = match (chars.next(), chars.next()) {
        (Some(zone), Some(digit))
            if (zone.is_alphanumeric() || zone == '_') && digit.is_ascii_digit() =>
        {
            &availability_zone[..availability_zone.len() - zone.len_utf8()]
        }
        _ => availability_zone,
    };

    if regions.iter().any(|r| r.as_ref() == region) {
        Ok(region.to_string())
    } else {
        Err(ProviderError::UnknownRegion {
            region: region.to_string(),
            availability_zone: availability_zone.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGIONS: [&str; 3] = ["us-east-1", "us-west-2", "eu-west-1"];

    #[test]
    fn test_region_from_availability_zone() {
        assert_eq!(
            region_from_availability_zone("us-east-1a", &REGIONS).unwrap(),
            "us-east-1"
        );
        assert_eq!(
            region_from_availability_zone("eu-west-1c", &REGIONS).unwrap(),
            "eu-west-1"
        );
    }

    #[test]
    fn test_region_without_zone_letter() {
        assert_eq!(
            region_from_availability_zone("us-west-2", &REGIONS).unwrap(),
            "us-west-2"
        );
    }

    #[test]
    fn test_unknown_region() {
        let err = region_from_availability_zone("ap-south-9b", &REGIONS).unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("ap-south-9"));
        assert!(msg.contains("ap-south-9b"));
    }

    #[test]
    fn test_instance_tag() {
        let mut properties = InstanceProperties::new("i-1");
        properties
            .tags
            .insert(PATH_TAG.to_string(), "archives/demo".to_string());
        let instance = Instance {
            properties,
            scope: "us-east-1".to_string(),
        };

        assert_eq!(instance.id(), "i-1");
        assert_eq!(instance.tag(PATH_TAG), Some("archives/demo"));
        assert_eq!(instance.tag("Name"), None);
    }
}
