// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Launch configuration documents.
//!
//! A launch configuration is a string-keyed YAML mapping describing how to
//! launch an instance. Providers declare the properties they rely on with a
//! [`PropertySpec`] schema; [`LaunchConfig::validate`] fills defaults and
//! reports every missing required property.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Key holding the instance tags.
pub const TAGS_KEY: &str = "tags";

/// Key holding the cloud-init document handed to the instance.
pub const CLOUD_CONFIG_KEY: &str = "cloud_config";

/// A property a provider reads from the launch configuration.
#[derive(Debug, Clone)]
pub struct PropertySpec {
    /// Property name.
    pub name: &'static str,
    /// Whether the property must be present after defaults are applied.
    pub required: bool,
    /// Value used when the property is absent.
    pub default: Option<fn() -> Value>,
    /// Human-readable description.
    pub description: &'static str,
}

impl PropertySpec {
    /// A required property without a default.
    pub const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            required: true,
            default: None,
            description,
        }
    }

    /// An optional property.
    pub const fn optional(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            required: false,
            default: None,
            description,
        }
    }

    /// Set the default value.
    pub const fn with_default(mut self, default: fn() -> Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Launch configuration as supplied by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaunchConfig {
    properties: BTreeMap<String, Value>,
}

impl LaunchConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML mapping.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML file.
    pub async fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io(path.display().to_string(), e))?;
        Self::from_yaml_str(&content)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Builder-style setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a property, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Set a single tag, creating the tag mapping if needed.
    pub fn with_tag(mut self, name: &str, value: &str) -> Self {
        let mut tags = self.tags();
        tags.insert(name.to_string(), value.to_string());
        let mapping: serde_yaml::Mapping = tags
            .into_iter()
            .map(|(k, v)| (Value::String(k), Value::String(v)))
            .collect();
        self.properties
            .insert(TAGS_KEY.to_string(), Value::Mapping(mapping));
        self
    }

    /// Raw property value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// String property value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Boolean property value.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Instance tags. Non-string scalar values are stringified.
    pub fn tags(&self) -> BTreeMap<String, String> {
        let Some(Value::Mapping(mapping)) = self.get(TAGS_KEY) else {
            return BTreeMap::new();
        };

        mapping
            .iter()
            .filter_map(|(k, v)| {
                let key = k.as_str()?.to_string();
                let value = match v {
                    Value::String(s) => s.clone(),
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    _ => return None,
                };
                Some((key, value))
            })
            .collect()
    }

    /// A single tag.
    pub fn tag(&self, name: &str) -> Option<String> {
        self.tags().remove(name)
    }

    /// The cloud-init document for the instance, if any.
    pub fn cloud_config(&self) -> Option<&Value> {
        self.get(CLOUD_CONFIG_KEY)
    }

    /// Apply defaults from `schema` and check required properties.
    ///
    /// Returns a new configuration; `self` is not modified. Every missing
    /// required property is reported.
    pub fn validate(&self, schema: &[PropertySpec]) -> Result<Self> {
        let mut validated = self.clone();
        let mut missing = Vec::new();

        for property in schema {
            if validated.properties.contains_key(property.name) {
                continue;
            }
            if let Some(default) = property.default {
                validated.set(property.name, default());
            } else if property.required {
                missing.push(property.name);
            }
        }

        if missing.is_empty() {
            Ok(validated)
        } else {
            Err(Error::MissingFields {
                context: "Launch configuration",
                fields: missing,
            })
        }
    }
}
