// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock provider for testing.
//!
//! A simple provider implementation that simulates a multi-region cloud
//! without creating real instances.

use async_trait::async_trait;
use chrono::Utc;
use cloudmaker_archive::{InstanceProperties, LaunchConfig, PropertySpec};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::traits::*;

/// Mock region state.
#[derive(Debug, Default)]
struct MockRegion {
    name: String,
    instances: HashMap<String, Instance>,
}

#[derive(Debug, Default)]
struct MockState {
    regions: Vec<MockRegion>,
    next_id: u64,
    lookups: Vec<String>,
    user_data: HashMap<String, Vec<u8>>,
}

impl MockState {
    fn region_mut(&mut self, name: &str) -> Option<&mut MockRegion> {
        self.regions.iter_mut().find(|r| r.name == name)
    }
}

/// Mock provider for testing.
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
    default_region: String,
    schema: Vec<PropertySpec>,
    /// If true, instance creation fails
    pub fail_create: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a mock provider with a single `us-east-1` region.
    pub fn new() -> Self {
        Self::with_regions(&["us-east-1"])
    }

    /// Create a mock provider with `regions`; the first one is the default.
    pub fn with_regions(regions: &[&str]) -> Self {
        let state = MockState {
            regions: regions
                .iter()
                .map(|name| MockRegion {
                    name: name.to_string(),
                    instances: HashMap::new(),
                })
                .collect(),
            ..Default::default()
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            default_region: regions.first().unwrap_or(&"us-east-1").to_string(),
            schema: Vec::new(),
            fail_create: false,
        }
    }

    /// Create a mock provider whose instance creation fails.
    pub fn failing() -> Self {
        Self {
            fail_create: true,
            ..Self::new()
        }
    }

    /// Require launch configurations to satisfy `schema`.
    pub fn with_schema(mut self, schema: Vec<PropertySpec>) -> Self {
        self.schema = schema;
        self
    }

    /// Place an instance directly into `region`.
    pub async fn insert_instance(&self, region: &str, properties: InstanceProperties) {
        let mut state = self.state.lock().await;
        if state.region_mut(region).is_none() {
            state.regions.push(MockRegion {
                name: region.to_string(),
                instances: HashMap::new(),
            });
        }
        if let Some(r) = state.region_mut(region) {
            let instance = Instance {
                properties,
                scope: region.to_string(),
            };
            r.instances.insert(instance.id().to_string(), instance);
        }
    }

    /// Scopes searched so far, in order.
    pub async fn lookups(&self) -> Vec<String> {
        self.state.lock().await.lookups.clone()
    }

    /// Boot payload an instance was created with.
    pub async fn user_data(&self, instance_id: &str) -> Option<Vec<u8>> {
        self.state.lock().await.user_data.get(instance_id).cloned()
    }

    async fn region_names(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.regions.iter().map(|r| r.name.clone()).collect()
    }

    async fn target_region(&self, config: &LaunchConfig) -> Result<String> {
        match config.get_str("availability_zone") {
            Some(zone) => region_from_availability_zone(zone, &self.region_names().await),
            None => Ok(self.default_region.clone()),
        }
    }
}

#[async_trait]
impl ScopedLookup for MockProvider {
    fn default_scope(&self) -> &str {
        &self.default_region
    }

    async fn scopes(&self) -> Result<Vec<String>> {
        Ok(self.region_names().await)
    }

    async fn lookup(&self, scope: &str, instance_id: &str) -> Result<Option<Instance>> {
        let mut state = self.state.lock().await;
        state.lookups.push(scope.to_string());
        Ok(state
            .region_mut(scope)
            .and_then(|r| r.instances.get(instance_id).cloned()))
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn provider_type(&self) -> &'static str {
        "mock"
    }

    fn config_schema(&self) -> &[PropertySpec] {
        &self.schema
    }

    async fn create_instance(&self, config: &LaunchConfig, user_data: &[u8]) -> Result<Instance> {
        if self.fail_create {
            return Err(ProviderError::CommandFailed {
                command: "mock create".to_string(),
                exit_code: Some(1),
                stderr: "Mock failure".to_string(),
            });
        }

        let region = self.target_region(config).await?;

        let mut state = self.state.lock().await;
        state.next_id += 1;
        let instance_id = format!("i-{:06}", state.next_id);

        let properties = InstanceProperties {
            instance_id: instance_id.clone(),
            image: config
                .get_str("image_id")
                .or_else(|| config.get_str("container_name"))
                .map(str::to_string),
            api_termination_disabled: Some(false),
            ip_address: Some(format!("10.0.3.{}", state.next_id % 250 + 2)),
            status: Some("running".to_string()),
            region: Some(region.clone()),
            launch_time: Some(Utc::now()),
            tags: config.tags(),
            ..Default::default()
        };

        let instance = Instance {
            properties,
            scope: region.clone(),
        };

        state.user_data.insert(instance_id.clone(), user_data.to_vec());
        if let Some(r) = state.region_mut(&region) {
            r.instances.insert(instance_id, instance.clone());
        }

        Ok(instance)
    }

    async fn find_instance(&self, instance_id: &str) -> Result<Option<Instance>> {
        find_in_scopes(self, instance_id).await
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<()> {
        let instance = find_in_scopes(self, instance_id)
            .await?
            .ok_or_else(|| ProviderError::InstanceNotFound(instance_id.to_string()))?;

        let mut state = self.state.lock().await;
        if let Some(stored) = state
            .region_mut(&instance.scope)
            .and_then(|r| r.instances.get_mut(instance_id))
        {
            stored.properties.status = Some("terminated".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_create() {
        let provider = MockProvider::new();
        let config = LaunchConfig::new()
            .with("container_name", "web1")
            .with_tag(PATH_TAG, "archives/demo");

        let instance = provider.create_instance(&config, b"payload").await.unwrap();

        assert_eq!(instance.id(), "i-000001");
        assert_eq!(instance.scope, "us-east-1");
        assert_eq!(instance.tag(PATH_TAG), Some("archives/demo"));
        assert_eq!(instance.properties.image.as_deref(), Some("web1"));
        assert_eq!(
            provider.user_data("i-000001").await.unwrap(),
            b"payload".to_vec()
        );
    }

    #[tokio::test]
    async fn test_mock_provider_sequential_ids() {
        let provider = MockProvider::new();
        let config = LaunchConfig::new();

        let first = provider.create_instance(&config, b"").await.unwrap();
        let second = provider.create_instance(&config, b"").await.unwrap();

        assert_eq!(first.id(), "i-000001");
        assert_eq!(second.id(), "i-000002");
    }

    #[tokio::test]
    async fn test_mock_provider_availability_zone() {
        let provider = MockProvider::with_regions(&["us-east-1", "eu-west-1"]);
        let config = LaunchConfig::new().with("availability_zone", "eu-west-1b");

        let instance = provider.create_instance(&config, b"").await.unwrap();

        assert_eq!(instance.scope, "eu-west-1");
        assert_eq!(instance.properties.region.as_deref(), Some("eu-west-1"));
    }

    #[tokio::test]
    async fn test_mock_provider_unknown_region() {
        let provider = MockProvider::new();
        let config = LaunchConfig::new().with("availability_zone", "mars-north-1a");

        let result = provider.create_instance(&config, b"").await;

        assert!(matches!(result, Err(ProviderError::UnknownRegion { .. })));
    }

    #[tokio::test]
    async fn test_mock_provider_failing() {
        let provider = MockProvider::failing();

        let result = provider.create_instance(&LaunchConfig::new(), b"").await;

        assert!(matches!(result, Err(ProviderError::CommandFailed { .. })));
    }

    #[tokio::test]
    async fn test_mock_provider_terminate() {
        let provider = MockProvider::new();
        let instance = provider
            .create_instance(&LaunchConfig::new(), b"")
            .await
            .unwrap();

        provider.terminate_instance(instance.id()).await.unwrap();

        let found = provider.find_instance(instance.id()).await.unwrap().unwrap();
        assert_eq!(found.properties.status.as_deref(), Some("terminated"));
    }

    #[tokio::test]
    async fn test_mock_provider_terminate_unknown() {
        let provider = MockProvider::new();

        let result = provider.terminate_instance("i-missing").await;

        assert!(matches!(result, Err(ProviderError::InstanceNotFound(_))));
    }
}
