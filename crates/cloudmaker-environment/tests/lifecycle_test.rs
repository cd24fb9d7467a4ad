// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the lifecycle manager (launch, info, terminate) over the mock provider.

use cloudmaker_archive::keystore::MemoryBucketClient;
use cloudmaker_archive::{
    ArchiveFactory, ArchiveOptions, BootPayloadRenderer, CloudConfigRenderer, ErrorKind,
    InstanceProperties, LaunchConfig,
};
use cloudmaker_environment::Error;
use cloudmaker_environment::lifecycle::LifecycleManager;
use cloudmaker_environment::provider::lxc::LXC_CONFIG_SCHEMA;
use cloudmaker_environment::provider::{MockProvider, PATH_TAG, Provider};
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

fn web1_config(archive_path: &str) -> LaunchConfig {
    LaunchConfig::new()
        .with("container_name", "web1")
        .with("ephemeral", true)
        .with_tag(PATH_TAG, archive_path)
}

fn lxc_like_provider() -> Arc<MockProvider> {
    Arc::new(MockProvider::new().with_schema(LXC_CONFIG_SCHEMA.to_vec()))
}

fn object_storage_factory(client: &MemoryBucketClient) -> ArchiveFactory {
    ArchiveFactory::new(ArchiveOptions::default()).with_bucket_client(Arc::new(client.clone()))
}

struct StaticRenderer;

impl BootPayloadRenderer for StaticRenderer {
    fn render(&self, _config: &LaunchConfig) -> cloudmaker_archive::Result<Vec<u8>> {
        Ok(b"#!/bin/sh\necho hello\n".to_vec())
    }
}

// ============================================================================
// End-to-end
// ============================================================================

#[tokio::test]
async fn test_launch_then_info_object_storage() {
    let client = MemoryBucketClient::with_bucket("archives");
    let provider = lxc_like_provider();
    let manager = LifecycleManager::new(provider.clone(), object_storage_factory(&client));
    let config = web1_config("archives/demo");

    let launched = manager.launch(&config).await.unwrap();

    assert!(launched.archive_warning.is_none());
    assert_eq!(launched.instance.id(), "i-000001");
    assert_eq!(
        client.keys("archives").await,
        vec![
            "demo/i-000001/cloud_config.yaml",
            "demo/i-000001/instance.yaml",
            "demo/i-000001/user_data",
        ]
    );

    let contents = manager.info("i-000001").await.unwrap();

    assert_eq!(contents.cloud_config, config);
    assert_eq!(contents.instance, launched.instance.properties);
    assert_eq!(contents.instance.tag(PATH_TAG), Some("archives/demo"));
    assert_eq!(
        contents.user_data,
        provider.user_data("i-000001").await.unwrap()
    );
}

#[tokio::test]
async fn test_launch_then_info_local() {
    let temp = TempDir::new().unwrap();
    let root = format!("{}/archives/demo", temp.path().display());
    let manager = LifecycleManager::new(
        lxc_like_provider(),
        ArchiveFactory::new(ArchiveOptions::local()),
    );

    manager.launch(&web1_config(&root)).await.unwrap();

    for name in ["user_data", "instance.yaml", "cloud_config.yaml"] {
        assert!(
            temp.path()
                .join("archives/demo/i-000001")
                .join(name)
                .is_file()
        );
    }

    let contents = manager.info("i-000001").await.unwrap();
    assert_eq!(contents.cloud_config.get_str("container_name"), Some("web1"));
    assert_eq!(
        contents.user_data,
        CloudConfigRenderer.render(&web1_config(&root)).unwrap()
    );
}

#[tokio::test]
async fn test_launch_fills_schema_defaults() {
    let client = MemoryBucketClient::with_bucket("archives");
    let manager = LifecycleManager::new(lxc_like_provider(), object_storage_factory(&client));
    let config = LaunchConfig::new()
        .with("container_name", "web1")
        .with_tag(PATH_TAG, "archives");

    manager.launch(&config).await.unwrap();

    let contents = manager.info("i-000001").await.unwrap();
    assert_eq!(contents.cloud_config.get_bool("ephemeral"), Some(true));
}

#[tokio::test]
async fn test_custom_renderer_reaches_instance_and_archive() {
    let client = MemoryBucketClient::with_bucket("archives");
    let provider = lxc_like_provider();
    let manager = LifecycleManager::new(provider.clone(), object_storage_factory(&client))
        .with_renderer(Arc::new(StaticRenderer));

    manager.launch(&web1_config("archives")).await.unwrap();

    let expected = b"#!/bin/sh\necho hello\n".to_vec();
    assert_eq!(provider.user_data("i-000001").await.unwrap(), expected);
    assert_eq!(
        client.object("archives", "i-000001/user_data").await.unwrap(),
        expected
    );
}

// ============================================================================
// Launch failures and warnings
// ============================================================================

#[tokio::test]
async fn test_launch_invalid_config_creates_nothing() {
    let provider = lxc_like_provider();
    let manager = LifecycleManager::new(provider.clone(), ArchiveFactory::default());

    let err = manager
        .launch(&LaunchConfig::new().with_tag(PATH_TAG, "archives"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidLaunchConfig(_)));
    assert!(err.to_string().contains("container_name"));
    assert!(provider.find_instance("i-000001").await.unwrap().is_none());
}

#[tokio::test]
async fn test_launch_provider_failure_is_error() {
    let manager = LifecycleManager::new(
        Arc::new(MockProvider::failing()),
        ArchiveFactory::default(),
    );

    let err = manager.launch(&web1_config("archives")).await.unwrap_err();

    assert!(matches!(err, Error::Provider(_)));
}

#[tokio::test]
async fn test_archive_failure_is_warning() {
    let client = MemoryBucketClient::new();
    let provider = lxc_like_provider();
    let manager = LifecycleManager::new(provider.clone(), object_storage_factory(&client));

    let launched = manager.launch(&web1_config("missing/demo")).await.unwrap();

    match launched.archive_warning {
        Some(Error::Archive(e)) => assert_eq!(e.kind(), ErrorKind::Configuration),
        other => panic!("expected archive warning, got {other:?}"),
    }
    assert!(provider.find_instance("i-000001").await.unwrap().is_some());
    assert_eq!(client.object_requests().await, 0);
}

#[tokio::test]
async fn test_launch_without_tag_warns() {
    let manager = LifecycleManager::new(
        lxc_like_provider(),
        ArchiveFactory::new(ArchiveOptions::local()),
    );
    let config = LaunchConfig::new().with("container_name", "web1");

    let launched = manager.launch(&config).await.unwrap();

    assert!(matches!(
        launched.archive_warning,
        Some(Error::MissingArchiveTag { .. })
    ));
}

#[tokio::test]
async fn test_partial_archive_write_is_warning() {
    let client = MemoryBucketClient::with_bucket("archives");
    client.fail_put_at(3).await;
    let manager = LifecycleManager::new(lxc_like_provider(), object_storage_factory(&client));

    let launched = manager.launch(&web1_config("archives")).await.unwrap();

    let Some(Error::Archive(e)) = launched.archive_warning else {
        panic!("expected archive warning");
    };
    assert_eq!(e.kind(), ErrorKind::Transient);
    assert_eq!(
        client.keys("archives").await,
        vec!["i-000001/instance.yaml", "i-000001/user_data"]
    );
}

// ============================================================================
// Info
// ============================================================================

#[tokio::test]
async fn test_info_unknown_instance() {
    let manager = LifecycleManager::new(lxc_like_provider(), ArchiveFactory::default());

    let err = manager.info("i-404").await.unwrap_err();

    assert!(matches!(err, Error::InstanceNotFound(_)));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_info_instance_without_tag() {
    let provider = Arc::new(MockProvider::new());
    provider
        .insert_instance("us-east-1", InstanceProperties::new("i-untagged"))
        .await;
    let manager = LifecycleManager::new(provider, ArchiveFactory::default());

    let err = manager.info("i-untagged").await.unwrap_err();

    assert!(matches!(err, Error::MissingArchiveTag { .. }));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_info_without_archive_is_not_found() {
    let client = MemoryBucketClient::with_bucket("archives");
    let provider = Arc::new(MockProvider::new());
    let mut properties = InstanceProperties::new("i-quiet");
    properties
        .tags
        .insert(PATH_TAG.to_string(), "archives/demo".to_string());
    provider.insert_instance("us-east-1", properties).await;
    let manager = LifecycleManager::new(provider, object_storage_factory(&client));

    let err = manager.info("i-quiet").await.unwrap_err();

    assert!(matches!(err, Error::Archive(_)));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_info_searches_other_regions() {
    let client = MemoryBucketClient::with_bucket("archives");
    let provider = Arc::new(MockProvider::with_regions(&[
        "us-east-1",
        "us-west-2",
        "eu-west-1",
    ]));
    let manager = LifecycleManager::new(provider.clone(), object_storage_factory(&client));

    let config = web1_config("archives").with("availability_zone", "eu-west-1a");
    let launched = manager.launch(&config).await.unwrap();
    assert_eq!(launched.instance.scope, "eu-west-1");

    let contents = manager.info(launched.instance.id()).await.unwrap();

    assert_eq!(contents.instance.region.as_deref(), Some("eu-west-1"));
    assert_eq!(
        provider.lookups().await,
        vec!["us-east-1", "us-west-2", "eu-west-1"]
    );
}

// ============================================================================
// Terminate
// ============================================================================

#[tokio::test]
async fn test_terminate_keeps_archive() {
    let client = MemoryBucketClient::with_bucket("archives");
    let provider = lxc_like_provider();
    let manager = LifecycleManager::new(provider.clone(), object_storage_factory(&client));
    manager.launch(&web1_config("archives")).await.unwrap();

    manager.terminate("i-000001").await.unwrap();

    let found = provider.find_instance("i-000001").await.unwrap().unwrap();
    assert_eq!(found.properties.status.as_deref(), Some("terminated"));

    let contents = manager.info("i-000001").await.unwrap();
    assert_eq!(contents.instance.status.as_deref(), Some("running"));
}

#[tokio::test]
async fn test_terminate_unknown_instance() {
    let manager = LifecycleManager::new(lxc_like_provider(), ArchiveFactory::default());

    let err = manager.terminate("i-404").await.unwrap_err();

    assert!(err.is_not_found());
}
