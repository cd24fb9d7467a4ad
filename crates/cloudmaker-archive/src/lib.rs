// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cloudmaker Archive - Launch Metadata Storage
//!
//! Persists what is needed to reconstruct or audit an instance launch: the
//! rendered boot payload, the launch configuration, and the instance
//! properties reported right after launch.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      ArchiveFactory                           │
//! │        type: "ec2" (default) │ "local"                        │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ create(instance_id, path)
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Archive                              │
//! │     store(config, properties)      load() -> contents         │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ write / read
//!                                ▼
//! ┌────────────────────────────┐   ┌─────────────────────────────┐
//! │    FilesystemKeyStore      │   │   ObjectStorageKeyStore     │
//! │  {dir}/{id}/{artifact}     │   │ {bucket}/{prefix}/{id}/...  │
//! └────────────────────────────┘   └──────────────┬──────────────┘
//!                                                 │ BucketClient
//!                                     ┌───────────┴───────────┐
//!                                     │ S3BucketClient        │
//!                                     │ MemoryBucketClient    │
//!                                     └───────────────────────┘
//! ```
//!
//! # Key Layout
//!
//! | Key | Content |
//! |-----|---------|
//! | `<root>/<instance-id>/user_data` | Rendered boot payload |
//! | `<root>/<instance-id>/instance.yaml` | Instance properties (YAML) |
//! | `<root>/<instance-id>/cloud_config.yaml` | Launch configuration (YAML) |
//!
//! # Modules
//!
//! - [`archive`]: Archive, artifact keys and archived documents
//! - [`error`]: Error types and error kinds
//! - [`factory`]: Backend selection from archive options
//! - [`keystore`]: Filesystem and object storage key stores
//! - [`launch_config`]: Launch configuration document and property schemas
//! - [`render`]: Boot payload rendering

#![deny(missing_docs)]

/// Per-instance archives.
pub mod archive;

/// Error types for archive operations.
pub mod error;

/// Archive construction from options.
pub mod factory;

/// Key/value storage backends.
pub mod keystore;

/// Launch configuration documents.
pub mod launch_config;

/// Boot payload rendering.
pub mod render;

pub use archive::{
    Archive, ArchiveContents, ArchiveKeys, Artifact, InstanceProperties, is_valid_instance_id,
};
pub use error::{Error, ErrorKind, Result};
pub use factory::{ArchiveFactory, ArchiveOptions, ArchiveSettings, ArchiveType, create_archive};
pub use keystore::KeyStore;
pub use launch_config::{LaunchConfig, PropertySpec};
pub use render::{BootPayloadRenderer, CloudConfigRenderer};
