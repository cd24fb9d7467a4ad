// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cloudmaker Environment - Instance Lifecycle Management
//!
//! This crate launches instances through a provider, archives what each
//! launch was made of, and reads that archive back later.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          cloudmaker CLI                                  │
//! │               launch <config.yaml> │ info <id> │ terminate <id>          │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         LifecycleManager                                 │
//! │   validate ─► render user data ─► create instance ─► archive launch      │
//! └─────────────────────────────────────────────────────────────────────────┘
//!           │                                            │
//!           │ Provider                                   │ ArchiveFactory
//!           ▼                                            ▼
//! ┌───────────────────────────┐          ┌──────────────────────────────────┐
//! │  LxcProvider │ MockProvider│          │  cloudmaker-archive              │
//! │  (scopes: LXC paths,      │          │  <archive_bucket>/<id>/...       │
//! │   regions)                │          │  filesystem │ S3                 │
//! └───────────────────────────┘          └──────────────────────────────────┘
//! ```
//!
//! The archive location of an instance is read from its `archive_bucket` tag,
//! so `info` needs nothing but the instance ID.
//!
//! # Operations
//!
//! | Operation | Description |
//! |-----------|-------------|
//! | `launch` | Create an instance and archive its launch; archive failures are warnings |
//! | `info` | Find the instance in any scope and load its archive |
//! | `terminate` | Terminate the instance; the archive is kept |
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `CLOUDMAKER_ARCHIVE_TYPE` | No | `ec2` | Archive backend (`ec2` or `local`) |
//! | `AWS_ACCESS_KEY_ID` | For `ec2` | - | S3 access key |
//! | `AWS_SECRET_ACCESS_KEY` | For `ec2` | - | S3 secret key |
//! | `AWS_REGION` | No | `us-east-1` | S3 region |
//! | `CLOUDMAKER_S3_ENDPOINT` | No | - | S3-compatible endpoint |
//! | `DATA_DIR` | No | `.cloud-maker` | LXC seeds and instance records |
//! | `CLOUDMAKER_LXC_PATHS` | No | - | Extra LXC paths, comma separated |
//! | `CLOUDMAKER_LXC_TOOLS_DIR` | No | `PATH` | Directory holding the `lxc-*` tools |
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types for Environment operations
//! - [`lifecycle`]: Launch, info and terminate
//! - [`provider`]: Instance providers (LXC, mock)

#![deny(missing_docs)]

/// Configuration loaded from environment variables.
pub mod config;

/// Error types for Environment operations.
pub mod error;

/// Instance lifecycle manager.
pub mod lifecycle;

/// Instance providers (LXC, mock).
pub mod provider;

pub use config::Config;
pub use error::Error;
pub use lifecycle::{Launched, LifecycleManager};
