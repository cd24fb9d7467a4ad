// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for cloudmaker-environment.

use std::path::PathBuf;

use cloudmaker_archive::{ArchiveOptions, ArchiveType};

/// Default S3 region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default data directory.
pub const DEFAULT_DATA_DIR: &str = ".cloud-maker";

/// Environment configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Options passed to the archive factory
    pub archive: ArchiveOptions,
    /// Data directory for LXC seeds and instance records
    pub data_dir: PathBuf,
    /// Additional LXC paths searched after the default one
    pub lxc_paths: Vec<String>,
    /// Directory holding the `lxc-*` tools; resolved on `PATH` when unset
    pub lxc_tools_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a variable if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let archive_type = match var("CLOUDMAKER_ARCHIVE_TYPE") {
            Some(value) => value
                .parse::<ArchiveType>()
                .map_err(|_| ConfigError::InvalidArchiveType(value))?,
            None => ArchiveType::default(),
        };

        let archive = ArchiveOptions {
            archive_type: Some(archive_type.to_string()),
            aws_access_key_id: var("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
            region: Some(var("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string())),
            endpoint: var("CLOUDMAKER_S3_ENDPOINT"),
        };

        let data_dir = PathBuf::from(var("DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()));

        let lxc_paths = var("CLOUDMAKER_LXC_PATHS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            archive,
            data_dir,
            lxc_paths,
            lxc_tools_dir: var("CLOUDMAKER_LXC_TOOLS_DIR").map(PathBuf::from),
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `CLOUDMAKER_ARCHIVE_TYPE` is not a known archive type.
    #[error("Invalid CLOUDMAKER_ARCHIVE_TYPE: {0} (expected ec2 or local)")]
    InvalidArchiveType(String),
}
