// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for cloudmaker-environment.

use thiserror::Error;

use crate::provider::ProviderError;

/// Environment errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// The launch configuration is incomplete or could not be rendered.
    #[error("Invalid launch configuration: {0}")]
    InvalidLaunchConfig(#[source] cloudmaker_archive::Error),

    /// Provider (instance creation, lookup or termination) failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Archive construction, store or load failed.
    #[error("Archive error: {0}")]
    Archive(#[from] cloudmaker_archive::Error),

    /// Instance was not found in any scope.
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    /// Instance carries no archive location tag.
    #[error("Instance {instance_id} has no {tag} tag")]
    MissingArchiveTag {
        /// Instance that was looked up.
        instance_id: String,
        /// Name of the missing tag.
        tag: &'static str,
    },
}

impl Error {
    /// True when the instance, its archive tag, or an archived artifact does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::InstanceNotFound(_) | Error::MissingArchiveTag { .. } => true,
            Error::Provider(ProviderError::InstanceNotFound(_)) => true,
            Error::Archive(e) => e.is_not_found(),
            _ => false,
        }
    }
}

/// Result type using Environment Error.
pub type Result<T> = std::result::Result<T, Error>;
