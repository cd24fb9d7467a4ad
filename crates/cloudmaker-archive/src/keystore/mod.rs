// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Key stores - byte storage backends for archives.
//!
//! A key store writes and reads opaque bytes under string keys. Keys are
//! relative to the store's root path, which is fixed at construction.

pub mod filesystem;
pub mod memory;
pub mod object;
pub mod s3;

pub use filesystem::FilesystemKeyStore;
pub use memory::MemoryBucketClient;
pub use object::{BucketClient, ObjectStorageKeyStore};
pub use s3::{S3BucketClient, S3Credentials};

use async_trait::async_trait;

use crate::error::Result;

/// Byte storage addressed by string keys.
///
/// Implementations must overwrite existing content on `write` and fail with a
/// not-found error from `read` when the key was never written.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Backend type identifier (e.g., "filesystem", "object_storage")
    fn backend_type(&self) -> &'static str;

    /// Normalized root path every key is stored under.
    fn root(&self) -> &str;

    /// Create or overwrite the value at `key`.
    async fn write(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Read the value at `key`.
    async fn read(&self, key: &str) -> Result<Vec<u8>>;
}

/// Strip empty path segments so equivalent paths map to the same key.
///
/// `"bucket//sub/"`, `"/bucket/sub"` and `"bucket/sub"` all become `"bucket/sub"`.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Join path fragments with `/`, normalizing the result.
pub fn join_key(parts: &[&str]) -> String {
    normalize_path(&parts.join("/"))
}

/// Split a normalized root path into bucket and optional sub-prefix.
pub fn split_bucket(path: &str) -> (String, String) {
    let normalized = normalize_path(path);
    match normalized.split_once('/') {
        Some((bucket, prefix)) => (bucket.to_string(), prefix.to_string()),
        None => (normalized, String::new()),
    }
}
