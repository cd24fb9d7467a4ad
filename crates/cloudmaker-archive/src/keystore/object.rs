// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Object storage key store.
//!
//! The root path is `bucket[/prefix]`. Keys are stored as objects named
//! `{prefix}/{key}` inside the bucket.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{KeyStore, join_key, split_bucket};
use crate::error::{Error, RequiredFields, Result};

/// Minimal object storage client used by [`ObjectStorageKeyStore`].
///
/// Implementations report a missing object as [`Error::NotFound`] and every
/// other failure as [`Error::Backend`].
#[async_trait]
pub trait BucketClient: Send + Sync {
    /// Client type identifier (e.g., "s3", "memory")
    fn client_type(&self) -> &'static str;

    /// Check whether `bucket` exists and is reachable.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Create or overwrite an object.
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;

    /// Fetch an object's contents.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
}

/// Key store backed by an object storage bucket.
pub struct ObjectStorageKeyStore {
    client: Arc<dyn BucketClient>,
    root: String,
    bucket: String,
    prefix: String,
}

impl std::fmt::Debug for ObjectStorageKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorageKeyStore")
            .field("client", &self.client.client_type())
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl ObjectStorageKeyStore {
    /// Connect to the bucket named by the first segment of `path`.
    ///
    /// Fails with [`Error::BucketNotFound`] when the bucket does not exist,
    /// before any object is read or written.
    pub async fn connect(client: Arc<dyn BucketClient>, path: &str) -> Result<Self> {
        let mut fields = RequiredFields::new("ObjectStorageKeyStore");
        let path = fields.require("path", Some(path));
        fields.finish()?;

        let (bucket, prefix) = split_bucket(path);
        if bucket.is_empty() {
            return Err(Error::MissingFields {
                context: "ObjectStorageKeyStore",
                fields: vec!["path"],
            });
        }

        if !client.bucket_exists(&bucket).await? {
            return Err(Error::BucketNotFound(bucket));
        }

        debug!(
            client = client.client_type(),
            bucket = %bucket,
            prefix = %prefix,
            "Connected to object storage"
        );

        Ok(Self {
            client,
            root: join_key(&[bucket.as_str(), prefix.as_str()]),
            bucket,
            prefix,
        })
    }

    /// Bucket holding the archive objects.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object name prefix inside the bucket (may be empty).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn object_key(&self, key: &str) -> String {
        join_key(&[self.prefix.as_str(), key])
    }
}

#[async_trait]
impl KeyStore for ObjectStorageKeyStore {
    fn backend_type(&self) -> &'static str {
        "object_storage"
    }

    fn root(&self) -> &str {
        &self.root
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        let object_key = self.object_key(key);
        self.client
            .put_object(&self.bucket, &object_key, value.to_vec())
            .await?;

        debug!(bucket = %self.bucket, key = %object_key, bytes = value.len(), "Wrote object");
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        self.client
            .get_object(&self.bucket, &self.object_key(key))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::keystore::MemoryBucketClient;

    #[tokio::test]
    async fn test_connect_missing_bucket_fails_fast() {
        let client = Arc::new(MemoryBucketClient::new());

        let err = ObjectStorageKeyStore::connect(client.clone(), "absent/prefix")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::BucketNotFound(ref b) if b == "absent"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(client.object_requests().await, 0);
    }

    #[tokio::test]
    async fn test_prefix_is_prepended() {
        let client = Arc::new(MemoryBucketClient::with_bucket("archives"));
        let store = ObjectStorageKeyStore::connect(client.clone(), "archives//demo/")
            .await
            .unwrap();

        assert_eq!(store.bucket(), "archives");
        assert_eq!(store.prefix(), "demo");
        assert_eq!(store.root(), "archives/demo");

        store.write("i-1/user_data", b"payload").await.unwrap();
        assert_eq!(
            client.object("archives", "demo/i-1/user_data").await,
            Some(b"payload".to_vec())
        );
    }

    #[tokio::test]
    async fn test_bucket_only_root() {
        let client = Arc::new(MemoryBucketClient::with_bucket("archives"));
        let store = ObjectStorageKeyStore::connect(client.clone(), "/archives/")
            .await
            .unwrap();

        store.write("i-1/user_data", b"x").await.unwrap();
        assert!(client.object("archives", "i-1/user_data").await.is_some());
        assert_eq!(store.read("i-1/user_data").await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_read_missing_object() {
        let client = Arc::new(MemoryBucketClient::with_bucket("archives"));
        let store = ObjectStorageKeyStore::connect(client, "archives")
            .await
            .unwrap();

        assert!(store.read("nope").await.unwrap_err().is_not_found());
    }
}
