// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory bucket client.
//!
//! Simulates object storage without network access. Used by tests and for
//! local development against the object storage code path.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::object::BucketClient;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct MemoryState {
    buckets: HashMap<String, HashMap<String, Vec<u8>>>,
    object_requests: usize,
    fail_put_at: Option<usize>,
    puts: usize,
}

/// In-memory [`BucketClient`].
///
/// Cloning shares the underlying buckets.
#[derive(Debug, Clone, Default)]
pub struct MemoryBucketClient {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBucketClient {
    /// Create a client with no buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client with one empty bucket.
    pub fn with_bucket(bucket: &str) -> Self {
        let mut state = MemoryState::default();
        state.buckets.insert(bucket.to_string(), HashMap::new());
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Add an empty bucket.
    pub async fn create_bucket(&self, bucket: &str) {
        let mut state = self.state.lock().await;
        state.buckets.entry(bucket.to_string()).or_default();
    }

    /// Make the `n`-th `put_object` call (1-based) fail with a backend error.
    pub async fn fail_put_at(&self, n: usize) {
        self.state.lock().await.fail_put_at = Some(n);
    }

    /// Get an object directly, bypassing request accounting.
    pub async fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().await;
        state.buckets.get(bucket)?.get(key).cloned()
    }

    /// Object names stored in `bucket`, sorted.
    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        let state = self.state.lock().await;
        let mut keys: Vec<String> = state
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Number of put/get requests served so far.
    pub async fn object_requests(&self) -> usize {
        self.state.lock().await.object_requests
    }
}

#[async_trait]
impl BucketClient for MemoryBucketClient {
    fn client_type(&self) -> &'static str {
        "memory"
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.state.lock().await.buckets.contains_key(bucket))
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.object_requests += 1;
        state.puts += 1;

        if state.fail_put_at == Some(state.puts) {
            return Err(Error::backend(
                format!("{bucket}/{key}"),
                "simulated put failure",
            ));
        }

        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::backend(bucket, "NoSuchBucket"))?;
        objects.insert(key.to_string(), body);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let mut state = self.state.lock().await;
        state.object_requests += 1;

        let objects = state
            .buckets
            .get(bucket)
            .ok_or_else(|| Error::backend(bucket, "NoSuchBucket"))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{bucket}/{key}")))
    }
}
