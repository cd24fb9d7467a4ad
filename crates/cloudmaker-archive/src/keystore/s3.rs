// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! AWS S3 bucket client.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use tracing::debug;

use super::object::BucketClient;
use crate::error::{Error, Result};

/// Default region when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Static S3 credentials.
#[derive(Clone)]
pub struct S3Credentials {
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// [`BucketClient`] backed by the AWS SDK.
#[derive(Debug, Clone)]
pub struct S3BucketClient {
    client: Client,
}

impl S3BucketClient {
    /// Build a client with static credentials.
    ///
    /// `endpoint` points the client at an S3-compatible service and switches
    /// to path-style addressing.
    pub fn new(credentials: &S3Credentials, region: Option<&str>, endpoint: Option<&str>) -> Self {
        let credentials = Credentials::new(
            &credentials.access_key_id,
            &credentials.secret_access_key,
            None,
            None,
            "cloudmaker",
        );

        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.unwrap_or(DEFAULT_REGION).to_string()))
            .credentials_provider(credentials);

        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl BucketClient for S3BucketClient {
    fn client_type(&self) -> &'static str {
        "s3"
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(e)) if e.err().is_not_found() => Ok(false),
            Err(e) => Err(Error::backend(bucket, DisplayErrorContext(&e))),
        }
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| Error::backend(format!("{bucket}/{key}"), DisplayErrorContext(&e)))?;

        debug!(bucket = %bucket, key = %key, "Put S3 object");
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(SdkError::ServiceError(e)) if e.err().is_no_such_key() => {
                return Err(Error::NotFound(format!("{bucket}/{key}")));
            }
            Err(e) => {
                return Err(Error::backend(
                    format!("{bucket}/{key}"),
                    DisplayErrorContext(&e),
                ));
            }
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| Error::backend(format!("{bucket}/{key}"), e))?;

        Ok(body.into_bytes().to_vec())
    }
}
