//! # S3 media storage
//!
//! `MediaStorage` over any S3-compatible object store. Keys are
//! `<key_prefix>/<object_id>` and public URLs are
//! `<public_base_url>/<key_prefix>/<object_id>`, so the URL's last segment is
//! the object id.

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use domains::{DomainError, MediaStorage, Result};
use mime::Mime;
use tracing::debug;
use uuid::Uuid;

/// Connection details for an S3-compatible bucket.
#[derive(Debug, Clone)]
pub struct S3Options {
    pub bucket: String,
    pub region: Option<String>,
    /// Custom endpoint for MinIO / R2 style providers; enables path-style addressing.
    pub endpoint: Option<String>,
    pub key_prefix: String,
    pub public_base_url: String,
}

pub struct S3MediaStore {
    client: Client,
    bucket: String,
    key_prefix: String,
    public_base_url: String,
}

impl S3MediaStore {
    /// Builds a client from the standard AWS credential chain.
    pub async fn connect(opts: S3Options) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = opts.region.clone() {
            loader = loader.region(Region::new(region));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = opts.endpoint.as_deref() {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: opts.bucket,
            key_prefix: opts.key_prefix.trim_matches('/').to_string(),
            public_base_url: opts.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn key_for(&self, object_id: &str) -> String {
        object_key(&self.key_prefix, object_id)
    }
}

/// `prefix/id`, or the bare id when there is no prefix.
fn object_key(prefix: &str, object_id: &str) -> String {
    if prefix.is_empty() {
        object_id.to_string()
    } else {
        format!("{prefix}/{object_id}")
    }
}

#[async_trait]
impl MediaStorage for S3MediaStore {
    async fn upload(&self, data: Bytes, content_type: &Mime) -> Result<String> {
        let object_id = Uuid::new_v4().simple().to_string();
        let key = self.key_for(&object_id);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type.as_ref())
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| DomainError::external(format!("s3 put {key}: {}", DisplayErrorContext(&e))))?;

        debug!(%key, "s3 object stored");
        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn destroy(&self, object_id: &str) -> Result<()> {
        let key = self.key_for(object_id);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| DomainError::external(format!("s3 delete {key}: {}", DisplayErrorContext(&e))))?;
        debug!(%key, "s3 object deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_never_start_with_a_slash() {
        assert_eq!(object_key("posts", "abc"), "posts/abc");
        assert_eq!(object_key("", "abc"), "abc");
        assert_eq!(format!("{}/{}", "https://cdn.test", object_key("", "abc")), "https://cdn.test/abc");
    }
}
