//! # Media lifecycle
//!
//! Uploads post images to the object store and cleans them up again when a
//! post is deleted. Uploads are mandatory (a failure aborts post creation);
//! deletes are best-effort.

use std::sync::Arc;
use std::time::Duration;

use domains::{DomainError, MediaStorage, Result};
use mime::Mime;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::utils::parse_data_uri;

#[derive(Clone)]
pub struct MediaLifecycle {
    storage: Arc<dyn MediaStorage>,
    delete_timeout: Duration,
}

impl MediaLifecycle {
    pub fn new(storage: Arc<dyn MediaStorage>, delete_timeout: Duration) -> Self {
        Self {
            storage,
            delete_timeout,
        }
    }

    /// Uploads an inline image and returns the URL it is served from.
    #[instrument(skip_all)]
    pub async fn store(&self, raw_source: &str) -> Result<String> {
        let uri = parse_data_uri(raw_source)?;

        // Trust the bytes, not the declared media type.
        let format = image::guess_format(&uri.data)
            .map_err(|_| DomainError::validation("img is not a supported image"))?;
        let content_type = format
            .to_mime_type()
            .parse::<Mime>()
            .unwrap_or(uri.mime);

        let url = self
            .storage
            .upload(uri.data, &content_type)
            .await
            .map_err(|e| match e {
                DomainError::ExternalService(_) => e,
                other => DomainError::external(other.to_string()),
            })?;
        info!(%url, %content_type, "media stored");
        Ok(url)
    }

    /// Removes the object behind `stored_url`. Failures and timeouts are
    /// logged; an orphaned object is preferable to an undeletable post.
    #[instrument(skip(self))]
    pub async fn delete(&self, stored_url: &str) {
        let Some(object_id) = object_id_from_url(stored_url) else {
            warn!("cannot derive object id from media url, skipping delete");
            return;
        };

        match timeout(self.delete_timeout, self.storage.destroy(object_id)).await {
            Ok(Ok(())) => info!(object_id, "media deleted"),
            Ok(Err(e)) => warn!(object_id, error = %e, "media delete failed"),
            Err(_) => warn!(object_id, timeout_ms = self.delete_timeout.as_millis() as u64, "media delete timed out"),
        }
    }
}

/// The object id is the last path segment of the URL, up to its first dot.
pub fn object_id_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next()?;
    let id = last.split('.').next()?;
    (!id.is_empty()).then_some(id)
}
