//! # Local media storage
//!
//! Filesystem implementation of `MediaStorage`. Objects are written under a
//! sharded directory tree (`ab/cd/<id>.<ext>`) and served by the binary from
//! `url_prefix`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use domains::{DomainError, MediaStorage, Result};
use mime::Mime;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g., "./data/uploads")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/static/uploads")
    url_prefix: String,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf, url_prefix: String) -> Self {
        Self {
            root_path: root,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Generates a sharded directory: "ab/cd"
    fn shard_dir(&self, object_id: &str) -> PathBuf {
        let mut path = self.root_path.clone();
        path.push(&object_id[0..2]);
        path.push(&object_id[2..4]);
        path
    }

    async fn write_object(&self, object_id: &str, ext: &str, data: &[u8]) -> anyhow::Result<()> {
        let dir = self.shard_dir(object_id);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
        let target = dir.join(format!("{object_id}.{ext}"));
        fs::write(&target, data)
            .await
            .with_context(|| format!("writing {}", target.display()))?;
        Ok(())
    }

    async fn remove_object(&self, object_id: &str) -> anyhow::Result<usize> {
        let dir = self.shard_dir(object_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e).with_context(|| format!("listing {}", dir.display())),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.file_stem().and_then(|s| s.to_str()) == Some(object_id) {
                fs::remove_file(&path)
                    .await
                    .with_context(|| format!("removing {}", path.display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Object ids we hand out are simple-format UUIDs; anything else would let a
/// crafted URL escape the shard tree.
fn is_valid_object_id(id: &str) -> bool {
    id.len() == 32 && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Preferred file extension for an upload's media type.
pub(crate) fn extension_for(content_type: &Mime) -> &'static str {
    match content_type.essence_str() {
        "image/jpeg" => "jpg",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("bin"),
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStore {
    async fn upload(&self, data: Bytes, content_type: &Mime) -> Result<String> {
        let object_id = Uuid::new_v4().simple().to_string();
        let ext = extension_for(content_type);

        self.write_object(&object_id, ext, &data)
            .await
            .map_err(|e| DomainError::external(format!("{e:#}")))?;

        Ok(format!(
            "{}/{}/{}/{}.{}",
            self.url_prefix,
            &object_id[0..2],
            &object_id[2..4],
            object_id,
            ext
        ))
    }

    async fn destroy(&self, object_id: &str) -> Result<()> {
        if !is_valid_object_id(object_id) {
            return Err(DomainError::validation(format!("invalid object id {object_id}")));
        }
        let removed = self
            .remove_object(object_id)
            .await
            .map_err(|e| DomainError::external(format!("{e:#}")))?;
        debug!(object_id, removed, "local media removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> LocalMediaStore {
        LocalMediaStore::new(dir.path().to_path_buf(), "/static/uploads/".into())
    }

    #[tokio::test]
    async fn upload_then_destroy_round_trips_through_the_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let url = store
            .upload(Bytes::from_static(b"GIF89a"), &mime::IMAGE_GIF)
            .await
            .unwrap();
        assert!(url.starts_with("/static/uploads/"));
        assert!(url.ends_with(".gif"));

        let file_name = url.rsplit('/').next().unwrap();
        let object_id = file_name.split('.').next().unwrap();
        let on_disk = store.shard_dir(object_id).join(file_name);
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"GIF89a");

        store.destroy(object_id).await.unwrap();
        assert!(!on_disk.exists());
        // Second delete is a quiet no-op.
        store.destroy(object_id).await.unwrap();
    }

    #[tokio::test]
    async fn destroy_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(&dir).destroy("../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn extensions_follow_media_type() {
        assert_eq!(extension_for(&mime::IMAGE_JPEG), "jpg");
        assert_eq!(extension_for(&mime::IMAGE_PNG), "png");
        assert_eq!(extension_for(&"application/x-unknown-thing".parse().unwrap()), "bin");
    }
}
