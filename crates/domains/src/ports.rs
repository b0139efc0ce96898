//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be wired into the binary.
//! Mutating methods on `PostRepository` are atomic per post: an adapter
//! must never implement them as a blind read-then-overwrite of the whole
//! document.

use crate::error::Result;
use crate::models::{
    EmailMessage, LikeState, Post, PostId, Reply, ReplyEdit, ReplyId, UserId, UserProfile,
};
use async_trait::async_trait;
use bytes::Bytes;
use mime::Mime;

/// Persistence contract for posts and their nested replies.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn insert(&self, post: &Post) -> Result<()>;
    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>>;
    /// Returns `false` if the post did not exist.
    async fn delete(&self, id: PostId) -> Result<bool>;

    /// Flips `user_id` in the post's like set in one storage operation.
    /// `None` means the post does not exist.
    async fn toggle_like(&self, id: PostId, user_id: UserId) -> Result<Option<LikeState>>;

    /// Appends to the end of the reply list. `false` if the post is gone.
    async fn push_reply(&self, id: PostId, reply: &Reply) -> Result<bool>;
    async fn edit_reply(&self, id: PostId, reply_id: ReplyId, text: &str) -> Result<ReplyEdit>;
    /// Removes the reply if present. `false` only if the post is gone.
    async fn remove_reply(&self, id: PostId, reply_id: ReplyId) -> Result<bool>;

    /// All posts authored by any of `authors`, newest first.
    async fn list_by_authors(&self, authors: &[UserId]) -> Result<Vec<Post>>;
}

/// Lookup contract for the external identity service.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserProfile>>;
    async fn find_by_username(&self, username: &str) -> Result<Option<UserProfile>>;
}

/// Remote object store for post media.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Saves raw bytes and returns the public URL of the stored object.
    async fn upload(&self, data: Bytes, content_type: &Mime) -> Result<String>;
    /// Deletes the object identified by `object_id` (the URL's file stem).
    async fn destroy(&self, object_id: &str) -> Result<()>;
}

/// Transactional email transport.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<()>;
}

/// Resolves a request credential to the acting user.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<UserId>;
}
