//! # PostService
//!
//! Owns the post lifecycle: create, fetch and delete. Deleting a post
//! cascades to its stored media.

use std::sync::Arc;

use domains::{
    DomainError, NewPost, Post, PostId, PostRepository, Result, UserDirectory, UserId,
    MAX_POST_TEXT_CHARS,
};
use tracing::{info, instrument};

use crate::media::MediaLifecycle;

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    users: Arc<dyn UserDirectory>,
    media: MediaLifecycle,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        users: Arc<dyn UserDirectory>,
        media: MediaLifecycle,
    ) -> Self {
        Self { posts, users, media }
    }

    /// Creates a post for `actor`. Every check runs before the image upload,
    /// so a rejected request leaves nothing behind.
    #[instrument(skip(self, input), fields(posted_by = %input.posted_by))]
    pub async fn create(&self, actor: UserId, input: NewPost) -> Result<Post> {
        if input.text.trim().is_empty() {
            return Err(DomainError::validation("postedBy and text fields are required"));
        }

        let owner = self
            .users
            .find_by_id(input.posted_by)
            .await?
            .ok_or_else(|| DomainError::not_found("User", input.posted_by))?;

        if owner.id != actor {
            return Err(DomainError::unauthorized("cannot create a post for another user"));
        }

        if input.text.chars().count() > MAX_POST_TEXT_CHARS {
            return Err(DomainError::validation(format!(
                "text must be less than {MAX_POST_TEXT_CHARS} characters"
            )));
        }

        let img = match input.img.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => Some(self.media.store(raw).await?),
            None => None,
        };

        let post = Post::new(owner.id, input.text, img);
        self.posts.insert(&post).await?;
        info!(post_id = %post.id, "post created");
        Ok(post)
    }

    pub async fn get(&self, post_id: PostId) -> Result<Post> {
        self.posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Post", post_id))
    }

    /// Deletes a post owned by `actor`. Media goes first; its failure never
    /// blocks the document delete.
    #[instrument(skip(self))]
    pub async fn delete(&self, post_id: PostId, actor: UserId) -> Result<()> {
        let post = self.get(post_id).await?;
        if post.posted_by != actor {
            return Err(DomainError::unauthorized("you can delete only your own posts"));
        }

        if let Some(img) = post.img.as_deref() {
            self.media.delete(img).await;
        }

        if !self.posts.delete(post_id).await? {
            // Lost a race with another delete of the same post.
            return Err(DomainError::not_found("Post", post_id));
        }
        info!("post deleted");
        Ok(())
    }
}
