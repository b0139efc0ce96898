//! # FeedService
//!
//! Unranked, reverse-chronological post lists: the posts of everyone a user
//! follows, and a single user's own posts.

use std::sync::Arc;

use domains::{DomainError, Post, PostRepository, Result, UserDirectory, UserId};
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostRepository>,
    users: Arc<dyn UserDirectory>,
}

impl FeedService {
    pub fn new(posts: Arc<dyn PostRepository>, users: Arc<dyn UserDirectory>) -> Self {
        Self { posts, users }
    }

    #[instrument(skip(self))]
    pub async fn user_feed(&self, user_id: UserId) -> Result<Vec<Post>> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", user_id))?;

        if user.following.is_empty() {
            return Ok(Vec::new());
        }

        // The repository returns newest first.
        let posts = self.posts.list_by_authors(&user.following).await?;
        debug!(count = posts.len(), "feed assembled");
        Ok(posts)
    }

    #[instrument(skip(self))]
    pub async fn authored_posts(&self, username: &str) -> Result<Vec<Post>> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| DomainError::not_found("User", username))?;

        self.posts.list_by_authors(&[user.id]).await
    }
}
