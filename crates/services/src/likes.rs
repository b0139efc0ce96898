//! # LikeService
//!
//! Toggles a user's like on a post. The flip is one atomic storage
//! operation and is the only storage call on the request path; a fresh like
//! queues a notification that the worker resolves on its own time.

use std::sync::Arc;

use domains::{DomainError, LikeState, NotificationAction, PostId, PostRepository, Result, UserId};
use tracing::{info, instrument};

use crate::notifications::NotificationDispatcher;

#[derive(Clone)]
pub struct LikeService {
    posts: Arc<dyn PostRepository>,
    notifier: NotificationDispatcher,
}

impl LikeService {
    pub fn new(posts: Arc<dyn PostRepository>, notifier: NotificationDispatcher) -> Self {
        Self { posts, notifier }
    }

    #[instrument(skip(self))]
    pub async fn toggle(&self, post_id: PostId, actor: UserId) -> Result<LikeState> {
        let state = self
            .posts
            .toggle_like(post_id, actor)
            .await?
            .ok_or_else(|| DomainError::not_found("Post", post_id))?;
        info!(?state, "like toggled");

        if state == LikeState::Liked {
            self.notifier
                .notify_post_owner(post_id, actor, None, NotificationAction::Liked);
        }
        Ok(state)
    }
}
