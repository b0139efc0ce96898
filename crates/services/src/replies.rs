//! # ReplyService
//!
//! Appends, edits and removes nested replies. Each mutation is a single
//! atomic storage call on the parent post.

use std::sync::Arc;

use domains::{
    DomainError, NotificationAction, PostId, PostRepository, Reply, ReplyEdit, ReplyId, Result,
    UserDirectory, UserId,
};
use tracing::{info, instrument};

use crate::notifications::NotificationDispatcher;

#[derive(Clone)]
pub struct ReplyService {
    posts: Arc<dyn PostRepository>,
    users: Arc<dyn UserDirectory>,
    notifier: NotificationDispatcher,
}

impl ReplyService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        users: Arc<dyn UserDirectory>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            posts,
            users,
            notifier,
        }
    }

    #[instrument(skip(self, text))]
    pub async fn add_reply(&self, post_id: PostId, actor: UserId, text: String) -> Result<Reply> {
        if text.trim().is_empty() {
            return Err(DomainError::validation("text field is required"));
        }

        // Author snapshot is stored with the reply.
        let author = self
            .users
            .find_by_id(actor)
            .await?
            .ok_or_else(|| DomainError::not_found("User", actor))?;

        let reply = Reply::new(&author, text);
        if !self.posts.push_reply(post_id, &reply).await? {
            return Err(DomainError::not_found("Post", post_id));
        }
        info!(reply_id = %reply.id, "reply added");

        self.notifier.notify_post_owner(
            post_id,
            actor,
            Some(&author.username),
            NotificationAction::Commented,
        );

        Ok(reply)
    }

    #[instrument(skip(self, new_text))]
    pub async fn edit_reply(&self, post_id: PostId, reply_id: ReplyId, new_text: &str) -> Result<()> {
        if new_text.trim().is_empty() {
            return Err(DomainError::validation("updateReply text is required"));
        }

        match self.posts.edit_reply(post_id, reply_id, new_text).await? {
            ReplyEdit::Edited => {
                info!("reply edited");
                Ok(())
            }
            ReplyEdit::PostMissing => Err(DomainError::not_found("Post", post_id)),
            ReplyEdit::ReplyMissing => Err(DomainError::not_found("Reply", reply_id)),
        }
    }

    /// Removing an unknown reply id is a successful no-op.
    #[instrument(skip(self))]
    pub async fn delete_reply(&self, post_id: PostId, reply_id: ReplyId) -> Result<()> {
        if !self.posts.remove_reply(post_id, reply_id).await? {
            return Err(DomainError::not_found("Post", post_id));
        }
        info!("reply removed");
        Ok(())
    }
}
