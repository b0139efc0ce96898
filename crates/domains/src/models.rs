//! # Domain Models
//!
//! These structs represent the core entities of the post engine.
//! We use UUID v7 for time-ordered, globally unique identification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type PostId = Uuid;
pub type ReplyId = Uuid;

/// Upper bound on post text, counted in characters.
pub const MAX_POST_TEXT_CHARS: usize = 500;

/// A user-authored content unit with text, optional media, likes and replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    /// Owning user; never changes after creation.
    pub posted_by: UserId,
    pub text: String,
    /// URL of the stored media object, if any.
    pub img: Option<String>,
    /// Users who liked the post. Set semantics, kept in like order.
    pub likes: Vec<UserId>,
    /// Display order is insertion order.
    pub replies: Vec<Reply>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(posted_by: UserId, text: String, img: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            posted_by,
            text,
            img,
            likes: Vec::new(),
            replies: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_liked_by(&self, user_id: UserId) -> bool {
        self.likes.contains(&user_id)
    }

    pub fn reply(&self, reply_id: ReplyId) -> Option<&Reply> {
        self.replies.iter().find(|r| r.id == reply_id)
    }

    /// Flips `user_id`'s membership in `likes` and reports the new state.
    pub fn toggle_like(&mut self, user_id: UserId) -> LikeState {
        if let Some(pos) = self.likes.iter().position(|id| *id == user_id) {
            self.likes.remove(pos);
            LikeState::Unliked
        } else {
            self.likes.push(user_id);
            LikeState::Liked
        }
    }

    /// Replaces the text of a reply and marks it edited.
    /// Returns `false` when no reply has the given id.
    pub fn edit_reply(&mut self, reply_id: ReplyId, text: &str) -> bool {
        match self.replies.iter_mut().find(|r| r.id == reply_id) {
            Some(reply) => {
                reply.text = text.to_string();
                reply.is_edited = true;
                true
            }
            None => false,
        }
    }

    /// Drops the reply with the given id, keeping the order of the rest.
    pub fn remove_reply(&mut self, reply_id: ReplyId) {
        self.replies.retain(|r| r.id != reply_id);
    }
}

/// Orders posts by `created_at` descending. Ties fall back to the id,
/// which is time-ordered for v7 ids.
pub fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// A nested comment, owned by exactly one Post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: ReplyId,
    pub user_id: UserId,
    /// Snapshot of the author's name at authoring time
    pub username: String,
    /// Snapshot of the author's avatar at authoring time
    pub user_profile_pic: Option<String>,
    pub text: String,
    /// Flips to true on the first edit and stays there.
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
}

impl Reply {
    pub fn new(author: &UserProfile, text: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: author.id,
            username: author.username.clone(),
            user_profile_pic: author.profile_pic.clone(),
            text,
            is_edited: false,
            created_at: Utc::now(),
        }
    }
}

/// Read-only view of a user, as served by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub profile_pic: Option<String>,
    /// Users whose posts make up this user's feed
    pub following: Vec<UserId>,
}

/// Input for creating a post.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub posted_by: UserId,
    pub text: String,
    /// Raw image source (a `data:` URI) to be uploaded before persisting
    #[serde(default)]
    pub img: Option<String>,
}

/// Outcome of a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeState {
    Liked,
    Unliked,
}

/// The event a notification email reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationAction {
    Liked,
    Commented,
}

impl NotificationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationAction::Liked => "Liked",
            NotificationAction::Commented => "Commented",
        }
    }
}

impl std::fmt::Display for NotificationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully formatted plain-text email, ready for a `Mailer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Result of a storage-level reply edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyEdit {
    Edited,
    PostMissing,
    ReplyMissing,
}
