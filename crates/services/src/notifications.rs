//! # Notification dispatch
//!
//! Like and comment emails are fire-and-forget. `NotificationDispatcher`
//! only enqueues a job naming the post and the actor; a single background
//! `NotificationWorker` resolves the post owner, the actor's username and
//! the preview, then sends through the `Mailer` port. Request handlers never
//! wait on the user directory or the mail transport for a notification.

use std::sync::Arc;

use domains::{
    EmailMessage, Mailer, NotificationAction, PostId, PostRepository, Result, UserDirectory,
    UserId,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::utils::truncate_text;

/// Maximum length of the post preview quoted in a notification.
pub const PREVIEW_CHARS: usize = 15;

/// What a request hands to the queue: ids only, resolved later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationJob {
    pub post_id: PostId,
    pub actor_id: UserId,
    /// Set when the caller already holds the actor's profile.
    pub actor_username: Option<String>,
    pub action: NotificationAction,
}

/// A fully resolved notification, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient_email: String,
    pub actor_username: String,
    pub context_text: String,
    pub action: NotificationAction,
}

impl Notification {
    pub fn to_email(&self) -> EmailMessage {
        let verb = self.action.as_str().to_lowercase();
        EmailMessage {
            to: self.recipient_email.clone(),
            subject: format!("{} {} your post", self.actor_username, verb),
            body: format!(
                "Hi,\n\n{} {} your post \"{}\".\n\nOpen the app to see it.",
                self.actor_username, verb, self.context_text
            ),
        }
    }
}

/// Cheap, cloneable handle onto the notification queue.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<NotificationJob>,
}

impl NotificationDispatcher {
    /// Starts the worker on the current Tokio runtime.
    ///
    /// The worker exits once every dispatcher clone has been dropped and the
    /// queue is drained, so awaiting the handle flushes pending mail.
    pub fn spawn(
        mailer: Arc<dyn Mailer>,
        posts: Arc<dyn PostRepository>,
        users: Arc<dyn UserDirectory>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = NotificationWorker {
            rx,
            mailer,
            posts,
            users,
        };
        (Self { tx }, tokio::spawn(worker.run()))
    }

    /// Queues one job. Never blocks and never fails.
    pub fn notify(&self, job: NotificationJob) {
        let action = job.action;
        if self.tx.send(job).is_err() {
            warn!(%action, "notification worker is gone, dropping email");
        }
    }

    /// Queues an email to the owner of `post_id` about `actor_id`'s action.
    pub fn notify_post_owner(
        &self,
        post_id: PostId,
        actor_id: UserId,
        actor_username: Option<&str>,
        action: NotificationAction,
    ) {
        self.notify(NotificationJob {
            post_id,
            actor_id,
            actor_username: actor_username.map(str::to_string),
            action,
        });
    }
}

pub struct NotificationWorker {
    rx: mpsc::UnboundedReceiver<NotificationJob>,
    mailer: Arc<dyn Mailer>,
    posts: Arc<dyn PostRepository>,
    users: Arc<dyn UserDirectory>,
}

impl NotificationWorker {
    pub async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            let notification = match self.resolve(&job).await {
                Ok(Some(notification)) => notification,
                Ok(None) => continue,
                Err(e) => {
                    warn!(post_id = %job.post_id, error = %e, "notification lookup failed, skipping");
                    continue;
                }
            };
            match self.mailer.send(notification.to_email()).await {
                Ok(()) => debug!(action = %job.action, "notification sent"),
                Err(e) => warn!(action = %job.action, error = %e, "notification email failed"),
            }
        }
        debug!("notification queue closed");
    }

    /// `None` when the post, its owner or the actor has disappeared.
    async fn resolve(&self, job: &NotificationJob) -> Result<Option<Notification>> {
        let Some(post) = self.posts.find_by_id(job.post_id).await? else {
            debug!(post_id = %job.post_id, "post gone before notification, skipping");
            return Ok(None);
        };
        let Some(owner) = self.users.find_by_id(post.posted_by).await? else {
            warn!(post_id = %post.id, owner = %post.posted_by, "post owner not found, skipping notification");
            return Ok(None);
        };
        let actor_username = match &job.actor_username {
            Some(name) => name.clone(),
            None => match self.users.find_by_id(job.actor_id).await? {
                Some(actor) => actor.username,
                None => {
                    warn!(actor = %job.actor_id, "actor has no profile, skipping notification");
                    return Ok(None);
                }
            },
        };

        // Preview is built from a copy; the stored text is left alone.
        Ok(Some(Notification {
            recipient_email: owner.email,
            actor_username,
            context_text: truncate_text(&post.text, PREVIEW_CHARS),
            action: job.action,
        }))
    }
}
