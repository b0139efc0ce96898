//! # services
//!
//! Application services of the post engine. Each service holds its ports as
//! `Arc<dyn Trait>` and is cheap to clone into request handlers.

pub mod feed;
pub mod likes;
pub mod media;
pub mod notifications;
pub mod posts;
pub mod replies;
pub mod utils;

#[cfg(test)]
mod testing;

pub use feed::FeedService;
pub use likes::LikeService;
pub use media::MediaLifecycle;
pub use notifications::{NotificationDispatcher, NotificationJob};
pub use posts::PostService;
pub use replies::ReplyService;
