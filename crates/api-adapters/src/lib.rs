//! # api-adapters
//!
//! The HTTP surface of the post engine (feature `web-axum`). The binary
//! builds an [`AppState`] from whatever adapters it selected and mounts
//! [`router`] under the configured prefix.

pub mod metrics;

#[cfg(feature = "web-axum")]
pub mod auth;
#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod middleware;

pub use metrics::Metrics;

#[cfg(feature = "web-axum")]
pub use web::*;

#[cfg(feature = "web-axum")]
mod web {
    use std::sync::Arc;

    use axum::routing::{get, post, put};
    use axum::Router;
    use domains::{PostRepository, PrincipalResolver, UserDirectory};
    use services::{
        FeedService, LikeService, MediaLifecycle, NotificationDispatcher, PostService,
        ReplyService,
    };

    use crate::handlers;
    use crate::middleware::{cors_policy, standard_middleware, InvalidHeaderValue};
    use crate::Metrics;

    /// State shared by every handler. Cloning is cheap.
    #[derive(Clone)]
    pub struct AppState {
        pub posts: PostService,
        pub likes: LikeService,
        pub replies: ReplyService,
        pub feed: FeedService,
        pub principals: Arc<dyn PrincipalResolver>,
        pub metrics: Arc<Metrics>,
    }

    impl AppState {
        pub fn new(
            posts: Arc<dyn PostRepository>,
            users: Arc<dyn UserDirectory>,
            media: MediaLifecycle,
            notifier: NotificationDispatcher,
            principals: Arc<dyn PrincipalResolver>,
        ) -> Self {
            Self {
                posts: PostService::new(posts.clone(), users.clone(), media),
                likes: LikeService::new(posts.clone(), notifier.clone()),
                replies: ReplyService::new(posts.clone(), users.clone(), notifier),
                feed: FeedService::new(posts, users),
                principals,
                metrics: Arc::new(Metrics::new()),
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct RouterOptions {
        /// Mount point of the post routes, e.g. "/api". Empty or "/" mounts at the root.
        pub api_prefix: String,
        pub cors_origin: Option<String>,
        pub body_limit_bytes: usize,
    }

    impl Default for RouterOptions {
        fn default() -> Self {
            Self {
                api_prefix: "/api".into(),
                cors_origin: None,
                body_limit_bytes: 50 * 1024 * 1024,
            }
        }
    }

    /// Post routes relative to the API prefix.
    pub fn post_routes() -> Router<AppState> {
        Router::new()
            .route("/posts", post(handlers::create_post))
            .route(
                "/posts/{id}",
                get(handlers::get_post).delete(handlers::delete_post),
            )
            .route("/posts/{id}/like", post(handlers::toggle_like))
            .route("/posts/{id}/replies", post(handlers::add_reply))
            .route(
                "/posts/{post_id}/replies/{reply_id}",
                put(handlers::edit_reply).delete(handlers::delete_reply),
            )
            .route("/feed", get(handlers::feed))
            .route("/users/{username}/posts", get(handlers::user_posts))
    }

    /// The complete application: post routes under the prefix, health and metrics at the root.
    pub fn router(state: AppState, opts: &RouterOptions) -> Result<Router, InvalidHeaderValue> {
        let prefix = opts.api_prefix.trim_end_matches('/');
        let root = Router::new()
            .route("/health", get(handlers::health))
            .route("/metrics", get(handlers::metrics));

        let app = if prefix.is_empty() {
            root.merge(post_routes())
        } else {
            root.nest(prefix, post_routes())
        };

        let cors = cors_policy(opts.cors_origin.as_deref())?;
        Ok(standard_middleware(app.with_state(state), cors, opts.body_limit_bytes))
    }
}
