//! # Middleware
//!
//! Cross-cutting layers applied to every route: request ids, tracing, CORS
//! and the body size cap.

use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub use axum::http::header::InvalidHeaderValue;

const ALLOWED_METHODS: [Method; 4] = [Method::GET, Method::POST, Method::PUT, Method::DELETE];

/// With a configured origin, cookies are allowed cross-site; otherwise any
/// origin may call the API but without credentials.
pub fn cors_policy(origin: Option<&str>) -> Result<CorsLayer, InvalidHeaderValue> {
    let layer = match origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods(ALLOWED_METHODS)
            .allow_headers([CONTENT_TYPE, AUTHORIZATION])
            .allow_credentials(true),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(ALLOWED_METHODS)
            .allow_headers(Any),
    };
    Ok(layer)
}

pub fn standard_middleware(router: Router, cors: CorsLayer, body_limit: usize) -> Router {
    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
