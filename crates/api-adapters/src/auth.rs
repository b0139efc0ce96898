//! Principal extraction. A request is authenticated by a bearer token in
//! `Authorization` or, for browser clients, a `jwt` cookie.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use domains::UserId;

use crate::error::ApiError;
use crate::AppState;

pub const SESSION_COOKIE: &str = "jwt";

/// The authenticated user behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingUser(pub UserId);

impl FromRequestParts<AppState> for ActingUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts)
            .ok_or_else(|| ApiError::unauthorized("authentication required"))?;
        let user = state
            .principals
            .resolve(&token)
            .await
            .map_err(|_| ApiError::unauthorized("invalid token"))?;
        Ok(ActingUser(user))
    }
}

/// Bearer header first, then the session cookie.
pub fn token_from_parts(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value_trimmed().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/feed");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_header_wins() {
        let p = parts(&[("authorization", "Bearer abc"), ("cookie", "jwt=def")]);
        assert_eq!(token_from_parts(&p).as_deref(), Some("abc"));
    }

    #[test]
    fn falls_back_to_session_cookie() {
        let p = parts(&[("cookie", "theme=dark; jwt=def; lang=en")]);
        assert_eq!(token_from_parts(&p).as_deref(), Some("def"));
    }

    #[test]
    fn session_cookie_is_unquoted_and_split_headers_are_read() {
        let p = parts(&[("cookie", "theme=dark"), ("cookie", "jwt=\"def\"")]);
        assert_eq!(token_from_parts(&p).as_deref(), Some("def"));
        let p = parts(&[("cookie", "xjwt=nope; jwt=def")]);
        assert_eq!(token_from_parts(&p).as_deref(), Some("def"));
    }

    #[test]
    fn missing_or_empty_credentials() {
        assert_eq!(token_from_parts(&parts(&[])), None);
        assert_eq!(token_from_parts(&parts(&[("authorization", "Bearer ")])), None);
        assert_eq!(token_from_parts(&parts(&[("cookie", "jwt=")])), None);
        assert_eq!(token_from_parts(&parts(&[("authorization", "Basic Zm9v")])), None);
    }
}
