//! # auth-adapters
//!
//! Implementations of `PrincipalResolver`. The engine never issues
//! credentials; it only verifies tokens minted by the identity service.

use async_trait::async_trait;
use dashmap::DashMap;
use domains::{DomainError, PrincipalResolver, Result, UserId};

#[cfg(feature = "auth-jwt")]
mod jwt;

#[cfg(feature = "auth-jwt")]
pub use jwt::{Claims, JwtPrincipalResolver};

/// Fixed token → user table, for local development and tests.
#[derive(Default)]
pub struct StaticPrincipalResolver {
    tokens: DashMap<String, UserId>,
}

impl StaticPrincipalResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, token: impl Into<String>, user: UserId) -> Self {
        self.tokens.insert(token.into(), user);
        self
    }
}

#[async_trait]
impl PrincipalResolver for StaticPrincipalResolver {
    async fn resolve(&self, token: &str) -> Result<UserId> {
        self.tokens
            .get(token)
            .map(|id| *id.value())
            .ok_or_else(|| DomainError::unauthorized("invalid token"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn static_resolver_knows_only_its_tokens() {
        let alice = Uuid::now_v7();
        let resolver = StaticPrincipalResolver::new().with_token("alice-token", alice);

        assert_eq!(resolver.resolve("alice-token").await.unwrap(), alice);
        assert!(matches!(
            resolver.resolve("forged").await,
            Err(DomainError::Unauthorized(_))
        ));
    }
}
