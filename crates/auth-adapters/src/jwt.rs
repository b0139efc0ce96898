//! HS256 JWT verification against a shared secret.

use async_trait::async_trait;
use domains::{DomainError, PrincipalResolver, Result, UserId};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id of the principal
    pub sub: String,
    pub exp: usize,
}

pub struct JwtPrincipalResolver {
    key: DecodingKey,
    validation: Validation,
}

impl JwtPrincipalResolver {
    pub fn new(secret: &SecretString) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl PrincipalResolver for JwtPrincipalResolver {
    async fn resolve(&self, token: &str) -> Result<UserId> {
        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                DomainError::unauthorized("invalid token")
            })?
            .claims;

        claims
            .sub
            .parse::<UserId>()
            .map_err(|_| DomainError::unauthorized("token subject is not a user id"))
    }
}
