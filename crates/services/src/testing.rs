//! Test doubles shared by the service unit tests.

use std::time::Duration;

use async_trait::async_trait;
use domains::{Result, UserDirectory, UserId, UserProfile};

pub fn profile(id: UserId, name: &str) -> UserProfile {
    UserProfile {
        id,
        username: name.into(),
        email: format!("{name}@example.com"),
        profile_pic: None,
        following: vec![],
    }
}

/// A directory that answers for a fixed set of users after `delay`.
pub struct SlowDirectory {
    pub users: Vec<UserProfile>,
    pub delay: Duration,
}

#[async_trait]
impl UserDirectory for SlowDirectory {
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserProfile>> {
        tokio::time::sleep(self.delay).await;
        Ok(self.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserProfile>> {
        tokio::time::sleep(self.delay).await;
        Ok(self.users.iter().find(|u| u.username == username).cloned())
    }
}
