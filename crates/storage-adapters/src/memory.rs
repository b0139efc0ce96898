//! # In-memory adapters
//!
//! `DashMap`-backed implementations of `PostRepository` and `UserDirectory`.
//! Every mutation runs under the entry's exclusive shard guard, so a
//! read-modify-write on one post can never interleave with another.

use async_trait::async_trait;
use dashmap::DashMap;
use domains::{
    sort_newest_first, LikeState, Post, PostId, PostRepository, Reply, ReplyEdit, ReplyId,
    Result, UserDirectory, UserId, UserProfile,
};

#[derive(Default)]
pub struct InMemoryPostRepository {
    posts: DashMap<PostId, Post>,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn insert(&self, post: &Post) -> Result<()> {
        self.posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>> {
        Ok(self.posts.get(&id).map(|p| p.value().clone()))
    }

    async fn delete(&self, id: PostId) -> Result<bool> {
        Ok(self.posts.remove(&id).is_some())
    }

    async fn toggle_like(&self, id: PostId, user_id: UserId) -> Result<Option<LikeState>> {
        Ok(self.posts.get_mut(&id).map(|mut p| p.toggle_like(user_id)))
    }

    async fn push_reply(&self, id: PostId, reply: &Reply) -> Result<bool> {
        Ok(match self.posts.get_mut(&id) {
            Some(mut p) => {
                p.replies.push(reply.clone());
                true
            }
            None => false,
        })
    }

    async fn edit_reply(&self, id: PostId, reply_id: ReplyId, text: &str) -> Result<ReplyEdit> {
        let Some(mut post) = self.posts.get_mut(&id) else {
            return Ok(ReplyEdit::PostMissing);
        };
        Ok(if post.edit_reply(reply_id, text) {
            ReplyEdit::Edited
        } else {
            ReplyEdit::ReplyMissing
        })
    }

    async fn remove_reply(&self, id: PostId, reply_id: ReplyId) -> Result<bool> {
        Ok(match self.posts.get_mut(&id) {
            Some(mut p) => {
                p.remove_reply(reply_id);
                true
            }
            None => false,
        })
    }

    async fn list_by_authors(&self, authors: &[UserId]) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| authors.contains(&p.posted_by))
            .map(|p| p.value().clone())
            .collect();
        sort_newest_first(&mut posts);
        Ok(posts)
    }
}

/// Stand-in for the identity service, for tests and single-node dev setups.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<UserId, UserProfile>,
    by_username: DashMap<String, UserId>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, user: UserProfile) {
        if let Some(previous) = self.users.get(&user.id) {
            self.by_username.remove(&previous.username);
        }
        self.by_username.insert(user.username.clone(), user.id);
        self.users.insert(user.id, user);
    }

    /// Adds `followee` to `follower`'s following set. Returns `false` if the
    /// follower is unknown.
    pub fn follow(&self, follower: UserId, followee: UserId) -> bool {
        match self.users.get_mut(&follower) {
            Some(mut user) => {
                if !user.following.contains(&followee) {
                    user.following.push(followee);
                }
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserProfile>> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserProfile>> {
        let Some(id) = self.by_username.get(username).map(|id| *id.value()) else {
            return Ok(None);
        };
        self.find_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;

    fn author(id: UserId) -> UserProfile {
        UserProfile {
            id,
            username: "bob".into(),
            email: "bob@example.com".into(),
            profile_pic: None,
            following: vec![],
        }
    }

    #[tokio::test]
    async fn toggle_converges_by_parity() {
        let repo = InMemoryPostRepository::new();
        let post = Post::new(Uuid::now_v7(), "hello".into(), None);
        repo.insert(&post).await.unwrap();
        let user = Uuid::now_v7();

        for n in 1..=6 {
            repo.toggle_like(post.id, user).await.unwrap();
            let likes = repo.find_by_id(post.id).await.unwrap().unwrap().likes;
            if n % 2 == 1 {
                assert_eq!(likes, vec![user]);
            } else {
                assert!(likes.is_empty());
            }
        }
        assert_eq!(repo.toggle_like(Uuid::now_v7(), user).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_likes_lose_no_update() {
        let repo = Arc::new(InMemoryPostRepository::new());
        let post = Post::new(Uuid::now_v7(), "hello".into(), None);
        repo.insert(&post).await.unwrap();
        let post_id = post.id;

        let users: Vec<UserId> = (0..64).map(|_| Uuid::now_v7()).collect();
        let tasks: Vec<_> = users
            .iter()
            .map(|&user| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.toggle_like(post_id, user).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), Some(LikeState::Liked));
        }

        let stored = repo.find_by_id(post_id).await.unwrap().unwrap();
        assert_eq!(stored.likes.len(), users.len());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_toggles_by_one_user_converge_by_parity() {
        for n in [31usize, 32] {
            let repo = Arc::new(InMemoryPostRepository::new());
            let post = Post::new(Uuid::now_v7(), "hello".into(), None);
            repo.insert(&post).await.unwrap();
            let (post_id, user) = (post.id, Uuid::now_v7());

            let tasks: Vec<_> = (0..n)
                .map(|_| {
                    let repo = repo.clone();
                    tokio::spawn(async move { repo.toggle_like(post_id, user).await })
                })
                .collect();
            let mut liked = 0;
            for task in tasks {
                if task.await.unwrap().unwrap() == Some(LikeState::Liked) {
                    liked += 1;
                }
            }

            // Every flip was serialised: likes and unlikes alternate.
            assert_eq!(liked, n.div_ceil(2));
            let likes = repo.find_by_id(post_id).await.unwrap().unwrap().likes;
            if n % 2 == 1 {
                assert_eq!(likes, vec![user]);
            } else {
                assert!(likes.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn reply_lifecycle() {
        let repo = InMemoryPostRepository::new();
        let post = Post::new(Uuid::now_v7(), "hello".into(), None);
        repo.insert(&post).await.unwrap();
        let reply = Reply::new(&author(Uuid::now_v7()), "first".into());

        assert!(repo.push_reply(post.id, &reply).await.unwrap());
        assert_eq!(
            repo.edit_reply(post.id, reply.id, "edited").await.unwrap(),
            ReplyEdit::Edited
        );
        assert_eq!(
            repo.edit_reply(post.id, Uuid::now_v7(), "x").await.unwrap(),
            ReplyEdit::ReplyMissing
        );
        assert_eq!(
            repo.edit_reply(Uuid::now_v7(), reply.id, "x").await.unwrap(),
            ReplyEdit::PostMissing
        );

        let stored = repo.find_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(stored.replies[0].text, "edited");
        assert!(stored.replies[0].is_edited);

        assert!(repo.remove_reply(post.id, Uuid::now_v7()).await.unwrap());
        assert!(repo.remove_reply(post.id, reply.id).await.unwrap());
        assert!(!repo.remove_reply(Uuid::now_v7(), reply.id).await.unwrap());
        assert!(repo.find_by_id(post.id).await.unwrap().unwrap().replies.is_empty());
    }

    #[tokio::test]
    async fn list_by_authors_filters_and_sorts() {
        let repo = InMemoryPostRepository::new();
        let (a, b, c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        for author in [a, b, c, a] {
            repo.insert(&Post::new(author, "p".into(), None)).await.unwrap();
        }

        let posts = repo.list_by_authors(&[a, b]).await.unwrap();
        assert_eq!(posts.len(), 3);
        assert!(posts.iter().all(|p| p.posted_by != c));
        assert!(posts.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn directory_tracks_renames_and_follows() {
        let dir = InMemoryUserDirectory::new();
        let id = Uuid::now_v7();
        dir.upsert(author(id));
        let mut renamed = author(id);
        renamed.username = "robert".into();
        dir.upsert(renamed);

        assert!(dir.find_by_username("bob").await.unwrap().is_none());
        assert_eq!(dir.find_by_username("robert").await.unwrap().unwrap().id, id);

        let other = Uuid::now_v7();
        assert!(dir.follow(id, other));
        assert!(dir.follow(id, other));
        assert!(!dir.follow(Uuid::now_v7(), other));
        assert_eq!(dir.find_by_id(id).await.unwrap().unwrap().following, vec![other]);
    }
}
