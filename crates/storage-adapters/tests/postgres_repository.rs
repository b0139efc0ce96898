//! Postgres adapter tests against a real database.
//!
//! A single `postgres:16` container is started for the whole binary. Set
//! `POSTLINE_TEST_DATABASE_URL` to run against an existing scratch database
//! instead. With neither Docker nor that variable, every test returns early.
//! Rows are keyed by fresh UUIDs, so tests share the database freely.

use std::sync::Arc;

use chrono::{Duration, Utc};
use domains::{LikeState, Post, PostRepository, Reply, ReplyEdit, UserDirectory, UserProfile};
use sqlx::PgPool;
use storage_adapters::postgres::connect;
use storage_adapters::{PgPostRepository, PgUserDirectory};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

struct SharedDb {
    url: String,
    _container: Option<ContainerAsync<Postgres>>,
}

static SHARED_DB: OnceCell<Option<SharedDb>> = OnceCell::const_new();

async fn start_db() -> Option<SharedDb> {
    if let Ok(url) = std::env::var("POSTLINE_TEST_DATABASE_URL") {
        return Some(SharedDb { url, _container: None });
    }
    let container = match Postgres::default().with_tag("16").start().await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("postgres container unavailable, skipping: {e}");
            return None;
        }
    };
    let host = container.get_host().await.ok()?;
    let port = container.get_host_port_ipv4(5432).await.ok()?;
    Some(SharedDb {
        url: format!("postgres://postgres:postgres@{host}:{port}/postgres"),
        _container: Some(container),
    })
}

/// A migrated pool on the shared database, or `None` when there is none.
async fn pool() -> Option<PgPool> {
    let db = SHARED_DB.get_or_init(start_db).await.as_ref()?;
    Some(connect(&db.url, 5).await.expect("connect and migrate"))
}

fn author(name: &str) -> UserProfile {
    UserProfile {
        id: Uuid::now_v7(),
        username: format!("{name}-{}", Uuid::now_v7().simple()),
        email: format!("{name}@example.com"),
        profile_pic: Some(format!("https://cdn.example.com/{name}.png")),
        following: vec![],
    }
}

async fn insert_user(pool: &PgPool, user: &UserProfile) {
    sqlx::query("INSERT INTO users (id, username, email, profile_pic) VALUES ($1, $2, $3, $4)")
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.profile_pic)
        .execute(pool)
        .await
        .unwrap();
}

async fn follow(pool: &PgPool, follower: Uuid, followee: Uuid) {
    sqlx::query("INSERT INTO follows (follower_id, followee_id) VALUES ($1, $2)")
        .bind(follower)
        .bind(followee)
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn toggle_like_flips_membership() {
    let Some(pool) = pool().await else { return };
    let repo = PgPostRepository::new(pool);
    let post = Post::new(Uuid::now_v7(), "hello".into(), None);
    repo.insert(&post).await.unwrap();
    let (bob, carol) = (Uuid::now_v7(), Uuid::now_v7());

    assert_eq!(repo.toggle_like(post.id, bob).await.unwrap(), Some(LikeState::Liked));
    assert_eq!(repo.toggle_like(post.id, carol).await.unwrap(), Some(LikeState::Liked));
    assert_eq!(repo.toggle_like(post.id, bob).await.unwrap(), Some(LikeState::Unliked));
    assert_eq!(repo.find_by_id(post.id).await.unwrap().unwrap().likes, vec![carol]);

    assert_eq!(repo.toggle_like(Uuid::now_v7(), bob).await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_toggles_serialize_per_row() {
    let Some(pool) = pool().await else { return };
    let repo = Arc::new(PgPostRepository::new(pool));
    let post = Post::new(Uuid::now_v7(), "popular".into(), None);
    repo.insert(&post).await.unwrap();
    let post_id = post.id;

    // Distinct users: every like lands.
    let users: Vec<Uuid> = (0..16).map(|_| Uuid::now_v7()).collect();
    let handles: Vec<_> = users
        .iter()
        .map(|&user| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.toggle_like(post_id, user).await })
        })
        .collect();
    for h in handles {
        assert_eq!(h.await.unwrap().unwrap(), Some(LikeState::Liked));
    }
    let mut likes = repo.find_by_id(post.id).await.unwrap().unwrap().likes;
    likes.sort();
    let mut expected = users.clone();
    expected.sort();
    assert_eq!(likes, expected);

    // One user, odd and even counts: the final state follows parity.
    for n in [9usize, 10] {
        let target = Post::new(Uuid::now_v7(), "contested".into(), None);
        repo.insert(&target).await.unwrap();
        let target_id = target.id;
        let user = Uuid::now_v7();
        let handles: Vec<_> = (0..n)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.toggle_like(target_id, user).await })
            })
            .collect();
        let mut liked = 0;
        for h in handles {
            if h.await.unwrap().unwrap() == Some(LikeState::Liked) {
                liked += 1;
            }
        }
        assert_eq!(liked, n.div_ceil(2));
        let likes = repo.find_by_id(target_id).await.unwrap().unwrap().likes;
        if n % 2 == 1 {
            assert_eq!(likes, vec![user]);
        } else {
            assert!(likes.is_empty());
        }
    }
}

#[tokio::test]
async fn replies_keep_insertion_order() {
    let Some(pool) = pool().await else { return };
    let repo = PgPostRepository::new(pool);
    let post = Post::new(Uuid::now_v7(), "thread".into(), None);
    repo.insert(&post).await.unwrap();
    let bob = author("bob");

    let replies: Vec<Reply> = ["first", "second", "third"]
        .into_iter()
        .map(|text| Reply::new(&bob, text.into()))
        .collect();
    for reply in &replies {
        assert!(repo.push_reply(post.id, reply).await.unwrap());
    }

    assert!(repo.remove_reply(post.id, replies[1].id).await.unwrap());
    let late = Reply::new(&bob, "fourth".into());
    assert!(repo.push_reply(post.id, &late).await.unwrap());

    let stored = repo.find_by_id(post.id).await.unwrap().unwrap();
    let texts: Vec<&str> = stored.replies.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, ["first", "third", "fourth"]);
    assert_eq!(stored.replies[0].username, bob.username);
    assert_eq!(stored.replies[0].user_profile_pic, bob.profile_pic);

    // Unknown reply on a live post is a no-op; a missing post is not.
    assert!(repo.remove_reply(post.id, Uuid::now_v7()).await.unwrap());
    assert!(!repo.remove_reply(Uuid::now_v7(), replies[0].id).await.unwrap());
    assert!(!repo.push_reply(Uuid::now_v7(), &Reply::new(&bob, "orphan".into())).await.unwrap());
}

#[tokio::test]
async fn edit_reply_distinguishes_missing_reply_from_missing_post() {
    let Some(pool) = pool().await else { return };
    let repo = PgPostRepository::new(pool);
    let post = Post::new(Uuid::now_v7(), "thread".into(), None);
    repo.insert(&post).await.unwrap();
    let reply = Reply::new(&author("bob"), "draft".into());
    repo.push_reply(post.id, &reply).await.unwrap();

    assert_eq!(repo.edit_reply(post.id, reply.id, "final").await.unwrap(), ReplyEdit::Edited);
    assert_eq!(
        repo.edit_reply(post.id, Uuid::now_v7(), "x").await.unwrap(),
        ReplyEdit::ReplyMissing
    );
    assert_eq!(
        repo.edit_reply(Uuid::now_v7(), reply.id, "x").await.unwrap(),
        ReplyEdit::PostMissing
    );

    let stored = repo.find_by_id(post.id).await.unwrap().unwrap();
    assert_eq!(stored.replies[0].text, "final");
    assert!(stored.replies[0].is_edited);
}

#[tokio::test]
async fn delete_cascades_to_replies() {
    let Some(pool) = pool().await else { return };
    let repo = PgPostRepository::new(pool.clone());
    let post = Post::new(Uuid::now_v7(), "short lived".into(), None);
    repo.insert(&post).await.unwrap();
    repo.push_reply(post.id, &Reply::new(&author("bob"), "hi".into())).await.unwrap();

    assert!(repo.delete(post.id).await.unwrap());
    assert!(!repo.delete(post.id).await.unwrap());
    assert!(repo.find_by_id(post.id).await.unwrap().is_none());

    let left: i64 = sqlx::query_scalar("SELECT count(*) FROM post_replies WHERE post_id = $1")
        .bind(post.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(left, 0);
}

#[tokio::test]
async fn list_by_authors_is_newest_first_with_replies() {
    let Some(pool) = pool().await else { return };
    let repo = PgPostRepository::new(pool);
    let (alice, bob, stranger) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
    let now = Utc::now();

    let mut oldest = Post::new(alice, "oldest".into(), None);
    oldest.created_at = now - Duration::hours(3);
    let mut middle = Post::new(bob, "middle".into(), None);
    middle.created_at = now - Duration::hours(2);
    let mut newest = Post::new(alice, "newest".into(), None);
    newest.created_at = now - Duration::hours(1);
    let unrelated = Post::new(stranger, "not followed".into(), None);
    for post in [&middle, &oldest, &unrelated, &newest] {
        repo.insert(post).await.unwrap();
    }
    repo.push_reply(middle.id, &Reply::new(&author("carol"), "nice".into()))
        .await
        .unwrap();

    let feed = repo.list_by_authors(&[alice, bob]).await.unwrap();
    let ids: Vec<Uuid> = feed.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![newest.id, middle.id, oldest.id]);
    assert_eq!(feed[1].replies.len(), 1);

    assert!(repo.list_by_authors(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn user_directory_aggregates_follows() {
    let Some(pool) = pool().await else { return };
    let users = PgUserDirectory::new(pool.clone());
    let (alice, bob, carol) = (author("alice"), author("bob"), author("carol"));
    for u in [&alice, &bob, &carol] {
        insert_user(&pool, u).await;
    }
    follow(&pool, alice.id, bob.id).await;
    follow(&pool, alice.id, carol.id).await;

    let found = users.find_by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(found.username, alice.username);
    assert_eq!(found.email, alice.email);
    let mut following = found.following;
    following.sort();
    let mut expected = vec![bob.id, carol.id];
    expected.sort();
    assert_eq!(following, expected);

    let lonely = users.find_by_username(&bob.username).await.unwrap().unwrap();
    assert_eq!(lonely.id, bob.id);
    assert!(lonely.following.is_empty());

    assert!(users.find_by_id(Uuid::now_v7()).await.unwrap().is_none());
    assert!(users.find_by_username("nobody-here").await.unwrap().is_none());
}
