//! # Postgres adapters
//!
//! Maps the relational model onto the domain `Post` / `UserProfile`.
//! Likes are a `UUID[]` column flipped by a single `UPDATE`; replies are rows
//! in `post_replies`, ordered by a `BIGSERIAL` sequence. Neither path reads a
//! whole document and writes it back.

use std::collections::HashMap;

use async_trait::async_trait;
use domains::{
    DomainError, LikeState, Post, PostId, PostRepository, Reply, ReplyEdit, ReplyId, Result,
    UserDirectory, UserId, UserProfile,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::error;

const FOREIGN_KEY_VIOLATION: &str = "23503";

fn db_err(e: sqlx::Error) -> DomainError {
    error!(error = %e, "database error");
    DomainError::internal(format!("database error: {e}"))
}

/// Opens a pool and applies the bundled migrations.
pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

#[derive(Clone)]
pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn post_exists(&self, id: PostId) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    /// Loads replies for the given posts, grouped by post, in display order.
    async fn replies_for(&self, post_ids: &[PostId]) -> Result<HashMap<PostId, Vec<Reply>>> {
        let rows = sqlx::query(
            "SELECT id, post_id, user_id, username, user_profile_pic, text, is_edited, created_at \
             FROM post_replies WHERE post_id = ANY($1) ORDER BY post_id, seq",
        )
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut grouped: HashMap<PostId, Vec<Reply>> = HashMap::new();
        for row in rows {
            let post_id: PostId = row.try_get("post_id").map_err(db_err)?;
            grouped.entry(post_id).or_default().push(reply_from_row(&row)?);
        }
        Ok(grouped)
    }
}

fn post_from_row(row: &PgRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id").map_err(db_err)?,
        posted_by: row.try_get("posted_by").map_err(db_err)?,
        text: row.try_get("text").map_err(db_err)?,
        img: row.try_get("img").map_err(db_err)?,
        likes: row.try_get("likes").map_err(db_err)?,
        replies: Vec::new(),
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn reply_from_row(row: &PgRow) -> Result<Reply> {
    Ok(Reply {
        id: row.try_get("id").map_err(db_err)?,
        user_id: row.try_get("user_id").map_err(db_err)?,
        username: row.try_get("username").map_err(db_err)?,
        user_profile_pic: row.try_get("user_profile_pic").map_err(db_err)?,
        text: row.try_get("text").map_err(db_err)?,
        is_edited: row.try_get("is_edited").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn insert(&self, post: &Post) -> Result<()> {
        sqlx::query(
            "INSERT INTO posts (id, posted_by, text, img, likes, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(post.id)
        .bind(post.posted_by)
        .bind(&post.text)
        .bind(&post.img)
        .bind(&post.likes)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>> {
        let row = sqlx::query(
            "SELECT id, posted_by, text, img, likes, created_at FROM posts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut post = post_from_row(&row)?;
        post.replies = self.replies_for(&[id]).await?.remove(&id).unwrap_or_default();
        Ok(Some(post))
    }

    async fn delete(&self, id: PostId) -> Result<bool> {
        let done = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(done.rows_affected() == 1)
    }

    async fn toggle_like(&self, id: PostId, user_id: UserId) -> Result<Option<LikeState>> {
        // Row lock + re-evaluation under READ COMMITTED keeps concurrent flips serial.
        let liked = sqlx::query_scalar::<_, bool>(
            "UPDATE posts \
             SET likes = CASE WHEN $2 = ANY(likes) THEN array_remove(likes, $2) \
                              ELSE array_append(likes, $2) END \
             WHERE id = $1 \
             RETURNING $2 = ANY(likes)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(liked.map(|liked| if liked { LikeState::Liked } else { LikeState::Unliked }))
    }

    async fn push_reply(&self, id: PostId, reply: &Reply) -> Result<bool> {
        let inserted = sqlx::query(
            "INSERT INTO post_replies \
             (id, post_id, user_id, username, user_profile_pic, text, is_edited, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(reply.id)
        .bind(id)
        .bind(reply.user_id)
        .bind(&reply.username)
        .bind(&reply.user_profile_pic)
        .bind(&reply.text)
        .bind(reply.is_edited)
        .bind(reply.created_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
                Ok(false)
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn edit_reply(&self, id: PostId, reply_id: ReplyId, text: &str) -> Result<ReplyEdit> {
        let done = sqlx::query(
            "UPDATE post_replies SET text = $3, is_edited = TRUE WHERE post_id = $1 AND id = $2",
        )
        .bind(id)
        .bind(reply_id)
        .bind(text)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if done.rows_affected() == 1 {
            Ok(ReplyEdit::Edited)
        } else if self.post_exists(id).await? {
            Ok(ReplyEdit::ReplyMissing)
        } else {
            Ok(ReplyEdit::PostMissing)
        }
    }

    async fn remove_reply(&self, id: PostId, reply_id: ReplyId) -> Result<bool> {
        let done = sqlx::query("DELETE FROM post_replies WHERE post_id = $1 AND id = $2")
            .bind(id)
            .bind(reply_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if done.rows_affected() == 1 {
            return Ok(true);
        }
        self.post_exists(id).await
    }

    async fn list_by_authors(&self, authors: &[UserId]) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT id, posted_by, text, img, likes, created_at FROM posts \
             WHERE posted_by = ANY($1) ORDER BY created_at DESC, id DESC",
        )
        .bind(authors)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut posts = rows.iter().map(post_from_row).collect::<Result<Vec<_>>>()?;
        if posts.is_empty() {
            return Ok(posts);
        }

        let ids: Vec<PostId> = posts.iter().map(|p| p.id).collect();
        let mut replies = self.replies_for(&ids).await?;
        for post in &mut posts {
            post.replies = replies.remove(&post.id).unwrap_or_default();
        }
        Ok(posts)
    }
}

const USER_SELECT: &str = "SELECT u.id, u.username, u.email, u.profile_pic, \
        COALESCE(array_agg(f.followee_id) FILTER (WHERE f.followee_id IS NOT NULL), '{}'::uuid[]) AS following \
    FROM users u LEFT JOIN follows f ON f.follower_id = u.id";

fn profile_from_row(row: &PgRow) -> Result<UserProfile> {
    Ok(UserProfile {
        id: row.try_get("id").map_err(db_err)?,
        username: row.try_get("username").map_err(db_err)?,
        email: row.try_get("email").map_err(db_err)?,
        profile_pic: row.try_get("profile_pic").map_err(db_err)?,
        following: row.try_get("following").map_err(db_err)?,
    })
}

/// Read-only view over the identity service's `users` / `follows` tables.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserProfile>> {
        let sql = format!("{USER_SELECT} WHERE u.id = $1 GROUP BY u.id");
        sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(profile_from_row)
            .transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserProfile>> {
        let sql = format!("{USER_SELECT} WHERE u.username = $1 GROUP BY u.id");
        sqlx::query(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(profile_from_row)
            .transpose()
    }
}
