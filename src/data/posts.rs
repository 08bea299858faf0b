//! Posts with optimistic concurrency control
//!
//! Concurrent writers are arbitrated by the conditional `UPDATE` on
//! `version`; no row is ever locked between a fetch and an update.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::database::{self, Database};
use super::models::{NewPost, Post, PostRow, encode_tags};
use crate::config::StoreConfig;
use crate::error::StoreError;

const POST_COLUMNS: &str = "id, user_id, title, content, tags, created_at, updated_at, version";

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post; `version` starts at 1
    async fn create(&self, post: NewPost) -> Result<Post, StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Post, StoreError>;

    /// Persist new title and content if `post.version` is still current
    ///
    /// Returns the stored post carrying the incremented version.
    ///
    /// # Errors
    /// `VersionConflict` if the post exists with another version,
    /// `NotFound` if it does not exist
    async fn update(&self, post: &Post) -> Result<Post, StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}

/// SQLite-backed [`PostRepository`]
#[derive(Debug, Clone)]
pub struct PostStore {
    db: Arc<Database>,
    config: StoreConfig,
}

impl PostStore {
    pub fn new(db: Arc<Database>, config: StoreConfig) -> Self {
        Self { db, config }
    }

    async fn exists(&self, id: i64) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?)")
            .bind(id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(exists)
    }
}

#[async_trait]
impl PostRepository for PostStore {
    async fn create(&self, post: NewPost) -> Result<Post, StoreError> {
        database::timed(self.config.query_timeout, "posts.create", "posts", async {
            let now = Utc::now();
            let row = sqlx::query_as::<_, PostRow>(&format!(
                r#"
                INSERT INTO posts
                    (title, content, title_folded, content_folded, user_id, tags, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                RETURNING {POST_COLUMNS}
                "#
            ))
            .bind(&post.title)
            .bind(&post.content)
            .bind(post.title.to_lowercase())
            .bind(post.content.to_lowercase())
            .bind(post.user_id)
            .bind(encode_tags(&post.tags)?)
            .bind(now)
            .bind(now)
            .fetch_one(self.db.pool())
            .await?;

            let created = Post::try_from(row)?;
            tracing::info!(post_id = created.id, user_id = created.user_id, "Post created");
            Ok(created)
        })
        .await
    }

    async fn get_by_id(&self, id: i64) -> Result<Post, StoreError> {
        database::timed(self.config.query_timeout, "posts.get_by_id", "posts", async {
            sqlx::query_as::<_, PostRow>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?"))
                .bind(id)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(StoreError::NotFound)
                .and_then(Post::try_from)
        })
        .await
    }

    async fn update(&self, post: &Post) -> Result<Post, StoreError> {
        database::timed(self.config.query_timeout, "posts.update", "posts", async {
            let row = sqlx::query_as::<_, PostRow>(&format!(
                r#"
                UPDATE posts
                SET title = ?, content = ?, title_folded = ?, content_folded = ?,
                    updated_at = ?, version = version + 1
                WHERE id = ? AND version = ?
                RETURNING {POST_COLUMNS}
                "#
            ))
            .bind(&post.title)
            .bind(&post.content)
            .bind(post.title.to_lowercase())
            .bind(post.content.to_lowercase())
            .bind(Utc::now())
            .bind(post.id)
            .bind(post.version)
            .fetch_optional(self.db.pool())
            .await?;

            let Some(row) = row else {
                // Zero rows: either the post is gone or the version is stale.
                if !self.exists(post.id).await? {
                    return Err(StoreError::NotFound);
                }
                tracing::debug!(
                    post_id = post.id,
                    stale_version = post.version,
                    "Rejected stale post update"
                );
                return Err(StoreError::VersionConflict);
            };

            let updated = Post::try_from(row)?;
            tracing::info!(post_id = updated.id, version = updated.version, "Post updated");
            Ok(updated)
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        database::timed(self.config.query_timeout, "posts.delete", "posts", async {
            let result = sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(self.db.pool())
                .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound);
            }

            tracing::info!(post_id = id, "Post deleted");
            Ok(())
        })
        .await
    }
}
