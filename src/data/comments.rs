//! Append-only comments

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::database::{self, Database};
use super::models::{Comment, NewComment};
use crate::config::StoreConfig;
use crate::error::StoreError;

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// # Errors
    /// `NotFound` if the post or the author does not exist
    async fn create(&self, comment: NewComment) -> Result<Comment, StoreError>;

    /// Comments on a post, newest first
    async fn get_by_post_id(&self, post_id: i64) -> Result<Vec<Comment>, StoreError>;
}

/// SQLite-backed [`CommentRepository`]
#[derive(Debug, Clone)]
pub struct CommentStore {
    db: Arc<Database>,
    config: StoreConfig,
}

impl CommentStore {
    pub fn new(db: Arc<Database>, config: StoreConfig) -> Self {
        Self { db, config }
    }
}

#[async_trait]
impl CommentRepository for CommentStore {
    async fn create(&self, comment: NewComment) -> Result<Comment, StoreError> {
        database::timed(self.config.query_timeout, "comments.create", "comments", async {
            let mut tx = self.db.pool().begin().await?;

            let id = sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO comments (post_id, user_id, content, created_at)
                VALUES (?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(comment.post_id)
            .bind(comment.user_id)
            .bind(&comment.content)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await
            .map_err(|error| {
                if database::is_foreign_key_violation(&error) {
                    StoreError::NotFound
                } else {
                    StoreError::Database(error)
                }
            })?;

            let created = sqlx::query_as::<_, Comment>(
                r#"
                SELECT c.id, c.post_id, c.user_id, u.username, c.content, c.created_at
                FROM comments c
                JOIN users u ON u.id = c.user_id
                WHERE c.id = ?
                "#,
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;

            tracing::debug!(comment_id = id, post_id = comment.post_id, "Comment created");
            Ok(created)
        })
        .await
    }

    async fn get_by_post_id(&self, post_id: i64) -> Result<Vec<Comment>, StoreError> {
        database::timed(
            self.config.query_timeout,
            "comments.get_by_post_id",
            "comments",
            async {
                let comments = sqlx::query_as::<_, Comment>(
                    r#"
                    SELECT c.id, c.post_id, c.user_id, u.username, c.content, c.created_at
                    FROM comments c
                    JOIN users u ON u.id = c.user_id
                    WHERE c.post_id = ?
                    ORDER BY c.created_at DESC, c.id DESC
                    "#,
                )
                .bind(post_id)
                .fetch_all(self.db.pool())
                .await?;

                Ok(comments)
            },
        )
        .await
    }
}
