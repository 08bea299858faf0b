//! Follower graph
//!
//! Edges are created and destroyed independently of any other entity.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::database::{self, Database};
use crate::config::StoreConfig;
use crate::error::StoreError;

const EDGE_CONSTRAINT: &str = "followers.user_id, followers.follower_id";

#[async_trait]
pub trait FollowerRepository: Send + Sync {
    /// `follower_id` starts following `user_id`
    ///
    /// # Errors
    /// `Conflict` if the edge already exists, `SelfFollow` if both ids match
    async fn follow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError>;

    /// Remove the edge; a missing edge is not an error
    async fn unfollow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError>;

    /// Ids of users following `user_id`
    async fn followers(&self, user_id: i64) -> Result<Vec<i64>, StoreError>;

    /// Ids of users `user_id` follows
    async fn following(&self, user_id: i64) -> Result<Vec<i64>, StoreError>;
}

/// SQLite-backed [`FollowerRepository`]
#[derive(Debug, Clone)]
pub struct FollowerStore {
    db: Arc<Database>,
    config: StoreConfig,
}

impl FollowerStore {
    pub fn new(db: Arc<Database>, config: StoreConfig) -> Self {
        Self { db, config }
    }
}

#[async_trait]
impl FollowerRepository for FollowerStore {
    async fn follow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError> {
        if follower_id == user_id {
            return Err(StoreError::SelfFollow);
        }

        database::timed(self.config.query_timeout, "followers.follow", "followers", async {
            sqlx::query("INSERT INTO followers (user_id, follower_id, created_at) VALUES (?, ?, ?)")
                .bind(user_id)
                .bind(follower_id)
                .bind(Utc::now())
                .execute(self.db.pool())
                .await
                .map_err(|error| match database::unique_violation_target(&error).as_deref() {
                    Some(EDGE_CONSTRAINT) => StoreError::Conflict,
                    _ => StoreError::Database(error),
                })?;

            tracing::debug!(follower_id, user_id, "Follow edge created");
            Ok(())
        })
        .await
    }

    async fn unfollow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError> {
        database::timed(self.config.query_timeout, "followers.unfollow", "followers", async {
            let result = sqlx::query("DELETE FROM followers WHERE follower_id = ? AND user_id = ?")
                .bind(follower_id)
                .bind(user_id)
                .execute(self.db.pool())
                .await?;

            tracing::debug!(
                follower_id,
                user_id,
                removed = result.rows_affected(),
                "Follow edge removed"
            );
            Ok(())
        })
        .await
    }

    async fn followers(&self, user_id: i64) -> Result<Vec<i64>, StoreError> {
        database::timed(self.config.query_timeout, "followers.followers", "followers", async {
            let ids = sqlx::query_scalar::<_, i64>(
                "SELECT follower_id FROM followers WHERE user_id = ? ORDER BY follower_id",
            )
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;

            Ok(ids)
        })
        .await
    }

    async fn following(&self, user_id: i64) -> Result<Vec<i64>, StoreError> {
        database::timed(self.config.query_timeout, "followers.following", "followers", async {
            let ids = sqlx::query_scalar::<_, i64>(
                "SELECT user_id FROM followers WHERE follower_id = ? ORDER BY user_id",
            )
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;

            Ok(ids)
        })
        .await
    }
}
