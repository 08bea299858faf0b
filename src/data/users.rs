//! User accounts and the invitation-based activation workflow

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqliteConnection;

use super::database::{self, Database};
use super::invitations;
use super::models::{NewUser, User};
use crate::config::StoreConfig;
use crate::error::StoreError;

const EMAIL_CONSTRAINT: &str = "users.email";
const USERNAME_CONSTRAINT: &str = "users.username";

/// Account persistence
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert an (inactive) account
    ///
    /// # Errors
    /// `DuplicateEmail` / `DuplicateUsername` on the matching unique constraint
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    /// Fetch an account by id
    async fn get(&self, id: i64) -> Result<User, StoreError>;

    /// Fetch an account by email
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;

    /// Insert an inactive account and its invitation in one transaction
    ///
    /// `expiry = now + ttl`. If either insert fails nothing persists.
    async fn create_and_invite(
        &self,
        user: NewUser,
        raw_token: &str,
        ttl: chrono::Duration,
    ) -> Result<User, StoreError>;

    /// Redeem a live invitation
    ///
    /// Activates the account and deletes the invitation in one transaction.
    ///
    /// # Errors
    /// `NotFound` if the token is unknown or expired
    async fn activate(&self, raw_token: &str) -> Result<User, StoreError>;

    /// Delete invitations whose expiry has passed
    async fn purge_expired_invitations(&self) -> Result<u64, StoreError>;
}

/// SQLite-backed [`UserRepository`]
#[derive(Debug, Clone)]
pub struct UserStore {
    db: Arc<Database>,
    config: StoreConfig,
}

impl UserStore {
    pub fn new(db: Arc<Database>, config: StoreConfig) -> Self {
        Self { db, config }
    }
}

fn map_insert_error(error: sqlx::Error) -> StoreError {
    match database::unique_violation_target(&error).as_deref() {
        Some(EMAIL_CONSTRAINT) => StoreError::DuplicateEmail,
        Some(USERNAME_CONSTRAINT) => StoreError::DuplicateUsername,
        _ => StoreError::Database(error),
    }
}

async fn insert_user(conn: &mut SqliteConnection, user: &NewUser) -> Result<User, StoreError> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, username, email, password, created_at, is_active
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
    .map_err(map_insert_error)
}

#[async_trait]
impl UserRepository for UserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        database::timed(self.config.query_timeout, "users.create", "users", async {
            let mut conn = self.db.pool().acquire().await?;
            let created = insert_user(&mut conn, &user).await?;

            tracing::info!(user_id = created.id, username = %created.username, "User created");
            Ok(created)
        })
        .await
    }

    async fn get(&self, id: i64) -> Result<User, StoreError> {
        database::timed(self.config.query_timeout, "users.get", "users", async {
            sqlx::query_as::<_, User>(
                "SELECT id, username, email, password, created_at, is_active FROM users WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        database::timed(self.config.query_timeout, "users.get_by_email", "users", async {
            sqlx::query_as::<_, User>(
                "SELECT id, username, email, password, created_at, is_active FROM users WHERE email = ?",
            )
            .bind(email)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn create_and_invite(
        &self,
        user: NewUser,
        raw_token: &str,
        ttl: chrono::Duration,
    ) -> Result<User, StoreError> {
        if raw_token.is_empty() {
            return Err(StoreError::Validation(
                "invitation token must not be empty".to_string(),
            ));
        }

        database::timed(
            self.config.query_timeout,
            "users.create_and_invite",
            "users",
            async {
                let mut tx = self.db.pool().begin().await?;

                let created = insert_user(&mut tx, &user).await?;
                invitations::insert(&mut tx, created.id, raw_token, Utc::now() + ttl).await?;

                tx.commit().await?;

                tracing::info!(
                    user_id = created.id,
                    username = %created.username,
                    "User created with pending invitation"
                );
                Ok(created)
            },
        )
        .await
    }

    async fn activate(&self, raw_token: &str) -> Result<User, StoreError> {
        database::timed(self.config.query_timeout, "users.activate", "users", async {
            let mut tx = self.db.pool().begin().await?;

            let user = invitations::activate_user(&mut tx, raw_token, Utc::now()).await?;
            invitations::delete_for_user(&mut tx, user.id).await?;

            tx.commit().await?;

            crate::metrics::USERS_ACTIVATED_TOTAL.inc();
            tracing::info!(user_id = user.id, "User activated");
            Ok(user)
        })
        .await
    }

    async fn purge_expired_invitations(&self) -> Result<u64, StoreError> {
        database::timed(
            self.config.query_timeout,
            "users.purge_expired_invitations",
            "user_invitations",
            async {
                let mut conn = self.db.pool().acquire().await?;
                let purged = invitations::delete_expired(&mut conn, Utc::now()).await?;

                if purged > 0 {
                    tracing::info!(purged, "Purged expired invitations");
                }
                Ok(purged)
            },
        )
        .await
    }
}
