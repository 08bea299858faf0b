//! Invitation tokens
//!
//! Raw tokens leave the process only through the invitation email. The
//! database stores the hex SHA-512 digest, so a leaked table does not
//! yield usable activation links.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha512};
use sqlx::SqliteConnection;

use super::models::User;
use crate::error::StoreError;

const TOKEN_BYTES: usize = 32;

/// Generate a fresh random invitation token (URL-safe base64)
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// One-way digest under which an invitation is stored and looked up
pub fn digest_token(raw_token: &str) -> String {
    hex::encode(Sha512::digest(raw_token.as_bytes()))
}

pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    user_id: i64,
    raw_token: &str,
    expiry: DateTime<Utc>,
) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO user_invitations (token, user_id, expiry) VALUES (?, ?, ?)")
        .bind(digest_token(raw_token))
        .bind(user_id)
        .bind(expiry)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Flip `is_active` on the user owning a live invitation.
///
/// Lookup and update are a single statement so the transaction takes its
/// write lock up front.
pub(crate) async fn activate_user(
    conn: &mut SqliteConnection,
    raw_token: &str,
    now: DateTime<Utc>,
) -> Result<User, StoreError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET is_active = 1
        WHERE id = (
            SELECT ui.user_id FROM user_invitations ui
            WHERE ui.token = ? AND ui.expiry > ?
        )
        RETURNING id, username, email, password, created_at, is_active
        "#,
    )
    .bind(digest_token(raw_token))
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    user.ok_or(StoreError::NotFound)
}

pub(crate) async fn delete_for_user(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM user_invitations WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub(crate) async fn delete_expired(
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM user_invitations WHERE expiry <= ?")
        .bind(now)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}
