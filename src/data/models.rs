//! Data models
//!
//! Rust structs representing database entities.
//! Entities use SQLite integer identities and chrono UTC timestamps.

use std::collections::HashSet;
use std::fmt;

use rand::rngs::OsRng;
use argon2::password_hash::{PasswordHash as PhcString, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

// =============================================================================
// Password
// =============================================================================

#[cfg(test)]
const ARGON2_MEMORY_KIB: u32 = 1024;
#[cfg(not(test))]
const ARGON2_MEMORY_KIB: u32 = 19_456;
const ARGON2_ITERATIONS: u32 = 2;

fn argon2() -> Result<Argon2<'static>, StoreError> {
    let params = Params::new(ARGON2_MEMORY_KIB, ARGON2_ITERATIONS, 1, None)
        .map_err(|e| StoreError::Internal(anyhow::anyhow!("invalid argon2 params: {e}")))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Salted Argon2id hash of an account password (PHC string format)
///
/// The plaintext is consumed by [`PasswordHash::new`] and never stored.
#[derive(Clone, PartialEq, Eq, sqlx::Type)]
#[sqlx(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash a plaintext password with a fresh random salt
    pub fn new(plaintext: &str) -> Result<Self, StoreError> {
        let salt = SaltString::generate(&mut OsRng);
        let phc = argon2()?
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| StoreError::Internal(anyhow::anyhow!("password hashing failed: {e}")))?
            .to_string();
        Ok(Self(phc))
    }

    /// Hash on the blocking thread pool so the async runtime keeps moving
    pub async fn hash_blocking(plaintext: String) -> Result<Self, StoreError> {
        tokio::task::spawn_blocking(move || Self::new(&plaintext))
            .await
            .map_err(|e| StoreError::Internal(e.into()))?
    }

    /// Compare a candidate plaintext against this hash
    ///
    /// Used by the credential validator; malformed hashes never match.
    pub fn matches(&self, plaintext: &str) -> bool {
        let Ok(parsed) = PhcString::new(&self.0) else {
            return false;
        };
        let Ok(argon) = argon2() else {
            return false;
        };
        argon.verify_password(plaintext.as_bytes(), &parsed).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

// =============================================================================
// User
// =============================================================================

/// A registered account
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password: PasswordHash,
    pub created_at: DateTime<Utc>,
    /// false until the invitation has been redeemed
    pub is_active: bool,
}

/// Fields supplied when creating an account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: PasswordHash,
}

// =============================================================================
// Invitation
// =============================================================================

/// Pending account invitation
///
/// `token` is the hex SHA-512 digest of the issued token.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Invitation {
    pub token: String,
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
}

// =============================================================================
// Post
// =============================================================================

/// A post with optimistic-concurrency version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Starts at 1, incremented by every successful update
    pub version: i64,
}

/// Fields supplied when creating a post
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    /// Stored in order; repeats are kept once
    pub tags: Vec<String>,
}

/// Raw `posts` row; tags are stored as a JSON array
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PostRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub tags: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl TryFrom<PostRow> for Post {
    type Error = StoreError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let tags = serde_json::from_str(&row.tags).map_err(|e| {
            StoreError::Internal(anyhow::anyhow!("post {} has malformed tags: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            content: row.content,
            tags,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

/// JSON array of `tags` with repeats dropped, first occurrence kept
pub(crate) fn encode_tags(tags: &[String]) -> Result<String, StoreError> {
    let mut seen = HashSet::with_capacity(tags.len());
    let unique: Vec<&str> = tags
        .iter()
        .map(String::as_str)
        .filter(|tag| seen.insert(*tag))
        .collect();

    serde_json::to_string(&unique).map_err(|e| StoreError::Internal(e.into()))
}

// =============================================================================
// Comment
// =============================================================================

/// A comment on a post, with its author's username
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when commenting
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
}

// =============================================================================
// Feed
// =============================================================================

/// A feed entry: the post, its author and how many comments it has
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPost {
    #[serde(flatten)]
    pub post: Post,
    pub username: String,
    pub comments_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedRow {
    #[sqlx(flatten)]
    pub post: PostRow,
    pub username: String,
    pub comments_count: i64,
}

impl TryFrom<FeedRow> for FeedPost {
    type Error = StoreError;

    fn try_from(row: FeedRow) -> Result<Self, Self::Error> {
        Ok(Self {
            post: Post::try_from(row.post)?,
            username: row.username,
            comments_count: row.comments_count,
        })
    }
}
