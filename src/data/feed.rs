//! Feed aggregation
//!
//! A user's feed holds their own posts plus posts by everyone they follow,
//! each joined with the author's username and a comment count.
//!
//! Every caller-supplied value is a bound parameter. The sort direction is
//! the only piece of query text that varies, and it comes from the
//! [`SortDirection`] allow-list.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};

use super::database::{self, Database};
use super::models::{FeedPost, FeedRow, encode_tags};
use crate::config::StoreConfig;
use crate::error::StoreError;

pub const MAX_LIMIT: u32 = 20;
pub const MAX_TAGS: usize = 5;
pub const MAX_SEARCH_CHARS: usize = 100;

/// Ordering on creation time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(Self::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(Self::Desc)
        } else {
            Err(StoreError::Validation(format!(
                "sort must be 'asc' or 'desc', got '{s}'"
            )))
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => f.write_str("asc"),
            Self::Desc => f.write_str("desc"),
        }
    }
}

/// Feed paging, filtering and ordering
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeedQuery {
    /// Page size, 1..=20
    pub limit: u32,
    pub offset: u32,
    pub sort: SortDirection,
    /// A post matches when it carries every listed tag (at most 5)
    pub tags: Vec<String>,
    /// Unicode case-insensitive substring of title or content (at most 100 chars)
    pub search: Option<String>,
    /// Inclusive lower bound on creation time
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on creation time
    pub until: Option<DateTime<Utc>>,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            limit: MAX_LIMIT,
            offset: 0,
            sort: SortDirection::Desc,
            tags: Vec::new(),
            search: None,
            since: None,
            until: None,
        }
    }
}

impl FeedQuery {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(StoreError::Validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }

        if self.tags.len() > MAX_TAGS {
            return Err(StoreError::Validation(format!(
                "at most {MAX_TAGS} tags may be filtered on"
            )));
        }

        if let Some(search) = &self.search {
            if search.chars().count() > MAX_SEARCH_CHARS {
                return Err(StoreError::Validation(format!(
                    "search must be at most {MAX_SEARCH_CHARS} characters"
                )));
            }
        }

        if let (Some(since), Some(until)) = (self.since, self.until) {
            if since > until {
                return Err(StoreError::Validation(
                    "since must not be after until".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }
}

fn build_feed_query(user_id: i64, query: &FeedQuery) -> Result<QueryBuilder<'_, Sqlite>, StoreError> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        r#"
        SELECT
            p.id AS id, p.user_id AS user_id, p.title AS title, p.content AS content,
            p.tags AS tags, p.created_at AS created_at, p.updated_at AS updated_at,
            p.version AS version, u.username AS username, COUNT(c.id) AS comments_count
        FROM posts p
        JOIN users u ON u.id = p.user_id
        LEFT JOIN comments c ON c.post_id = p.id
        WHERE (p.user_id = "#,
    );
    builder.push_bind(user_id);
    builder.push(" OR p.user_id IN (SELECT f.user_id FROM followers f WHERE f.follower_id = ");
    builder.push_bind(user_id);
    builder.push("))");

    if let Some(term) = query.search_term() {
        let folded = term.to_lowercase();
        builder.push(" AND (instr(p.title_folded, ");
        builder.push_bind(folded.clone());
        builder.push(") > 0 OR instr(p.content_folded, ");
        builder.push_bind(folded);
        builder.push(") > 0)");
    }

    if !query.tags.is_empty() {
        builder.push(" AND NOT EXISTS (SELECT 1 FROM json_each(");
        builder.push_bind(encode_tags(&query.tags)?);
        builder.push(") wanted WHERE wanted.value NOT IN (SELECT have.value FROM json_each(p.tags) have))");
    }

    if let Some(since) = query.since {
        builder.push(" AND p.created_at >= ");
        builder.push_bind(since);
    }

    if let Some(until) = query.until {
        builder.push(" AND p.created_at <= ");
        builder.push_bind(until);
    }

    let direction = query.sort.as_sql();
    builder.push(" GROUP BY p.id, u.username");
    builder.push(format!(" ORDER BY p.created_at {direction}, p.id {direction}"));
    builder.push(" LIMIT ");
    builder.push_bind(i64::from(query.limit));
    builder.push(" OFFSET ");
    builder.push_bind(i64::from(query.offset));

    Ok(builder)
}

#[async_trait]
pub trait FeedRepository: Send + Sync {
    /// One page of `user_id`'s feed
    ///
    /// # Errors
    /// `Validation` if the query is out of bounds
    async fn get_user_feed(
        &self,
        user_id: i64,
        query: &FeedQuery,
    ) -> Result<Vec<FeedPost>, StoreError>;
}

/// SQLite-backed [`FeedRepository`]
#[derive(Debug, Clone)]
pub struct FeedStore {
    db: Arc<Database>,
    config: StoreConfig,
}

impl FeedStore {
    pub fn new(db: Arc<Database>, config: StoreConfig) -> Self {
        Self { db, config }
    }
}

#[async_trait]
impl FeedRepository for FeedStore {
    async fn get_user_feed(
        &self,
        user_id: i64,
        query: &FeedQuery,
    ) -> Result<Vec<FeedPost>, StoreError> {
        query.validate()?;

        database::timed(self.config.query_timeout, "feed.get_user_feed", "posts", async {
            let mut builder = build_feed_query(user_id, query)?;
            let rows = builder
                .build_query_as::<FeedRow>()
                .fetch_all(self.db.pool())
                .await?;

            rows.into_iter().map(FeedPost::try_from).collect()
        })
        .await
    }
}
