//! Error types for SocialStore
//!
//! Every repository translates store-specific failure signals into
//! `StoreError` at the point where they occur. Callers match on the
//! variant (or on [`StoreError::kind`]) and never need to inspect
//! raw database messages.

use thiserror::Error;

/// Storage-layer error type
///
/// The `Database` and `Internal` variants keep their source for logging
/// but render a generic message, so raw store text does not leak to
/// whoever displays the error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity (or version-matched row) absent
    #[error("resource not found")]
    NotFound,

    /// Duplicate follower edge
    #[error("resource already exists")]
    Conflict,

    /// Post exists but the supplied version is stale
    #[error("version conflict")]
    VersionConflict,

    /// `users.email` unique constraint violated
    #[error("a user with that email already exists")]
    DuplicateEmail,

    /// `users.username` unique constraint violated
    #[error("a user with that username already exists")]
    DuplicateUsername,

    /// A user tried to follow themself
    #[error("users cannot follow themselves")]
    SelfFollow,

    /// Rejected input
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation exceeded its wait budget
    #[error("operation timed out: {0}")]
    Timeout(&'static str),

    /// Unclassified database failure
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Any other internal failure
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

/// Stable, distinguishable error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    VersionConflict,
    DuplicateEmail,
    DuplicateUsername,
    SelfFollow,
    Validation,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::VersionConflict => "version_conflict",
            Self::DuplicateEmail => "duplicate_email",
            Self::DuplicateUsername => "duplicate_username",
            Self::SelfFollow => "self_follow",
            Self::Validation => "validation",
            Self::Internal => "internal",
        }
    }
}

impl StoreError {
    /// Classify this error.
    ///
    /// Timeouts, database failures and internal failures all collapse
    /// into [`ErrorKind::Internal`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound => ErrorKind::NotFound,
            StoreError::Conflict => ErrorKind::Conflict,
            StoreError::VersionConflict => ErrorKind::VersionConflict,
            StoreError::DuplicateEmail => ErrorKind::DuplicateEmail,
            StoreError::DuplicateUsername => ErrorKind::DuplicateUsername,
            StoreError::SelfFollow => ErrorKind::SelfFollow,
            StoreError::Validation(_) => ErrorKind::Validation,
            StoreError::Timeout(_) | StoreError::Database(_) | StoreError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}

/// Configuration failure, raised while loading `AppConfig`
#[derive(Debug, Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(pub String);

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError(err.to_string())
    }
}

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;
