//! SQLite connection management
//!
//! Owns the connection pool, runs migrations on connect and provides the
//! helpers every repository shares: the per-operation wait budget and the
//! inspection of constraint-violation signals.

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::config::{DatabaseConfig, StoreConfig};
use crate::error::StoreError;

/// Database connection pool wrapper.
///
/// Cloning is cheap: the pool is reference counted internally.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database using pool settings from configuration
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(config: &DatabaseConfig, store: StoreConfig) -> Result<Self, StoreError> {
        let pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .idle_timeout(Some(config.idle_timeout()))
            .acquire_timeout(config.acquire_timeout());

        Self::connect_with(&config.path, pool_options, store.query_timeout).await
    }

    /// Connect to a database file with default pool sizing
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let store = StoreConfig::default();
        let pool_options = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(store.query_timeout);

        Self::connect_with(path, pool_options, store.query_timeout).await
    }

    async fn connect_with(
        path: &Path,
        pool_options: SqlitePoolOptions,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Database(sqlx::Error::Io(e)))?;
            }
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(busy_timeout);

        let pool = pool_options.connect_with(connect_options).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                StoreError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    /// Underlying pool, for statements and transactions
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Run one repository operation under the wait budget.
///
/// When the budget runs out the future is dropped, which cancels the
/// in-flight statement and rolls back any transaction it owned.
pub(crate) async fn timed<T, F>(
    budget: Duration,
    operation: &'static str,
    table: &'static str,
    fut: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    let started = Instant::now();
    let result = match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, ?budget, "Database operation timed out");
            Err(StoreError::Timeout(operation))
        }
    };

    if let Err(error) = &result {
        if error.is_internal() {
            tracing::error!(operation, error = ?error, "Database operation failed");
        }
    }

    crate::metrics::observe_db_operation(operation, table, started.elapsed(), &result);
    result
}

const SQLITE_UNIQUE_PREFIX: &str = "UNIQUE constraint failed: ";

/// Name the constraint a unique violation refers to.
///
/// SQLite reports the violated columns as `table.column[, table.column]`;
/// engines that name their constraints report that name instead.
pub(crate) fn unique_violation_target(error: &sqlx::Error) -> Option<String> {
    let sqlx::Error::Database(db_error) = error else {
        return None;
    };

    let message = db_error.message();
    if !db_error.is_unique_violation() && !message.starts_with(SQLITE_UNIQUE_PREFIX) {
        return None;
    }

    if let Some(constraint) = db_error.constraint() {
        return Some(constraint.to_string());
    }

    Some(
        message
            .strip_prefix(SQLITE_UNIQUE_PREFIX)
            .unwrap_or(message)
            .trim()
            .to_string(),
    )
}

pub(crate) fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => {
            db_error.is_foreign_key_violation()
                || db_error.message().starts_with("FOREIGN KEY constraint failed")
        }
        _ => false,
    }
}
