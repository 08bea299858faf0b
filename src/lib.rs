//! SocialStore - storage and domain layer for a small social network
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Registration (account + invitation + mail)               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - Users, invitations, posts, comments, followers           │
//! │  - Feed query                                               │
//! │  - SQLite (sqlx)                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `data`: Repositories and the SQLite pool
//! - `service`: Registration workflow
//! - `mailer`: Invitation mail delivery
//! - `seed`: Sample data for development
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod config;
pub mod data;
pub mod error;
pub mod mailer;
pub mod metrics;
pub mod seed;
pub mod service;

use std::sync::Arc;

use data::{CommentStore, Database, FeedStore, FollowerStore, PostStore, UserStore};

/// One concrete repository per entity family, sharing a pool
///
/// Each store also implements its `*Repository` trait, so code that only
/// needs one capability can take `Arc<dyn ...>` instead.
#[derive(Debug, Clone)]
pub struct Storage {
    pub db: Arc<Database>,
    pub users: UserStore,
    pub posts: PostStore,
    pub comments: CommentStore,
    pub followers: FollowerStore,
    pub feed: FeedStore,
}

impl Storage {
    pub fn new(db: Database, config: config::StoreConfig) -> Self {
        let db = Arc::new(db);

        Self {
            users: UserStore::new(db.clone(), config),
            posts: PostStore::new(db.clone(), config),
            comments: CommentStore::new(db.clone(), config),
            followers: FollowerStore::new(db.clone(), config),
            feed: FeedStore::new(db.clone(), config),
            db,
        }
    }

    /// Open the configured database and build every store
    ///
    /// # Errors
    /// Returns error if the connection or migrations fail
    pub async fn connect(config: &config::AppConfig) -> Result<Self, error::StoreError> {
        let store_config = config.store_config();
        let db = Database::connect(&config.database, store_config).await?;
        Ok(Self::new(db, store_config))
    }

    /// Registration workflow over these stores and the configured mailer
    ///
    /// # Errors
    /// Returns error if the mail client cannot be built
    pub fn registration(
        &self,
        config: &config::AppConfig,
    ) -> Result<service::RegistrationService, mailer::MailError> {
        let mailer = mailer::from_config(&config.mail)?;
        Ok(service::RegistrationService::new(
            Arc::new(self.users.clone()),
            mailer,
            config,
        ))
    }
}
