//! Common test utilities for E2E tests

#![allow(dead_code)]

use socialstore::data::{NewPost, NewUser, PasswordHash, Post, PostRepository, User, UserRepository};
use socialstore::{Storage, config};
use tempfile::TempDir;

/// Test store instance
pub struct TestStore {
    pub storage: Storage,
    pub config: config::AppConfig,
    pub _temp_dir: TempDir,
}

impl TestStore {
    /// Create a store backed by a fresh temporary database
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            database: config::DatabaseConfig {
                path: db_path,
                max_connections: 5,
                min_connections: 1,
                idle_timeout_seconds: 60,
                acquire_timeout_seconds: 5,
            },
            store: config::StoreSettings {
                query_timeout_ms: 5000,
            },
            invitation: config::InvitationConfig {
                ttl_seconds: 3600,
            },
            mail: config::MailConfig {
                from_name: "SocialStore".to_string(),
                from_email: "no-reply@test.example.com".to_string(),
                api_key: None,
                api_url: "https://api.sendgrid.com/v3/mail/send".to_string(),
                sandbox: true,
                activation_base_url: "https://test.example.com/confirm".to_string(),
                max_retries: 3,
                retry_backoff_ms: 0,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
            seed: config::SeedConfig::default(),
        };

        let storage = Storage::connect(&config).await.unwrap();

        Self {
            storage,
            config,
            _temp_dir: temp_dir,
        }
    }

    /// Create an inactive user named `name`
    pub async fn create_user(&self, name: &str) -> User {
        self.storage
            .users
            .create(NewUser {
                username: name.to_string(),
                email: format!("{name}@test.example.com"),
                password: PasswordHash::new("password").unwrap(),
            })
            .await
            .unwrap()
    }

    /// Create a post by `user_id`
    pub async fn create_post(&self, user_id: i64, title: &str, tags: &[&str]) -> Post {
        self.storage
            .posts
            .create(NewPost {
                user_id,
                title: title.to_string(),
                content: format!("{title} body"),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            })
            .await
            .unwrap()
    }
}
