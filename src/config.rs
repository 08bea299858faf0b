//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub store: StoreSettings,
    pub invitation: InvitationConfig,
    pub mail: MailConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
    /// Upper bound of pooled connections
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// Idle connections are closed after this many seconds
    pub idle_timeout_seconds: u64,
    /// Maximum wait for a pooled connection, in seconds
    pub acquire_timeout_seconds: u64,
}

impl DatabaseConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

/// Raw store settings as they appear in configuration sources
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    /// Per-operation wait budget in milliseconds (default: 5000)
    pub query_timeout_ms: u64,
}

/// Settings handed to every repository at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub query_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(5),
        }
    }
}

/// Invitation settings
#[derive(Debug, Clone, Deserialize)]
pub struct InvitationConfig {
    /// Invitation lifetime in seconds (default: 259200 = 3 days)
    pub ttl_seconds: i64,
}

impl InvitationConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_seconds)
    }
}

/// Invitation mail delivery
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Sender display name
    pub from_name: String,
    /// Sender address
    pub from_email: String,
    /// SendGrid API key; the logging mailer is used when absent
    pub api_key: Option<String>,
    /// SendGrid-compatible send endpoint
    pub api_url: String,
    /// Ask the provider to validate without delivering
    pub sandbox: bool,
    /// Activation links are `{activation_base_url}/{token}`
    pub activation_base_url: String,
    /// Delivery attempts before giving up (default: 3)
    pub max_retries: u32,
    /// Linear backoff step between attempts, in milliseconds
    pub retry_backoff_ms: u64,
}

impl MailConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

/// Sample data generation
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_seed_users")]
    pub users: usize,
    #[serde(default = "default_seed_posts")]
    pub posts: usize,
    #[serde(default = "default_seed_comments")]
    pub comments: usize,
    #[serde(default = "default_seed_follows")]
    pub follows: usize,
    /// RNG seed, so repeated runs produce the same data set
    #[serde(default)]
    pub rng_seed: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            users: default_seed_users(),
            posts: default_seed_posts(),
            comments: default_seed_comments(),
            follows: default_seed_follows(),
            rng_seed: 0,
        }
    }
}

fn default_seed_users() -> usize {
    20
}

fn default_seed_posts() -> usize {
    100
}

fn default_seed_comments() -> usize {
    200
}

fn default_seed_follows() -> usize {
    60
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (SOCIALSTORE__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, ConfigError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("database.path", "data/socialstore.db")?
            .set_default("database.max_connections", 30)?
            .set_default("database.min_connections", 1)?
            .set_default("database.idle_timeout_seconds", 900)?
            .set_default("database.acquire_timeout_seconds", 5)?
            .set_default("store.query_timeout_ms", 5000)?
            .set_default("invitation.ttl_seconds", 259_200)?
            .set_default("mail.from_name", "SocialStore")?
            .set_default("mail.from_email", "no-reply@socialstore.local")?
            .set_default("mail.api_url", "https://api.sendgrid.com/v3/mail/send")?
            .set_default("mail.sandbox", true)?
            .set_default("mail.activation_base_url", "http://localhost:4000/confirm")?
            .set_default("mail.max_retries", 3)?
            .set_default("mail.retry_backoff_ms", 1000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("SOCIALSTORE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Repository settings derived from the raw store section
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            query_timeout: Duration::from_millis(self.store.query_timeout_ms),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError(
                "database.min_connections must not exceed database.max_connections".to_string(),
            ));
        }

        if self.database.acquire_timeout_seconds == 0 {
            return Err(ConfigError(
                "database.acquire_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.store.query_timeout_ms == 0 {
            return Err(ConfigError(
                "store.query_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.invitation.ttl_seconds <= 0 {
            return Err(ConfigError(
                "invitation.ttl_seconds must be greater than 0".to_string(),
            ));
        }

        if self.mail.max_retries == 0 {
            return Err(ConfigError(
                "mail.max_retries must be at least 1".to_string(),
            ));
        }

        url::Url::parse(&self.mail.activation_base_url).map_err(|e| {
            ConfigError(format!("mail.activation_base_url is not a valid URL: {e}"))
        })?;
        url::Url::parse(&self.mail.api_url)
            .map_err(|e| ConfigError(format!("mail.api_url is not a valid URL: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn valid_config() -> AppConfig {
        AppConfig {
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/socialstore-test.db"),
                max_connections: 5,
                min_connections: 1,
                idle_timeout_seconds: 900,
                acquire_timeout_seconds: 5,
            },
            store: StoreSettings {
                query_timeout_ms: 5000,
            },
            invitation: InvitationConfig {
                ttl_seconds: 259_200,
            },
            mail: MailConfig {
                from_name: "SocialStore".to_string(),
                from_email: "no-reply@example.com".to_string(),
                api_key: None,
                api_url: "https://api.sendgrid.com/v3/mail/send".to_string(),
                sandbox: true,
                activation_base_url: "http://localhost:4000/confirm".to_string(),
                max_retries: 3,
                retry_backoff_ms: 0,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
            seed: SeedConfig::default(),
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.store_config().query_timeout, Duration::from_secs(5));
        assert_eq!(config.invitation.ttl(), chrono::Duration::days(3));
    }

    #[test]
    fn validate_rejects_zero_query_timeout() {
        let mut config = valid_config();
        config.store.query_timeout_ms = 0;

        let error = config
            .validate()
            .expect_err("zero query timeout must fail");
        assert!(error.0.contains("store.query_timeout_ms"));
    }

    #[test]
    fn validate_rejects_empty_pool() {
        let mut config = valid_config();
        config.database.max_connections = 0;

        let error = config.validate().expect_err("empty pool must fail");
        assert!(error.0.contains("database.max_connections"));
    }

    #[test]
    fn validate_rejects_bad_activation_url() {
        let mut config = valid_config();
        config.mail.activation_base_url = "not a url".to_string();

        let error = config.validate().expect_err("bad URL must fail");
        assert!(error.0.contains("mail.activation_base_url"));
    }
}
