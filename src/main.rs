//! SocialStore binary entry point
//!
//! Opens (and migrates) the configured database, optionally seeds it, and
//! purges expired invitations.

use socialstore::{Storage, config, data::UserRepository, seed};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging
/// 3. Connect to the database and run migrations
/// 4. Seed sample data when enabled
/// 5. Purge expired invitations
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("socialstore={}", config.logging.level).into());

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting SocialStore...");
    socialstore::metrics::init_metrics();

    tracing::info!(
        database = %config.database.path.display(),
        query_timeout_ms = config.store.query_timeout_ms,
        "Configuration loaded"
    );

    // 3. Connect
    let storage = Storage::connect(&config).await?;

    // 4. Seed
    if config.seed.enabled {
        let report = seed::run(&storage, &config.seed).await?;
        tracing::info!(?report, "Sample data created");
    }

    // 5. Housekeeping
    let purged = storage.users.purge_expired_invitations().await?;
    tracing::info!(purged, "Expired invitations purged");

    storage.db.close().await;
    tracing::info!("SocialStore shut down cleanly");

    Ok(())
}
