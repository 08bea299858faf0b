//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::StoreError;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Database Metrics
    pub static ref DB_QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socialstore_db_queries_total", "Total number of database operations"),
        &["operation", "table", "outcome"]
    ).expect("metric can be created");
    pub static ref DB_QUERY_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "socialstore_db_query_duration_seconds",
            "Database operation duration in seconds"
        ).buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["operation", "table"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socialstore_errors_total", "Total number of storage errors"),
        &["error_kind", "operation"]
    ).expect("metric can be created");

    // Account Metrics
    pub static ref USERS_ACTIVATED_TOTAL: IntCounter = IntCounter::new(
        "socialstore_users_activated_total",
        "Total number of activated accounts"
    ).expect("metric can be created");
    pub static ref INVITATION_EMAILS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socialstore_invitation_emails_total", "Invitation email delivery attempts"),
        &["status"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; registration happens on the first call.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(DB_QUERIES_TOTAL.clone()))
            .expect("DB_QUERIES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(DB_QUERY_DURATION_SECONDS.clone()))
            .expect("DB_QUERY_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(STORE_ERRORS_TOTAL.clone()))
            .expect("STORE_ERRORS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(USERS_ACTIVATED_TOTAL.clone()))
            .expect("USERS_ACTIVATED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(INVITATION_EMAILS_TOTAL.clone()))
            .expect("INVITATION_EMAILS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

/// Record one repository operation.
pub fn observe_db_operation<T>(
    operation: &'static str,
    table: &'static str,
    elapsed: Duration,
    result: &Result<T, StoreError>,
) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(error) => {
            STORE_ERRORS_TOTAL
                .with_label_values(&[error.kind().as_str(), operation])
                .inc();
            "error"
        }
    };

    DB_QUERIES_TOTAL
        .with_label_values(&[operation, table, outcome])
        .inc();
    DB_QUERY_DURATION_SECONDS
        .with_label_values(&[operation, table])
        .observe(elapsed.as_secs_f64());
}

/// Render the registry in the Prometheus text exposition format.
pub fn gather() -> Result<String, StoreError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| StoreError::Internal(e.into()))?;
    String::from_utf8(buffer).map_err(|e| StoreError::Internal(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_includes_recorded_operations() {
        init_metrics();
        init_metrics();

        let ok: Result<(), StoreError> = Ok(());
        observe_db_operation("metrics.test", "users", Duration::from_millis(1), &ok);
        let failed: Result<(), StoreError> = Err(StoreError::NotFound);
        observe_db_operation("metrics.test", "users", Duration::from_millis(1), &failed);

        let text = gather().unwrap();
        assert!(text.contains("socialstore_db_queries_total"));
        assert!(text.contains("socialstore_errors_total"));
        assert!(text.contains("not_found"));
    }
}
