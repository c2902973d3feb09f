//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{
    Counter, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Pipeline Metrics
    pub static ref INVOCATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socialpost_invocations_total", "Total number of pipeline invocations"),
        &["entry_point", "network"]
    ).expect("metric can be created");
    pub static ref POSTS_PUBLISHED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socialpost_posts_published_total", "Total number of posts accepted by a network"),
        &["network"]
    ).expect("metric can be created");
    pub static ref PIPELINE_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socialpost_pipeline_failures_total", "Total number of failed invocations by failing step"),
        &["kind"]
    ).expect("metric can be created");
    pub static ref PIPELINE_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "socialpost_pipeline_duration_seconds",
            "Invocation duration in seconds"
        ).buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["entry_point"]
    ).expect("metric can be created");

    // Ledger Metrics
    pub static ref LEDGER_APPENDS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socialpost_ledger_appends_total", "Total number of ledger append attempts"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref LEDGER_SNAPSHOT_BYTES: IntGauge = IntGauge::new(
        "socialpost_ledger_snapshot_bytes",
        "Size of the last persisted ledger snapshot"
    ).expect("metric can be created");

    // Storage Metrics
    pub static ref MEDIA_BYTES_ARCHIVED: Counter = Counter::new(
        "socialpost_media_bytes_archived_total",
        "Total bytes of media archived to object storage"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("socialpost_errors_total", "Total number of HTTP error responses"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(INVOCATIONS_TOTAL.clone()))
        .expect("INVOCATIONS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(POSTS_PUBLISHED_TOTAL.clone()))
        .expect("POSTS_PUBLISHED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(PIPELINE_FAILURES_TOTAL.clone()))
        .expect("PIPELINE_FAILURES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(PIPELINE_DURATION_SECONDS.clone()))
        .expect("PIPELINE_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(LEDGER_APPENDS_TOTAL.clone()))
        .expect("LEDGER_APPENDS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(LEDGER_SNAPSHOT_BYTES.clone()))
        .expect("LEDGER_SNAPSHOT_BYTES can be registered");
    REGISTRY
        .register(Box::new(MEDIA_BYTES_ARCHIVED.clone()))
        .expect("MEDIA_BYTES_ARCHIVED can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
