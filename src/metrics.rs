// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Provisor operator.
//!
//! This module provides metrics collection with the namespace prefix
//! `provisor_io_` (prometheus-safe version of "provisor.io").
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Track reconcile passes and their outcomes
//! - **Mutation Metrics** - Track store-write retries caused by conflicts or
//!   transient API failures
//! - **Lifecycle Metrics** - Track sub-resource applies/deletes and terminal
//!   instance failures
//!
//! # Example
//!
//! ```rust,no_run
//! use provisor::metrics::{METRICS_REGISTRY, record_reconciliation_success};
//!
//! // Record a successful reconciliation
//! record_reconciliation_success(std::time::Duration::from_secs(1));
//! ```

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::info;

use crate::constants::METRICS_SERVER_PATH;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all Provisor metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "provisor_io";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of instance reconcile passes by outcome
///
/// Labels:
/// - `status`: Outcome (`success`, `error`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of instance reconcile passes by outcome",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconcile passes in seconds
///
/// Labels:
/// - `status`: Outcome (`success`, `error`)
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of instance reconcile passes in seconds by outcome",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Mutation Metrics
// ============================================================================

/// Total number of store-mutation retries
///
/// Every increment means a write had to be repeated with a freshly fetched
/// copy of the object, usually after an optimistic-concurrency conflict.
///
/// Labels:
/// - `operation`: The mutation being retried (e.g., `ensure finalizer`)
pub static MUTATION_RETRIES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_mutation_retries_total"),
        "Total number of store-mutation retries by operation",
    );
    let counter = CounterVec::new(opts, &["operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Lifecycle Metrics
// ============================================================================

/// Total number of instances abandoned after exceeding the failure threshold
pub static INSTANCES_FAILED_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_instances_failed_total"),
        "Total number of instances marked failed after exceeding the failure threshold",
    );
    let counter = Counter::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of sub-resources applied to target clusters
///
/// Labels:
/// - `kind`: Kind of the applied sub-resource (e.g., `Deployment`)
pub static SUB_RESOURCES_APPLIED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_sub_resources_applied_total"),
        "Total number of sub-resources applied to target clusters by kind",
    );
    let counter = CounterVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of sub-resource deletions issued against target clusters
///
/// Labels:
/// - `kind`: Kind of the deleted sub-resource (e.g., `Deployment`)
pub static SUB_RESOURCES_DELETED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_sub_resources_deleted_total"),
        "Total number of sub-resource deletions issued against target clusters by kind",
    );
    let counter = CounterVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconcile pass
///
/// # Arguments
/// * `duration` - Duration of the pass
pub fn record_reconciliation_success(duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&["success"]).inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&["success"])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconcile pass
///
/// # Arguments
/// * `duration` - Duration of the pass before failure
pub fn record_reconciliation_error(duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&["error"]).inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&["error"])
        .observe(duration.as_secs_f64());
}

/// Record a retried store mutation
///
/// # Arguments
/// * `operation` - The mutation being retried (e.g., `set in progress`)
pub fn record_mutation_retry(operation: &str) {
    MUTATION_RETRIES_TOTAL
        .with_label_values(&[operation])
        .inc();
}

/// Record an instance crossing the failure threshold into `failed`
pub fn record_terminal_failure() {
    INSTANCES_FAILED_TOTAL.inc();
}

/// Record a sub-resource apply
///
/// # Arguments
/// * `kind` - Kind of the applied sub-resource
pub fn record_sub_resource_applied(kind: &str) {
    SUB_RESOURCES_APPLIED_TOTAL
        .with_label_values(&[kind])
        .inc();
}

/// Record a sub-resource deletion
///
/// # Arguments
/// * `kind` - Kind of the deleted sub-resource
pub fn record_sub_resource_deleted(kind: &str) {
    SUB_RESOURCES_DELETED_TOTAL
        .with_label_values(&[kind])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

// ============================================================================
// Metrics HTTP Server
// ============================================================================

async fn metrics_handler() -> impl IntoResponse {
    match gather_metrics() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

/// Router exposing the Prometheus text endpoint
#[must_use]
pub fn metrics_router() -> Router {
    Router::new().route(METRICS_SERVER_PATH, get(metrics_handler))
}

/// Serve the metrics endpoint until the process exits.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve_metrics(bind_address: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!(
        address = %bind_address,
        path = METRICS_SERVER_PATH,
        "Serving Prometheus metrics"
    );
    axum::serve(listener, metrics_router()).await?;
    Ok(())
}
