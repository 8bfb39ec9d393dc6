// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Provisor operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all Provisor CRDs
pub const API_GROUP: &str = "osb.provisor.io";

/// API version for all Provisor CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "osb.provisor.io/v1alpha1";

/// Kind name for the `ServiceInstance` resource
pub const KIND_SERVICE_INSTANCE: &str = "ServiceInstance";

// ============================================================================
// Error Handling Constants
// ============================================================================

/// Consecutive failing passes tolerated before an instance is marked `failed`.
/// The terminal transition fires on the pass that pushes the counter past this
/// value, i.e. the 11th consecutive failure.
pub const ERROR_THRESHOLD: i64 = 10;

/// Additional attempts granted to a store mutation after its first failure.
/// Each retry re-fetches the object, so optimistic-concurrency conflicts are
/// absorbed without an external lock.
pub const MUTATION_RETRY_LIMIT: u32 = 10;

/// Requeue duration applied by the controller error policy (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Requeue duration while an instance sits in `in progress` (30 seconds).
/// Sub-resources may live in a remote cluster and produce no local watch
/// events, so convergence needs a periodic poll.
pub const IN_PROGRESS_REQUEUE_SECS: u64 = 30;

/// Requeue duration after a finalizer update could not be persisted (5 seconds)
pub const FINALIZER_REQUEUE_SECS: u64 = 5;

// ============================================================================
// Status Text Constants
// ============================================================================

/// Description written alongside the forced `failed` state once the error
/// threshold is exceeded
pub const RETRY_THRESHOLD_DESCRIPTION: &str =
    "Service instance operation abandoned: retry threshold reached";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Maximum reconcile passes driven concurrently by the controller
pub const RECONCILE_CONCURRENCY: u16 = 10;

/// Field manager name used for server-side apply of sub-resources
pub const FIELD_MANAGER: &str = "provisor-controller";

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for the Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for the Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for the metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
