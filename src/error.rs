// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the Provisor operator.
//!
//! A single crate-level [`Error`] enum covers Kubernetes API failures,
//! collaborator failures, and configuration problems, with a [`Result`]
//! alias used throughout. The reconcile engine deliberately keeps the
//! underlying error intact while an instance is still recoverable, so the
//! controller's error policy can apply its own backoff.

use thiserror::Error;

/// Convenience alias used by every fallible operation in the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the Provisor operator.
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API request failed (either the instance's own cluster or a
    /// resolved target cluster).
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// JSON (de)serialization failed while persisting or comparing objects.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No plan ConfigMap exists for the requested plan.
    #[error("plan manifests not found for plan {plan_id} in namespace {namespace}")]
    PlanNotFound {
        /// Plan identifier from the instance spec
        plan_id: String,
        /// Namespace searched for the plan ConfigMap
        namespace: String,
    },

    /// A plan manifest could not be parsed into a Kubernetes object.
    #[error("invalid manifest {key} in plan {plan_id}: {source}")]
    ManifestParse {
        /// Data key of the offending manifest inside the plan ConfigMap
        key: String,
        /// Plan identifier the manifest belongs to
        plan_id: String,
        /// Underlying YAML parse failure
        #[source]
        source: serde_yaml::Error,
    },

    /// The configured target-cluster kubeconfig could not be read or parsed.
    #[error("kubeconfig error: {0}")]
    Kubeconfig(String),

    /// Operator configuration from the environment is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Anything a collaborator implementation needs to surface beyond the
    /// variants above.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Whether a Kubernetes API error is a 404 for the requested object.
///
/// Used to tell "confirmed absent" apart from transient failures when
/// existence-checking sub-resources and when deleting them.
#[must_use]
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(api_err) if api_err.code == 404)
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
