// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Dynamically-typed access to the sub-resources an instance owns.
//!
//! Sub-resource kinds are not known at compile time: plans may render
//! anything from a `ConfigMap` to a database custom resource. This module
//! carries the descriptor table of kinds the controller watches, parses
//! overrides from configuration, and builds [`DynamicObject`] APIs for
//! individual [`ResourceReference`] entries.
//!
//! # Example
//!
//! ```rust
//! use provisor::subresources::WatchedKind;
//!
//! let kind = WatchedKind::parse("apps/v1:Deployment").unwrap();
//! assert_eq!(kind.kind, "Deployment");
//! assert_eq!(kind.gvk().group, "apps");
//! ```

use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use tracing::{debug, warn};

use crate::crd::ResourceReference;
use crate::error::{is_not_found, Error, Result};

/// A kind of sub-resource whose events feed back into instance
/// reconciliation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchedKind {
    /// `group/version`, or bare `version` for the core group
    pub api_version: String,
    /// Object kind, e.g. `Deployment`
    pub kind: String,
}

impl WatchedKind {
    /// Parse a `group/version:Kind` descriptor (`v1:ConfigMap` for the core
    /// group).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the descriptor has no `:Kind` part or
    /// either side is empty.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let (api_version, kind) = descriptor
            .split_once(':')
            .ok_or_else(|| Error::Config(format!("invalid watched kind '{descriptor}', expected group/version:Kind")))?;
        if api_version.is_empty() || kind.is_empty() {
            return Err(Error::Config(format!(
                "invalid watched kind '{descriptor}', expected group/version:Kind"
            )));
        }
        Ok(WatchedKind {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
        })
    }

    /// Parse a comma-separated list of descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when any entry is malformed.
    pub fn parse_list(list: &str) -> Result<Vec<Self>> {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Group/version/kind tuple for API discovery.
    #[must_use]
    pub fn gvk(&self) -> GroupVersionKind {
        let (group, version) = split_api_version(&self.api_version);
        GroupVersionKind::gvk(group, version, &self.kind)
    }

    /// API resource descriptor with an inferred plural.
    #[must_use]
    pub fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk(&self.gvk())
    }
}

impl std::fmt::Display for WatchedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.api_version, self.kind)
    }
}

/// Default kinds watched for sub-resource drift when no override is
/// configured.
#[must_use]
pub fn default_watched_kinds() -> Vec<WatchedKind> {
    [
        ("apps/v1", "Deployment"),
        ("v1", "ConfigMap"),
        ("v1", "Secret"),
        ("v1", "Service"),
        ("kubedb.com/v1alpha1", "Postgres"),
    ]
    .iter()
    .map(|(api_version, kind)| WatchedKind {
        api_version: (*api_version).to_string(),
        kind: (*kind).to_string(),
    })
    .collect()
}

/// Split an `apiVersion` string into group and version; the core group is
/// written as a bare version (`v1`).
#[must_use]
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// Build a dynamically-typed API for the object a reference points at.
///
/// Cluster-scoped references (empty namespace) get a cluster-wide API.
#[must_use]
pub fn dynamic_api(client: Client, reference: &ResourceReference) -> Api<DynamicObject> {
    let kind = WatchedKind {
        api_version: reference.api_version.clone(),
        kind: reference.kind.clone(),
    };
    let ar = kind.api_resource();
    if reference.namespace.is_empty() {
        Api::all_with(client, &ar)
    } else {
        Api::namespaced_with(client, &reference.namespace, &ar)
    }
}

/// Check whether a referenced sub-resource still exists in the target
/// cluster.
///
/// Only a definite `404` counts as gone. Any other failure keeps the entry,
/// so a flaky API server can never make the controller forget a resource it
/// may still own.
pub async fn reference_exists(client: &Client, reference: &ResourceReference) -> bool {
    let api = dynamic_api(client.clone(), reference);
    match api.get_opt(&reference.name).await {
        Ok(Some(_)) => true,
        Ok(None) => false,
        Err(err) if is_not_found(&err) => false,
        Err(err) => {
            warn!(
                resource = %reference,
                error = %err,
                "Existence check failed, keeping resource reference"
            );
            true
        }
    }
}

/// Filter a reference list down to the entries that still exist.
pub async fn remaining_references(
    client: &Client,
    references: &[ResourceReference],
) -> Vec<ResourceReference> {
    let mut remaining = Vec::with_capacity(references.len());
    for reference in references {
        if reference_exists(client, reference).await {
            remaining.push(reference.clone());
        } else {
            debug!(resource = %reference, "Sub-resource no longer exists");
        }
    }
    remaining
}

#[cfg(test)]
#[path = "subresources_tests.rs"]
mod subresources_tests;
