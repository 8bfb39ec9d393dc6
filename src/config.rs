// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration loaded from environment variables.
//!
//! All settings have working defaults so the operator can start with an
//! empty environment: cluster-wide watches, sub-resources provisioned into
//! the local cluster, and the built-in watched-kind table.
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `WATCH_NAMESPACE` | Restrict instance watches to one namespace |
//! | `TARGET_KUBECONFIG_SECRET` | `namespace/name` of a Secret holding the target cluster kubeconfig under the `value` key |
//! | `WATCHED_SUB_RESOURCES` | Comma-separated `group/version:Kind` overrides for the sub-resource watch table |
//! | `METRICS_BIND_ADDRESS` | Bind address of the Prometheus endpoint |

use std::env;
use std::fmt;
use std::str::FromStr;

use crate::constants::{METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PORT};
use crate::error::{Error, Result};
use crate::subresources::{default_watched_kinds, WatchedKind};

/// Location of a Secret, written as `namespace/name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretLocation {
    pub namespace: String,
    pub name: String,
}

impl FromStr for SecretLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
                Ok(SecretLocation {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(Error::Config(format!(
                "invalid secret location '{s}', expected namespace/name"
            ))),
        }
    }
}

impl fmt::Display for SecretLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Operator configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    /// Namespace the instance watch is restricted to; `None` watches all
    pub watch_namespace: Option<String>,

    /// Secret holding the target cluster kubeconfig; `None` provisions into
    /// the local cluster
    pub target_kubeconfig_secret: Option<SecretLocation>,

    /// Sub-resource kinds whose events trigger instance reconciliation
    pub watched_kinds: Vec<WatchedKind>,

    /// Bind address of the metrics HTTP server, e.g. `0.0.0.0:8080`
    pub metrics_bind_address: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `TARGET_KUBECONFIG_SECRET` or
    /// `WATCHED_SUB_RESOURCES` is set but malformed.
    pub fn from_env() -> Result<Self> {
        let watch_namespace = env::var("WATCH_NAMESPACE")
            .ok()
            .filter(|ns| !ns.is_empty());

        let target_kubeconfig_secret = match env::var("TARGET_KUBECONFIG_SECRET") {
            Ok(value) if !value.is_empty() => Some(value.parse()?),
            _ => None,
        };

        let watched_kinds = match env::var("WATCHED_SUB_RESOURCES") {
            Ok(value) if !value.is_empty() => WatchedKind::parse_list(&value)?,
            _ => default_watched_kinds(),
        };

        let metrics_bind_address = env::var("METRICS_BIND_ADDRESS").unwrap_or_else(|_| {
            format!("{METRICS_SERVER_BIND_ADDRESS}:{METRICS_SERVER_PORT}")
        });

        Ok(Config {
            watch_namespace,
            target_kubeconfig_secret,
            watched_kinds,
            metrics_bind_address,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            watch_namespace: None,
            target_kubeconfig_secret: None,
            watched_kinds: default_watched_kinds(),
            metrics_bind_address: format!(
                "{METRICS_SERVER_BIND_ADDRESS}:{METRICS_SERVER_PORT}"
            ),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
