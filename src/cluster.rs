// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Target cluster resolution.
//!
//! Sub-resources are provisioned into a *target* cluster that may differ
//! from the cluster hosting the `ServiceInstance` objects. The
//! [`ClusterResolver`] trait hides how the target is found; the shipped
//! [`KubeconfigClusterResolver`] reads a kubeconfig from a Secret named in
//! the operator configuration and falls back to the local cluster when no
//! Secret is configured.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::SecretLocation;
use crate::crd::InstanceCoordinates;
use crate::error::{Error, Result};

/// Key inside the kubeconfig Secret holding the serialized kubeconfig
const KUBECONFIG_SECRET_KEY: &str = "value";

/// Resolves the cluster an instance's sub-resources live in.
#[async_trait]
pub trait ClusterResolver: Send + Sync {
    /// Return a client for the instance's target cluster.
    ///
    /// # Errors
    ///
    /// Fails when the target cluster's credentials cannot be read or do not
    /// produce a working client configuration.
    async fn get_cluster(&self, coordinates: &InstanceCoordinates) -> Result<Client>;
}

/// Resolver backed by a kubeconfig stored in a Secret.
///
/// When no Secret is configured the source cluster doubles as the target,
/// covering single-cluster deployments. The resolved client is cached: the
/// kubeconfig Secret is read once per process, not once per reconcile.
pub struct KubeconfigClusterResolver {
    source: Client,
    secret: Option<SecretLocation>,
    cached: Mutex<Option<Client>>,
}

impl KubeconfigClusterResolver {
    #[must_use]
    pub fn new(source: Client, secret: Option<SecretLocation>) -> Self {
        Self {
            source,
            secret,
            cached: Mutex::new(None),
        }
    }

    /// Read and parse the kubeconfig Secret into a client.
    async fn build_target_client(&self, location: &SecretLocation) -> Result<Client> {
        info!(secret = %location, "Reading target cluster kubeconfig");

        let secrets: Api<Secret> = Api::namespaced(self.source.clone(), &location.namespace);
        let secret = secrets.get(&location.name).await.map_err(|e| {
            Error::Kubeconfig(format!("failed to get kubeconfig secret {location}: {e}"))
        })?;

        let Some(data) = secret.data.as_ref() else {
            return Err(Error::Kubeconfig(format!(
                "kubeconfig secret {location} has no data"
            )));
        };
        let Some(kubeconfig_data) = data.get(KUBECONFIG_SECRET_KEY) else {
            return Err(Error::Kubeconfig(format!(
                "kubeconfig secret {location} does not contain '{KUBECONFIG_SECRET_KEY}' key"
            )));
        };

        let kubeconfig = String::from_utf8(kubeconfig_data.0.clone()).map_err(|e| {
            Error::Kubeconfig(format!("failed to decode kubeconfig {location}: {e}"))
        })?;

        let parsed: Kubeconfig = serde_yaml::from_str(&kubeconfig)
            .map_err(|e| Error::Kubeconfig(format!("failed to parse kubeconfig: {e}")))?;

        let config = kube::Config::from_custom_kubeconfig(parsed, &KubeConfigOptions::default())
            .await
            .map_err(|e| Error::Kubeconfig(format!("failed to create config: {e}")))?;

        Client::try_from(config)
            .map_err(|e| Error::Kubeconfig(format!("failed to create client: {e}")))
    }
}

#[async_trait]
impl ClusterResolver for KubeconfigClusterResolver {
    async fn get_cluster(&self, coordinates: &InstanceCoordinates) -> Result<Client> {
        let Some(location) = &self.secret else {
            debug!(
                instance = %coordinates.instance_id,
                "No target kubeconfig configured, provisioning into the local cluster"
            );
            return Ok(self.source.clone());
        };

        let mut cached = self.cached.lock().await;
        if let Some(client) = cached.as_ref() {
            return Ok(client.clone());
        }

        let client = self.build_target_client(location).await?;
        *cached = Some(client.clone());
        Ok(client)
    }
}

#[cfg(test)]
#[path = "cluster_tests.rs"]
mod cluster_tests;
