// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the instance controller.
//!
//! Every reconcile pass receives an `Arc<Context>` carrying the client for
//! the cluster that hosts the `ServiceInstance` objects plus the two
//! collaborators the engine drives: the [`ClusterResolver`] that locates
//! the target cluster and the [`ResourceManager`] that renders and
//! converges sub-resources. Both sit behind trait objects so tests can
//! substitute scripted implementations without touching the engine.

use std::sync::Arc;

use kube::Client;

use crate::cluster::ClusterResolver;
use crate::config::Config;
use crate::manager::ResourceManager;

/// Shared context passed to every reconcile pass.
#[derive(Clone)]
pub struct Context {
    /// Client for the cluster hosting the `ServiceInstance` objects
    pub client: Client,

    /// Resolves the target cluster sub-resources are provisioned into
    pub resolver: Arc<dyn ClusterResolver>,

    /// Renders, converges and observes an instance's sub-resources
    pub manager: Arc<dyn ResourceManager>,

    /// Operator configuration loaded at startup
    pub config: Config,
}

impl Context {
    /// Assemble a context from its collaborators.
    #[must_use]
    pub fn new(
        client: Client,
        resolver: Arc<dyn ClusterResolver>,
        manager: Arc<dyn ResourceManager>,
        config: Config,
    ) -> Self {
        Self {
            client,
            resolver,
            manager,
            config,
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
