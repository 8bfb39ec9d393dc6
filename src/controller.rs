// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `ServiceInstance` controller wiring.
//!
//! Builds the kube-runtime controller around the reconciliation engine: the
//! instance watch, owned watches over every configured sub-resource kind,
//! the error policy, and per-pass metrics.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use kube::api::{Api, DynamicObject};
use kube::runtime::controller::{self, Action};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::ResourceExt;
use tracing::{error, info};

use crate::constants::{ERROR_REQUEUE_DURATION_SECS, RECONCILE_CONCURRENCY};
use crate::context::Context;
use crate::crd::ServiceInstance;
use crate::reconcilers::reconcile_service_instance;

/// Reconciliation error wrapper
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ReconcileError(#[from] anyhow::Error);

/// Error policy for the instance controller.
///
/// Returns an action to requeue the resource after a delay when
/// reconciliation fails. The terminal `failed` transition never reaches
/// this policy: the engine swallows the threshold-crossing error so the
/// instance stops being requeued.
#[allow(clippy::needless_pass_by_value)] // Signature required by kube::runtime::Controller
fn error_policy(
    resource: Arc<ServiceInstance>,
    err: &ReconcileError,
    _ctx: Arc<Context>,
) -> Action {
    error!(
        error = %err,
        instance = %resource.name_any(),
        "Reconciliation error - will retry in {}s",
        ERROR_REQUEUE_DURATION_SECS
    );
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}

/// Reconciliation wrapper recording per-pass metrics.
async fn reconcile_wrapper(
    instance: Arc<ServiceInstance>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = std::time::Instant::now();
    let result = reconcile_service_instance(instance, ctx).await;

    let duration = start.elapsed();
    if result.is_ok() {
        crate::metrics::record_reconciliation_success(duration);
    } else {
        crate::metrics::record_reconciliation_error(duration);
    }

    result.map_err(|err| ReconcileError::from(anyhow::Error::from(err)))
}

/// Run the `ServiceInstance` controller until it exits.
///
/// Watches the instances themselves plus every configured sub-resource
/// kind; sub-resources carry a controller owner reference, so their events
/// map back to the owning instance. Sub-resources living in a remote target
/// cluster produce no local events and are covered by the in-progress
/// requeue instead.
///
/// # Arguments
///
/// * `context` - The controller context with clients and collaborators
///
/// # Errors
///
/// Returns an error if the controller fails to start.
pub async fn run_service_instance_controller(context: Arc<Context>) -> Result<()> {
    info!("Starting ServiceInstance controller");

    let client = context.client.clone();
    let api = match &context.config.watch_namespace {
        Some(namespace) => Api::<ServiceInstance>::namespaced(client.clone(), namespace),
        None => Api::<ServiceInstance>::all(client.clone()),
    };

    // Configure controller to watch for ALL changes including status updates
    let watcher_config = WatcherConfig::default().any_semantic();

    let mut instance_controller = Controller::new(api, watcher_config.clone())
        .with_config(controller::Config::default().concurrency(RECONCILE_CONCURRENCY));

    for kind in &context.config.watched_kinds {
        let resource = kind.api_resource();
        let owned: Api<DynamicObject> = match &context.config.watch_namespace {
            Some(namespace) => Api::namespaced_with(client.clone(), namespace, &resource),
            None => Api::all_with(client.clone(), &resource),
        };
        instance_controller =
            instance_controller.owns_with(owned, resource, watcher_config.clone());
    }

    instance_controller
        .run(reconcile_wrapper, error_policy, context)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}
