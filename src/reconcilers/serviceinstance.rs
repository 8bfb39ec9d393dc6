// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation state machine for `ServiceInstance` resources.
//!
//! One pass moves an instance a single step towards its requested state and
//! relies on requeues and watch events for the next step. The phases are:
//!
//! 1. finalizer attachment (skipped once deletion has been requested)
//! 2. the request branch: `delete` tears sub-resources down, `in_queue` and
//!    `update` converge them; both end by marking the instance `in progress`
//!    and stamping the `lastoperation` label
//! 3. the status branch: an `in progress` instance gets the half of the
//!    computed aggregate matching its recorded operation copied onto its
//!    status; the deprovision copy also retires the finalizer when teardown
//!    is complete
//! 4. failure bookkeeping via [`conclude_pass`], which turns the pass
//!    outcome into the error-count label and decides terminal abandonment
//!
//! Every branch funnels through [`conclude_pass`] so consecutive failures
//! are counted no matter where they happen, and a pass over a settled
//! instance makes no writes at all.

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use tracing::{debug, error, info};

use crate::constants::{FINALIZER_REQUEUE_SECS, IN_PROGRESS_REQUEUE_SECS};
use crate::context::Context;
use crate::crd::{InstanceState, ServiceInstance};
use crate::error::Result;
use crate::manager::ResourceAction;
use crate::reconcilers::failures::conclude_pass;
use crate::reconcilers::finalizers::ensure_finalizer;
use crate::reconcilers::status::{
    apply_deprovision_status, apply_provision_status, set_in_progress,
};

/// Run one reconciliation pass over a `ServiceInstance`.
///
/// Returns the action the controller should schedule next: a 30 second
/// requeue while the instance is still `in progress` (sub-resources in a
/// remote cluster produce no local watch events), a short requeue when the
/// finalizer could not be attached, and `await_change` otherwise.
///
/// # Errors
///
/// Returns the pass's error after it has been recorded in the error-count
/// label; the controller's error policy schedules the retry. The failure
/// that crosses the error threshold is swallowed instead: the instance is
/// marked `failed` and the pass ends cleanly so it is not requeued.
pub async fn reconcile_service_instance(
    instance: Arc<ServiceInstance>,
    ctx: Arc<Context>,
) -> Result<Action> {
    let namespace = instance.namespace().unwrap_or_default();
    let name = instance.name_any();
    let api: Api<ServiceInstance> = Api::namespaced(ctx.client.clone(), &namespace);

    info!("Reconciling ServiceInstance: {namespace}/{name}");

    // The watch event may be stale; work from a fresh copy.
    let current = match api.get_opt(&name).await {
        Ok(Some(current)) => current,
        Ok(None) => {
            debug!(instance = %name, "Instance already deleted, nothing to reconcile");
            return Ok(Action::await_change());
        }
        Err(err) => return conclude_pass(&api, &name, Err(err.into()), None).await,
    };

    // Attach the finalizer before anything can be provisioned. A failure
    // here is retried on a short fuse instead of counted: no sub-resource
    // exists yet that could leak.
    if ensure_finalizer(&api, &name).await.is_err() {
        let requeue = Action::requeue(Duration::from_secs(FINALIZER_REQUEUE_SECS));
        return conclude_pass(&api, &name, Ok(requeue), None).await;
    }

    let coordinates = current.coordinates();
    let target = match ctx.resolver.get_cluster(&coordinates).await {
        Ok(target) => target,
        Err(err) => {
            error!(instance = %name, error = %err, "Failed to resolve target cluster");
            return conclude_pass(&api, &name, Err(err), None).await;
        }
    };

    match current.state() {
        // Teardown requires both the request state and the deletion
        // timestamp; a `delete` state alone waits for the actual delete.
        Some(InstanceState::Delete) if current.deletion_requested() => {
            let recorded = current
                .status
                .as_ref()
                .map(|s| s.resources.clone())
                .unwrap_or_default();
            let remaining = match ctx.manager.delete_sub_resources(&target, &recorded).await {
                Ok(remaining) => remaining,
                Err(err) => {
                    error!(instance = %name, error = %err, "Failed to delete sub-resources");
                    return conclude_pass(&api, &name, Err(err), Some(InstanceState::Delete))
                        .await;
                }
            };
            if let Err(err) =
                set_in_progress(&api, &name, InstanceState::Delete, remaining).await
            {
                return conclude_pass(&api, &name, Err(err), Some(InstanceState::Delete)).await;
            }
        }
        Some(operation @ (InstanceState::InQueue | InstanceState::Update)) => {
            let mut expected = match ctx
                .manager
                .compute_expected_resources(
                    &ctx.client,
                    &coordinates,
                    ResourceAction::Provision,
                    &namespace,
                )
                .await
            {
                Ok(expected) => expected,
                Err(err) => {
                    error!(instance = %name, error = %err, "Failed to compute expected sub-resources");
                    return conclude_pass(&api, &name, Err(err), Some(operation)).await;
                }
            };
            if let Err(err) = ctx.manager.set_owner_reference(&current, &mut expected) {
                return conclude_pass(&api, &name, Err(err), Some(operation)).await;
            }
            let recorded = current
                .status
                .as_ref()
                .map(|s| s.resources.clone())
                .unwrap_or_default();
            let references = match ctx
                .manager
                .reconcile_resources(&ctx.client, &target, expected, &recorded)
                .await
            {
                Ok(references) => references,
                Err(err) => {
                    error!(instance = %name, error = %err, "Failed to reconcile sub-resources");
                    return conclude_pass(&api, &name, Err(err), Some(operation)).await;
                }
            };
            if let Err(err) = set_in_progress(&api, &name, operation, references).await {
                return conclude_pass(&api, &name, Err(err), Some(operation)).await;
            }
        }
        _ => {}
    }

    // The request branch rewrites state and labels; re-fetch before the
    // status branch so it sees what was persisted.
    let refreshed = match api.get_opt(&name).await {
        Ok(Some(refreshed)) => refreshed,
        Ok(None) => {
            debug!(instance = %name, "Instance deleted during reconciliation");
            return Ok(Action::await_change());
        }
        Err(err) => return conclude_pass(&api, &name, Err(err.into()), None).await,
    };
    let last_operation = refreshed.last_operation();
    let mut state = refreshed.state();

    // A crash between the terminal deprovision status write and the
    // finalizer edit leaves the instance `succeeded` with the finalizer
    // still attached; re-run the deprovision writer to retire it.
    let finalizer_pending = state == Some(InstanceState::Succeeded)
        && last_operation == InstanceState::Delete
        && refreshed.deletion_requested()
        && refreshed.has_finalizer();

    if state == Some(InstanceState::InProgress) || finalizer_pending {
        match last_operation {
            InstanceState::Delete => {
                match apply_deprovision_status(
                    &api,
                    &ctx.client,
                    &target,
                    ctx.manager.as_ref(),
                    &refreshed,
                )
                .await
                {
                    Ok(settled) => state = Some(settled),
                    Err(err) => {
                        return conclude_pass(&api, &name, Err(err), Some(InstanceState::Delete))
                            .await;
                    }
                }
            }
            InstanceState::InQueue | InstanceState::Update => {
                match apply_provision_status(
                    &api,
                    &ctx.client,
                    &target,
                    ctx.manager.as_ref(),
                    &refreshed,
                )
                .await
                {
                    Ok(settled) => state = Some(settled),
                    Err(err) => {
                        return conclude_pass(&api, &name, Err(err), Some(last_operation)).await;
                    }
                }
            }
            _ => {}
        }
    }

    // Clean pass: reset the failure counter and schedule the next look.
    let action = if state == Some(InstanceState::InProgress) {
        Action::requeue(Duration::from_secs(IN_PROGRESS_REQUEUE_SECS))
    } else {
        Action::await_change()
    };
    info!(
        instance = %name,
        state = state.map(|s| s.as_str()).unwrap_or("none"),
        "Reconciled ServiceInstance: {namespace}/{name}"
    );
    conclude_pass(&api, &name, Ok(action), Some(last_operation)).await
}

#[cfg(test)]
#[path = "serviceinstance_tests.rs"]
mod serviceinstance_tests;
