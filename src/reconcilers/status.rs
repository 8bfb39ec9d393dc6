// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status writers for `ServiceInstance` resources.
//!
//! All persisted engine state flows through this module: the `in progress`
//! transition, the provision status copy, and the deprovision status copy
//! that also retires the finalizer. Every writer re-fetches the instance
//! inside the bounded mutation retry and compares the rebuilt status against
//! the stored one before writing, so an unchanged pass never touches the API
//! server.
//!
//! # Write protocol
//!
//! The status subresource splits one logical update into a status `PUT` and
//! a metadata `PUT`. Order is chosen so that a crash between the two leaves
//! the instance recoverable:
//!
//! - `set_in_progress` writes the `lastoperation` label first; if the status
//!   write never lands, the instance still holds its request state and the
//!   next pass redoes the whole branch.
//! - the deprovision writer persists the terminal status first and removes
//!   the finalizer second, so deletion can only complete after the final
//!   state is observable.

use kube::api::PostParams;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info};

use crate::crd::{InstanceState, ResourceReference, ServiceInstance};
use crate::error::Result;
use crate::labels::LAST_OPERATION_LABEL;
use crate::manager::{ResourceAction, ResourceManager};
use crate::reconcilers::finalizers::strip_finalizer;
use crate::reconcilers::retry::retry_mutation;
use crate::subresources::remaining_references;

/// Replace the instance's status subresource, returning the stored object
/// with its bumped `resourceVersion`.
pub(crate) async fn put_status(
    api: &Api<ServiceInstance>,
    instance: &ServiceInstance,
) -> Result<ServiceInstance> {
    let updated = api
        .replace_status(&instance.name_any(), &PostParams::default(), instance)
        .await?;
    Ok(updated)
}

/// Replace the instance's main resource (metadata and spec; the status
/// subtree is owned by the status endpoint).
pub(crate) async fn put_instance(
    api: &Api<ServiceInstance>,
    instance: &ServiceInstance,
) -> Result<ServiceInstance> {
    let updated = api
        .replace(&instance.name_any(), &PostParams::default(), instance)
        .await?;
    Ok(updated)
}

/// Move the instance into `in progress`, recording the operation that
/// caused it and the sub-resources the pass now believes live.
///
/// Does nothing unless `operation` is an externally requested state; the
/// controller-owned states never re-enter `in progress`.
///
/// # Errors
///
/// Returns an error when the writes keep failing past the retry budget.
pub async fn set_in_progress(
    api: &Api<ServiceInstance>,
    name: &str,
    operation: InstanceState,
    resources: Vec<ResourceReference>,
) -> Result<()> {
    if !operation.is_operation_request() {
        return Ok(());
    }

    retry_mutation(
        || async {
            let Some(mut latest) = api.get_opt(name).await? else {
                debug!(
                    instance = name,
                    "Instance gone before it could be marked in progress"
                );
                return Ok(());
            };

            latest
                .labels_mut()
                .insert(LAST_OPERATION_LABEL.to_string(), operation.to_string());
            let mut updated = put_instance(api, &latest).await?;

            let mut status = updated.status.take().unwrap_or_default();
            status.state = InstanceState::InProgress;
            status.resources = resources.clone();
            updated.status = Some(status);
            put_status(api, &updated).await?;
            Ok(())
        },
        "set in progress",
    )
    .await?;

    info!(instance = name, operation = %operation, "Updated status to in progress");
    Ok(())
}

/// Copy the provision half of the computed aggregate onto the instance
/// status, returning the state the instance is left in.
///
/// The write is skipped when the rebuilt status equals the stored one, so
/// repeated passes over a settled instance stay read-only.
///
/// # Errors
///
/// Returns an error when the aggregate cannot be computed or the write
/// keeps failing past the retry budget.
pub async fn apply_provision_status(
    api: &Api<ServiceInstance>,
    source: &Client,
    target: &Client,
    manager: &dyn ResourceManager,
    instance: &ServiceInstance,
) -> Result<InstanceState> {
    let namespace = instance.namespace().unwrap_or_default();
    let name = instance.name_any();
    let computed = manager
        .compute_status(
            source,
            target,
            &instance.coordinates(),
            ResourceAction::Provision,
            &namespace,
        )
        .await?;

    retry_mutation(
        || async {
            let Some(mut latest) = api.get_opt(&name).await? else {
                debug!(
                    instance = %name,
                    "Instance gone before provision status could be written"
                );
                return Ok(InstanceState::Succeeded);
            };

            let mut next = latest.status.clone().unwrap_or_default();
            next.state = computed.provision.state;
            next.error = computed.provision.error.clone();
            next.description = computed.provision.response.clone();
            next.dashboard_url = computed.provision.dashboard_url.clone();

            if latest.status.as_ref() == Some(&next) {
                debug!(instance = %name, "Provision status unchanged, skipping update");
                return Ok(next.state);
            }

            info!(instance = %name, state = %next.state, "Updating provision status");
            let state = next.state;
            latest.status = Some(next);
            put_status(api, &latest).await?;
            Ok(state)
        },
        "update provision status",
    )
    .await
}

/// Copy the deprovision half of the computed aggregate onto the instance
/// status, re-verify the recorded sub-resources, and retire the finalizer
/// once teardown is complete.
///
/// The finalizer is removed (and the state forced to `succeeded`) when the
/// aggregate reports success or when no recorded sub-resource still exists.
///
/// # Errors
///
/// Returns an error when the aggregate cannot be computed or the writes
/// keep failing past the retry budget.
pub async fn apply_deprovision_status(
    api: &Api<ServiceInstance>,
    source: &Client,
    target: &Client,
    manager: &dyn ResourceManager,
    instance: &ServiceInstance,
) -> Result<InstanceState> {
    let namespace = instance.namespace().unwrap_or_default();
    let name = instance.name_any();
    let computed = manager
        .compute_status(
            source,
            target,
            &instance.coordinates(),
            ResourceAction::Deprovision,
            &namespace,
        )
        .await?;

    retry_mutation(
        || async {
            let Some(mut latest) = api.get_opt(&name).await? else {
                debug!(
                    instance = %name,
                    "Instance gone before deprovision status could be written"
                );
                return Ok(InstanceState::Succeeded);
            };

            // Only references that can no longer be found in the target
            // cluster are dropped from the recorded set.
            let recorded = latest
                .status
                .as_ref()
                .map(|s| s.resources.clone())
                .unwrap_or_default();
            let remaining = remaining_references(target, &recorded).await;

            let mut next = latest.status.clone().unwrap_or_default();
            next.state = computed.deprovision.state;
            next.error = computed.deprovision.error.clone();
            next.description = computed.deprovision.response.clone();
            next.resources = remaining;

            let mut changed = latest.status.as_ref() != Some(&next);
            let finished = next.state == InstanceState::Succeeded || next.resources.is_empty();
            if finished {
                next.state = InstanceState::Succeeded;
                changed = true;
            }

            let state = next.state;
            if changed {
                info!(
                    instance = %name,
                    state = %state,
                    remaining = next.resources.len(),
                    "Updating deprovision status"
                );
                latest.status = Some(next);
                let mut updated = put_status(api, &latest).await?;
                if finished && strip_finalizer(&mut updated) {
                    put_instance(api, &updated).await?;
                    info!(instance = %name, "Removed finalizer");
                }
            }
            Ok(state)
        },
        "update deprovision status",
    )
    .await
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
