// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management for `ServiceInstance` resources.
//!
//! The finalizer blocks Kubernetes from deleting an instance while its
//! sub-resources may still exist in the target cluster. Attachment goes
//! through the bounded mutation retry so a conflicting writer never leaves
//! an instance unprotected; removal is an in-memory edit persisted by the
//! deprovision status writer together with the final status, so the
//! instance never loses its finalizer before its terminal state is
//! recorded.

use kube::api::PostParams;
use kube::{Api, ResourceExt};
use tracing::{debug, info};

use crate::crd::ServiceInstance;
use crate::error::Result;
use crate::labels::FINALIZER_SERVICE_INSTANCE;
use crate::reconcilers::retry::retry_mutation;

/// Attach the instance finalizer if it is not already present.
///
/// Each attempt re-fetches the instance, so a conflicting write from
/// another client is absorbed by the retry rather than surfaced. The
/// operation is idempotent and deliberately does nothing once deletion has
/// been requested: attaching a finalizer to a dying object would only
/// prolong its teardown.
///
/// # Arguments
///
/// * `api` - API scoped to the instance's namespace
/// * `name` - Name of the instance
///
/// # Errors
///
/// Returns an error when the write keeps failing past the retry budget.
pub async fn ensure_finalizer(api: &Api<ServiceInstance>, name: &str) -> Result<()> {
    retry_mutation(
        || async {
            let Some(mut latest) = api.get_opt(name).await? else {
                debug!(
                    instance = name,
                    "Instance gone before finalizer could be attached"
                );
                return Ok(());
            };

            if latest.deletion_requested() || latest.has_finalizer() {
                return Ok(());
            }

            latest
                .finalizers_mut()
                .push(FINALIZER_SERVICE_INSTANCE.to_string());
            api.replace(name, &PostParams::default(), &latest).await?;

            info!(
                instance = name,
                finalizer = FINALIZER_SERVICE_INSTANCE,
                "Added finalizer"
            );
            Ok(())
        },
        "ensure finalizer",
    )
    .await
}

/// Remove the instance finalizer from an in-memory copy.
///
/// Returns whether the finalizer was present. The caller persists the edit;
/// the deprovision writer does so in the same pass that records the final
/// `succeeded` state, so the API server can only ever observe "finalizer
/// gone" together with "teardown finished".
pub fn strip_finalizer(instance: &mut ServiceInstance) -> bool {
    let finalizers = instance.finalizers_mut();
    let before = finalizers.len();
    finalizers.retain(|f| f != FINALIZER_SERVICE_INSTANCE);
    finalizers.len() != before
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
