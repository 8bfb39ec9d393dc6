// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Contract between the reconciler and the sub-resource backend.
//!
//! The reconciler never renders manifests or inspects sub-resource health
//! itself. It drives a [`ResourceManager`]: an implementation that knows how
//! to compute the expected sub-resources for an instance, converge the
//! target cluster towards them, and distill the live state back into an
//! aggregate the status writer can copy from. The shipped implementation is
//! [`crate::plans::PlanResourceManager`]; tests substitute their own.
//!
//! Source and target clients are passed separately because the instance and
//! its sub-resources may live in different clusters.

use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::Client;

use crate::crd::{InstanceCoordinates, InstanceState, ResourceReference, ServiceInstance};
use crate::error::Result;

/// The operation a computation is performed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceAction {
    /// Creating or updating the instance's sub-resources
    Provision,
    /// Tearing the instance's sub-resources down
    Deprovision,
}

impl ResourceAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceAction::Provision => "provision",
            ResourceAction::Deprovision => "deprovision",
        }
    }
}

impl std::fmt::Display for ResourceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated view of an in-flight or finished provision operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProvisionStatus {
    /// State the instance should report (`in progress`, `succeeded`, `failed`)
    pub state: InstanceState,
    /// Error detail, empty when none
    pub error: String,
    /// Human-readable outcome, copied into `status.description`
    pub response: String,
    /// Dashboard URL surfaced by the provisioned service, if any
    pub dashboard_url: Option<String>,
}

/// Aggregated view of an in-flight or finished deprovision operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeprovisionStatus {
    /// State the instance should report (`in progress`, `succeeded`, `failed`)
    pub state: InstanceState,
    /// Error detail, empty when none
    pub error: String,
    /// Human-readable outcome, copied into `status.description`
    pub response: String,
}

/// Full status aggregate returned by [`ResourceManager::compute_status`].
///
/// Both halves are always populated; the caller picks the half matching the
/// operation recorded in the instance's `lastoperation` label.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComputedStatus {
    pub provision: ProvisionStatus,
    pub deprovision: DeprovisionStatus,
}

/// Backend that renders, converges and observes an instance's sub-resources.
///
/// Implementations must be idempotent: computing or reconciling the same
/// instance twice in a row without external changes must produce the same
/// result and no spurious writes.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// Render the sub-resources the instance should currently have.
    ///
    /// Reads plan content from the source cluster; returns bare manifests
    /// that have not yet been decorated with ownership metadata.
    ///
    /// # Errors
    ///
    /// Fails when the plan cannot be found or a manifest does not parse.
    async fn compute_expected_resources(
        &self,
        source: &Client,
        coordinates: &InstanceCoordinates,
        action: ResourceAction,
        namespace: &str,
    ) -> Result<Vec<DynamicObject>>;

    /// Mark each expected resource as owned by the instance.
    ///
    /// Ownership is advisory: sub-resources may live in another cluster
    /// where the owner object does not exist, so deletion is always driven
    /// by [`Self::delete_sub_resources`] rather than garbage collection.
    ///
    /// # Errors
    ///
    /// Fails when the owner is missing identity metadata.
    fn set_owner_reference(
        &self,
        owner: &ServiceInstance,
        resources: &mut [DynamicObject],
    ) -> Result<()>;

    /// Converge the target cluster towards the expected resources.
    ///
    /// Returns references for exactly the resources that are now expected
    /// to exist; entries from `last_known` that are no longer expected are
    /// cleaned up by the implementation.
    ///
    /// # Errors
    ///
    /// Fails when any apply or cleanup call fails. Partial progress is
    /// acceptable; the next pass continues from the cluster's real state.
    async fn reconcile_resources(
        &self,
        source: &Client,
        target: &Client,
        expected: Vec<DynamicObject>,
        last_known: &[ResourceReference],
    ) -> Result<Vec<ResourceReference>>;

    /// Delete the given sub-resources from the target cluster.
    ///
    /// Returns the references that could not yet be confirmed gone. Already
    /// missing resources are treated as deleted.
    ///
    /// # Errors
    ///
    /// Fails when a deletion call fails for a reason other than the
    /// resource already being gone.
    async fn delete_sub_resources(
        &self,
        target: &Client,
        resources: &[ResourceReference],
    ) -> Result<Vec<ResourceReference>>;

    /// Distill the live state of the instance's sub-resources into a status
    /// aggregate.
    ///
    /// # Errors
    ///
    /// Fails when the target cluster cannot be queried.
    async fn compute_status(
        &self,
        source: &Client,
        target: &Client,
        coordinates: &InstanceCoordinates,
        action: ResourceAction,
        namespace: &str,
    ) -> Result<ComputedStatus>;
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod manager_tests;
