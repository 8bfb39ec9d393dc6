// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for service instance management.
//!
//! This module defines the [`ServiceInstance`] resource: a declared occurrence
//! of a service offering that the controller converges by creating, patching,
//! and deleting derived sub-resources in a (possibly remote) target cluster.
//!
//! # Lifecycle
//!
//! External actors create the instance and drive its desired state through
//! `status.state` (`in_queue`, `update`, `delete`). The controller answers by
//! moving the instance through `in progress` into `succeeded` or `failed`,
//! recording the operation that is in flight in the
//! `osb.provisor.io/lastoperation` label and the sub-resources it believes
//! live in `status.resources`.
//!
//! # Example: Creating a ServiceInstance
//!
//! ```rust,no_run
//! use provisor::crd::ServiceInstanceSpec;
//!
//! let spec = ServiceInstanceSpec {
//!     service_id: "24731fb8-7b84-4f57-914f-c3d55d793dd4".to_string(),
//!     plan_id: "29d7d4c8-6fe2-4c2a-a5ca-b826937d5a88".to_string(),
//!     organization_guid: None,
//!     space_guid: None,
//! };
//! ```

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::ERROR_THRESHOLD;
use crate::labels::{ERROR_COUNT_LABEL, FINALIZER_SERVICE_INSTANCE, LAST_OPERATION_LABEL};

/// Lifecycle state of a [`ServiceInstance`].
///
/// The request states (`in_queue`, `update`, `delete`) are written by external
/// actors; the controller owns the transitions into `in progress`, `succeeded`
/// and `failed`. Wire tokens match the service-broker convention, including
/// the space in `in progress`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum InstanceState {
    /// Provisioning has been requested but not yet picked up.
    #[default]
    #[serde(rename = "in_queue")]
    InQueue,

    /// An update to an already provisioned instance has been requested.
    #[serde(rename = "update")]
    Update,

    /// Deprovisioning has been requested.
    #[serde(rename = "delete")]
    Delete,

    /// An operation is running; `lastoperation` records which one.
    #[serde(rename = "in progress")]
    InProgress,

    /// The last operation completed successfully.
    #[serde(rename = "succeeded")]
    Succeeded,

    /// The last operation failed terminally; no further retries are scheduled.
    #[serde(rename = "failed")]
    Failed,
}

impl InstanceState {
    /// Whether this state is an externally requested operation
    /// (`in_queue`, `update` or `delete`).
    #[must_use]
    pub fn is_operation_request(self) -> bool {
        matches!(
            self,
            InstanceState::InQueue | InstanceState::Update | InstanceState::Delete
        )
    }

    /// The wire token for this state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InstanceState::InQueue => "in_queue",
            InstanceState::Update => "update",
            InstanceState::Delete => "delete",
            InstanceState::InProgress => "in progress",
            InstanceState::Succeeded => "succeeded",
            InstanceState::Failed => "failed",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_queue" => Ok(InstanceState::InQueue),
            "update" => Ok(InstanceState::Update),
            "delete" => Ok(InstanceState::Delete),
            "in progress" => Ok(InstanceState::InProgress),
            "succeeded" => Ok(InstanceState::Succeeded),
            "failed" => Ok(InstanceState::Failed),
            other => Err(format!("unknown instance state: {other}")),
        }
    }
}

/// Logical reference to a sub-resource created for an instance.
///
/// Sub-resources may live in a different cluster than the instance, so
/// ownership is tracked as this tuple plus explicit existence checks rather
/// than relying on native garbage collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReference {
    /// API group/version of the referenced object (e.g. `apps/v1`)
    pub api_version: String,

    /// Kind of the referenced object (e.g. `Deployment`)
    pub kind: String,

    /// Name of the referenced object
    pub name: String,

    /// Namespace of the referenced object in the target cluster
    #[serde(default)]
    pub namespace: String,
}

impl fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{}/{}",
            self.api_version, self.kind, self.namespace, self.name
        )
    }
}

/// Identifying coordinates handed to collaborators when resolving clusters
/// and computing sub-resources for an instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceCoordinates {
    /// Instance identifier (the object name)
    pub instance_id: String,
    /// Binding identifier; empty for instance-level reconciliation
    pub binding_id: String,
    /// Service offering identifier from the spec
    pub service_id: String,
    /// Service plan identifier from the spec
    pub plan_id: String,
}

/// `ServiceInstance` declares one provisioned occurrence of a service plan.
///
/// The controller watches these objects and converges each one by rendering
/// the plan's sub-resources into the resolved target cluster. The spec is
/// immutable from the controller's viewpoint; all controller-owned state
/// lives in the status, the operation labels and the finalizer.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "osb.provisor.io",
    version = "v1alpha1",
    kind = "ServiceInstance",
    namespaced,
    doc = "ServiceInstance represents a provisioned occurrence of a service plan. The controller creates the plan's sub-resources in the resolved target cluster, tracks them in status.resources, and reports provisioning progress through status.state."
)]
#[kube(status = "ServiceInstanceStatus")]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstanceSpec {
    /// Identifier of the service offering this instance belongs to.
    pub service_id: String,

    /// Identifier of the plan whose manifests realize this instance.
    pub plan_id: String,

    /// Organization the instance was requested for (broker bookkeeping,
    /// ignored by the controller).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_guid: Option<String>,

    /// Space the instance was requested for (broker bookkeeping,
    /// ignored by the controller).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_guid: Option<String>,
}

/// `ServiceInstance` status.
///
/// Compared field-wise before every write so unchanged passes never touch
/// the API server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstanceStatus {
    /// Current lifecycle state (see [`InstanceState`]).
    #[serde(default)]
    pub state: InstanceState,

    /// Error text from the last failed operation, empty when healthy.
    #[serde(default)]
    pub error: String,

    /// Human-readable summary of the last operation outcome.
    #[serde(default)]
    pub description: String,

    /// Dashboard URL reported by the provision aggregate, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<String>,

    /// Sub-resources believed live in the target cluster. Entries are
    /// dropped once an existence check confirms they are gone.
    #[serde(default)]
    pub resources: Vec<ResourceReference>,
}

impl Default for ServiceInstanceStatus {
    fn default() -> Self {
        ServiceInstanceStatus {
            state: InstanceState::InQueue,
            error: String::new(),
            description: String::new(),
            dashboard_url: None,
            resources: Vec::new(),
        }
    }
}

impl ServiceInstance {
    /// Current state, or `None` when no status has been written yet.
    ///
    /// A freshly created instance with no status is inert: no state-machine
    /// branch matches until an external actor writes a request state.
    #[must_use]
    pub fn state(&self) -> Option<InstanceState> {
        self.status.as_ref().map(|s| s.state)
    }

    /// Operation recorded by the `lastoperation` label, defaulting to
    /// `in_queue` when the label is missing or unparseable.
    #[must_use]
    pub fn last_operation(&self) -> InstanceState {
        self.labels()
            .get(LAST_OPERATION_LABEL)
            .and_then(|v| v.parse().ok())
            .unwrap_or(InstanceState::InQueue)
    }

    /// Consecutive-failure counter from the error-count label, defaulting to
    /// zero when missing or unparseable.
    #[must_use]
    pub fn error_count(&self) -> i64 {
        self.labels()
            .get(ERROR_COUNT_LABEL)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Whether the controller's finalizer marker is present.
    #[must_use]
    pub fn has_finalizer(&self) -> bool {
        self.finalizers()
            .iter()
            .any(|f| f == FINALIZER_SERVICE_INSTANCE)
    }

    /// Whether an external actor has requested deletion.
    #[must_use]
    pub fn deletion_requested(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Whether the failure counter already sits past the terminal threshold.
    #[must_use]
    pub fn past_error_threshold(&self) -> bool {
        self.error_count() > ERROR_THRESHOLD
    }

    /// Coordinates handed to the cluster resolver and resource manager.
    #[must_use]
    pub fn coordinates(&self) -> InstanceCoordinates {
        InstanceCoordinates {
            instance_id: self.name_any(),
            binding_id: String::new(),
            service_id: self.spec.service_id.clone(),
            plan_id: self.spec.plan_id.clone(),
        }
    }
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
