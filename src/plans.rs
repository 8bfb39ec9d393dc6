// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Plan-backed [`ResourceManager`] implementation.
//!
//! Plans are pre-rendered manifest bundles: a `ConfigMap` named
//! `plan-<planId>` in the instance's namespace whose every data value is one
//! YAML sub-resource manifest. Realizing an instance means parsing each
//! manifest into a [`DynamicObject`], naming it `<instance>-<key>`, and
//! server-side applying it to the resolved target cluster. No template
//! language is evaluated.
//!
//! Cleanup never relies on owner references or garbage collection: the
//! target cluster may not be the cluster the instance lives in, so deletion
//! is driven by explicit delete calls and existence checks against the
//! references recorded in the instance status.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{DeleteParams, DynamicObject, Patch, PatchParams};
use kube::{Api, Client, Resource, ResourceExt};
use tracing::{debug, info, warn};

use crate::constants::FIELD_MANAGER;
use crate::crd::{InstanceCoordinates, InstanceState, ResourceReference, ServiceInstance};
use crate::error::{is_not_found, Error, Result};
use crate::labels::{
    INSTANCE_LABEL, K8S_INSTANCE, K8S_MANAGED_BY, K8S_PART_OF, MANAGED_BY_SERVICE_INSTANCE,
    PART_OF_PROVISOR,
};
use crate::manager::{
    ComputedStatus, DeprovisionStatus, ProvisionStatus, ResourceAction, ResourceManager,
};
use crate::subresources::{dynamic_api, remaining_references};

/// Name of the plan `ConfigMap` holding the manifests for a plan.
#[must_use]
pub fn plan_config_map_name(plan_id: &str) -> String {
    format!("plan-{plan_id}")
}

/// Resource manager that realizes instances from plan `ConfigMap`s.
///
/// The manager is stateless; everything it needs lives in the source and
/// target clusters it is handed on each call.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlanResourceManager;

impl PlanResourceManager {
    #[must_use]
    pub fn new() -> Self {
        PlanResourceManager
    }
}

/// Parse one plan manifest into a dynamically-typed object.
fn parse_manifest(plan_id: &str, key: &str, manifest: &str) -> Result<DynamicObject> {
    let object: DynamicObject =
        serde_yaml::from_str(manifest).map_err(|source| Error::ManifestParse {
            key: key.to_string(),
            plan_id: plan_id.to_string(),
            source,
        })?;
    if object.types.is_none() {
        return Err(Error::ManifestParse {
            key: key.to_string(),
            plan_id: plan_id.to_string(),
            source: serde::de::Error::custom("manifest has no apiVersion or kind"),
        });
    }
    Ok(object)
}

/// Build the status reference for a rendered object.
fn object_reference(object: &DynamicObject) -> Result<ResourceReference> {
    let types = object.types.as_ref().ok_or_else(|| {
        Error::Other(anyhow::anyhow!(
            "sub-resource object {} has no apiVersion or kind",
            object.name_any()
        ))
    })?;
    Ok(ResourceReference {
        api_version: types.api_version.clone(),
        kind: types.kind.clone(),
        name: object.name_any(),
        namespace: object.namespace().unwrap_or_default(),
    })
}

#[async_trait]
impl ResourceManager for PlanResourceManager {
    async fn compute_expected_resources(
        &self,
        source: &Client,
        coordinates: &InstanceCoordinates,
        action: ResourceAction,
        namespace: &str,
    ) -> Result<Vec<DynamicObject>> {
        // Nothing is expected to exist after a deprovision.
        if action == ResourceAction::Deprovision {
            return Ok(Vec::new());
        }

        let plan_name = plan_config_map_name(&coordinates.plan_id);
        let api: Api<ConfigMap> = Api::namespaced(source.clone(), namespace);
        let plan = api
            .get_opt(&plan_name)
            .await?
            .ok_or_else(|| Error::PlanNotFound {
                plan_id: coordinates.plan_id.clone(),
                namespace: namespace.to_string(),
            })?;

        let mut expected = Vec::new();
        for (key, manifest) in plan.data.unwrap_or_default() {
            let mut object = parse_manifest(&coordinates.plan_id, &key, &manifest)?;
            object.metadata.name = Some(format!("{}-{}", coordinates.instance_id, key));
            object.metadata.namespace = Some(namespace.to_string());
            expected.push(object);
        }

        debug!(
            instance = %coordinates.instance_id,
            plan = %coordinates.plan_id,
            resources = expected.len(),
            "Rendered expected sub-resources from plan"
        );
        Ok(expected)
    }

    fn set_owner_reference(
        &self,
        owner: &ServiceInstance,
        resources: &mut [DynamicObject],
    ) -> Result<()> {
        let name = owner
            .metadata
            .name
            .clone()
            .ok_or_else(|| Error::Other(anyhow::anyhow!("owner instance has no name")))?;
        let uid = owner
            .metadata
            .uid
            .clone()
            .ok_or_else(|| Error::Other(anyhow::anyhow!("owner instance {name} has no uid")))?;

        let owner_ref = OwnerReference {
            api_version: ServiceInstance::api_version(&()).to_string(),
            kind: ServiceInstance::kind(&()).to_string(),
            name: name.clone(),
            uid,
            controller: Some(true),
            block_owner_deletion: Some(true),
        };

        for resource in resources.iter_mut() {
            resource.owner_references_mut().push(owner_ref.clone());
            let labels = resource.labels_mut();
            labels.insert(INSTANCE_LABEL.to_string(), name.clone());
            labels.insert(K8S_INSTANCE.to_string(), name.clone());
            labels.insert(
                K8S_MANAGED_BY.to_string(),
                MANAGED_BY_SERVICE_INSTANCE.to_string(),
            );
            labels.insert(K8S_PART_OF.to_string(), PART_OF_PROVISOR.to_string());
        }
        Ok(())
    }

    async fn reconcile_resources(
        &self,
        _source: &Client,
        target: &Client,
        expected: Vec<DynamicObject>,
        last_known: &[ResourceReference],
    ) -> Result<Vec<ResourceReference>> {
        let params = PatchParams::apply(FIELD_MANAGER).force();
        let mut references = Vec::with_capacity(expected.len());

        for object in &expected {
            let reference = object_reference(object)?;
            let api = dynamic_api(target.clone(), &reference);
            api.patch(&reference.name, &params, &Patch::Apply(object))
                .await?;
            crate::metrics::record_sub_resource_applied(&reference.kind);
            debug!(resource = %reference, "Applied sub-resource");
            references.push(reference);
        }

        // Recorded resources the plan no longer renders are pruned here, not
        // left for garbage collection.
        for stale in last_known.iter().filter(|r| !references.contains(r)) {
            let api = dynamic_api(target.clone(), stale);
            match api.delete(&stale.name, &DeleteParams::default()).await {
                Ok(_) => {
                    crate::metrics::record_sub_resource_deleted(&stale.kind);
                    info!(resource = %stale, "Deleted sub-resource no longer expected");
                }
                Err(err) if is_not_found(&err) => {
                    debug!(resource = %stale, "Stale sub-resource already gone");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(references)
    }

    async fn delete_sub_resources(
        &self,
        target: &Client,
        resources: &[ResourceReference],
    ) -> Result<Vec<ResourceReference>> {
        let mut remaining = Vec::new();
        let mut last_error = None;

        for reference in resources {
            let api = dynamic_api(target.clone(), reference);
            match api.delete(&reference.name, &DeleteParams::default()).await {
                // A resource stays in the remainder until a later pass sees
                // a definite 404; an accepted delete may still be finalizing.
                Ok(_) => {
                    crate::metrics::record_sub_resource_deleted(&reference.kind);
                    info!(resource = %reference, "Requested sub-resource deletion");
                    remaining.push(reference.clone());
                }
                Err(err) if is_not_found(&err) => {
                    debug!(resource = %reference, "Sub-resource already gone");
                }
                Err(err) => {
                    warn!(resource = %reference, error = %err, "Failed to delete sub-resource");
                    remaining.push(reference.clone());
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) => Err(err.into()),
            None => Ok(remaining),
        }
    }

    async fn compute_status(
        &self,
        source: &Client,
        target: &Client,
        coordinates: &InstanceCoordinates,
        action: ResourceAction,
        namespace: &str,
    ) -> Result<ComputedStatus> {
        let api: Api<ServiceInstance> = Api::namespaced(source.clone(), namespace);
        let recorded = api
            .get_opt(&coordinates.instance_id)
            .await?
            .and_then(|instance| instance.status)
            .map(|status| status.resources)
            .unwrap_or_default();

        let remaining = remaining_references(target, &recorded).await;
        debug!(
            instance = %coordinates.instance_id,
            action = %action,
            recorded = recorded.len(),
            remaining = remaining.len(),
            "Existence-checked recorded sub-resources"
        );

        let provision = if remaining.len() == recorded.len() {
            ProvisionStatus {
                state: InstanceState::Succeeded,
                error: String::new(),
                response: format!("{} sub-resources up to date", recorded.len()),
                dashboard_url: None,
            }
        } else {
            ProvisionStatus {
                state: InstanceState::InProgress,
                error: String::new(),
                response: format!(
                    "{} of {} sub-resources exist",
                    remaining.len(),
                    recorded.len()
                ),
                dashboard_url: None,
            }
        };

        let deprovision = if remaining.is_empty() {
            DeprovisionStatus {
                state: InstanceState::Succeeded,
                error: String::new(),
                response: "all sub-resources removed".to_string(),
            }
        } else {
            DeprovisionStatus {
                state: InstanceState::InProgress,
                error: String::new(),
                response: format!("{} sub-resources still present", remaining.len()),
            }
        };

        Ok(ComputedStatus {
            provision,
            deprovision,
        })
    }
}

#[cfg(test)]
#[path = "plans_tests.rs"]
mod plans_tests;
