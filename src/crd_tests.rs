// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::crd::*;
    use crate::labels::{ERROR_COUNT_LABEL, FINALIZER_SERVICE_INSTANCE, LAST_OPERATION_LABEL};

    fn sample_instance() -> ServiceInstance {
        ServiceInstance::new(
            "instance-1",
            ServiceInstanceSpec {
                service_id: "svc-24731fb8".into(),
                plan_id: "plan-29d7d4c8".into(),
                organization_guid: Some("org-1".into()),
                space_guid: None,
            },
        )
    }

    #[test]
    fn test_instance_state_wire_tokens() {
        assert_eq!(
            serde_json::to_string(&InstanceState::InQueue).unwrap(),
            "\"in_queue\""
        );
        assert_eq!(
            serde_json::to_string(&InstanceState::Update).unwrap(),
            "\"update\""
        );
        assert_eq!(
            serde_json::to_string(&InstanceState::Delete).unwrap(),
            "\"delete\""
        );
        assert_eq!(
            serde_json::to_string(&InstanceState::InProgress).unwrap(),
            "\"in progress\""
        );
        assert_eq!(
            serde_json::to_string(&InstanceState::Succeeded).unwrap(),
            "\"succeeded\""
        );
        assert_eq!(
            serde_json::to_string(&InstanceState::Failed).unwrap(),
            "\"failed\""
        );
    }

    #[test]
    fn test_instance_state_round_trip() {
        for token in [
            "in_queue",
            "update",
            "delete",
            "in progress",
            "succeeded",
            "failed",
        ] {
            let state: InstanceState = token.parse().unwrap();
            assert_eq!(state.as_str(), token);
            assert_eq!(state.to_string(), token);
        }
    }

    #[test]
    fn test_instance_state_parse_rejects_unknown() {
        assert!("provisioning".parse::<InstanceState>().is_err());
        assert!("".parse::<InstanceState>().is_err());
    }

    #[test]
    fn test_instance_state_default_is_in_queue() {
        assert_eq!(InstanceState::default(), InstanceState::InQueue);
    }

    #[test]
    fn test_is_operation_request() {
        assert!(InstanceState::InQueue.is_operation_request());
        assert!(InstanceState::Update.is_operation_request());
        assert!(InstanceState::Delete.is_operation_request());
        assert!(!InstanceState::InProgress.is_operation_request());
        assert!(!InstanceState::Succeeded.is_operation_request());
        assert!(!InstanceState::Failed.is_operation_request());
    }

    #[test]
    fn test_status_default() {
        let status = ServiceInstanceStatus::default();
        assert_eq!(status.state, InstanceState::InQueue);
        assert!(status.error.is_empty());
        assert!(status.description.is_empty());
        assert!(status.dashboard_url.is_none());
        assert!(status.resources.is_empty());
    }

    #[test]
    fn test_status_equality_drives_skip_logic() {
        let a = ServiceInstanceStatus {
            state: InstanceState::Succeeded,
            description: "provisioned".into(),
            ..Default::default()
        };
        let mut b = a.clone();
        assert_eq!(a, b);

        b.dashboard_url = Some("https://dashboard.example.com".into());
        assert_ne!(a, b);
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = ServiceInstanceStatus {
            state: InstanceState::Succeeded,
            dashboard_url: Some("https://dashboard.example.com".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "succeeded");
        assert_eq!(json["dashboardUrl"], "https://dashboard.example.com");
    }

    #[test]
    fn test_resource_reference_display() {
        let reference = ResourceReference {
            api_version: "apps/v1".into(),
            kind: "Deployment".into(),
            name: "instance-1-db".into(),
            namespace: "tenants".into(),
        };
        assert_eq!(reference.to_string(), "apps/v1 Deployment/tenants/instance-1-db");
    }

    #[test]
    fn test_resource_reference_deserializes_camel_case() {
        let reference: ResourceReference = serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "name": "instance-1-config",
            "namespace": "tenants",
        }))
        .unwrap();
        assert_eq!(reference.api_version, "v1");
        assert_eq!(reference.kind, "ConfigMap");
    }

    #[test]
    fn test_state_none_without_status() {
        let instance = sample_instance();
        assert!(instance.status.is_none());
        assert_eq!(instance.state(), None);
    }

    #[test]
    fn test_last_operation_defaults_to_in_queue() {
        let instance = sample_instance();
        assert_eq!(instance.last_operation(), InstanceState::InQueue);
    }

    #[test]
    fn test_last_operation_reads_label() {
        let mut instance = sample_instance();
        instance
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert(LAST_OPERATION_LABEL.into(), "delete".into());
        assert_eq!(instance.last_operation(), InstanceState::Delete);
    }

    #[test]
    fn test_last_operation_unparseable_label_defaults() {
        let mut instance = sample_instance();
        instance
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert(LAST_OPERATION_LABEL.into(), "garbage".into());
        assert_eq!(instance.last_operation(), InstanceState::InQueue);
    }

    #[test]
    fn test_error_count_defaults_to_zero() {
        let instance = sample_instance();
        assert_eq!(instance.error_count(), 0);

        let mut labeled = sample_instance();
        labeled
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert(ERROR_COUNT_LABEL.into(), "not-a-number".into());
        assert_eq!(labeled.error_count(), 0);
    }

    #[test]
    fn test_error_count_reads_label() {
        let mut instance = sample_instance();
        instance
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert(ERROR_COUNT_LABEL.into(), "7".into());
        assert_eq!(instance.error_count(), 7);
    }

    #[test]
    fn test_has_finalizer() {
        let mut instance = sample_instance();
        assert!(!instance.has_finalizer());
        instance
            .metadata
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(FINALIZER_SERVICE_INSTANCE.into());
        assert!(instance.has_finalizer());
    }

    #[test]
    fn test_coordinates_from_instance() {
        let coords = sample_instance().coordinates();
        assert_eq!(coords.instance_id, "instance-1");
        assert!(coords.binding_id.is_empty());
        assert_eq!(coords.service_id, "svc-24731fb8");
        assert_eq!(coords.plan_id, "plan-29d7d4c8");
    }

    #[test]
    fn test_past_error_threshold() {
        let mut instance = sample_instance();
        assert!(!instance.past_error_threshold());
        instance
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert(ERROR_COUNT_LABEL.into(), "10".into());
        assert!(!instance.past_error_threshold());
        instance
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert(ERROR_COUNT_LABEL.into(), "11".into());
        assert!(instance.past_error_threshold());
    }
}
