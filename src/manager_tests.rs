// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::crd::InstanceState;
    use crate::manager::*;

    #[test]
    fn test_resource_action_display() {
        assert_eq!(ResourceAction::Provision.to_string(), "provision");
        assert_eq!(ResourceAction::Deprovision.to_string(), "deprovision");
    }

    #[test]
    fn test_provision_status_default() {
        let status = ProvisionStatus::default();
        assert_eq!(status.state, InstanceState::InQueue);
        assert!(status.error.is_empty());
        assert!(status.response.is_empty());
        assert!(status.dashboard_url.is_none());
    }

    #[test]
    fn test_computed_status_equality() {
        let a = ComputedStatus {
            provision: ProvisionStatus {
                state: InstanceState::Succeeded,
                response: "all resources ready".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut b = a.clone();
        assert_eq!(a, b);

        b.deprovision.state = InstanceState::InProgress;
        assert_ne!(a, b);
    }

    #[test]
    fn test_deprovision_status_default_state() {
        let status = DeprovisionStatus::default();
        assert_eq!(status.state, InstanceState::InQueue);
    }
}
