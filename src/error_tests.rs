// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::error::{is_not_found, Error};

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(Box::new(kube::core::Status {
            status: Some(kube::core::response::StatusSummary::Failure),
            message: format!("code {code}"),
            reason: String::new(),
            code,
            details: None,
            metadata: None,
        }))
    }

    #[test]
    fn test_is_not_found_matches_404() {
        assert!(is_not_found(&api_error(404)));
    }

    #[test]
    fn test_is_not_found_rejects_other_api_errors() {
        assert!(!is_not_found(&api_error(409)));
        assert!(!is_not_found(&api_error(500)));
    }

    #[test]
    fn test_is_not_found_rejects_non_api_errors() {
        let service_error: Box<dyn std::error::Error + Send + Sync> = Box::new(
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
        );
        assert!(!is_not_found(&kube::Error::Service(service_error)));
    }

    #[test]
    fn test_plan_not_found_display() {
        let err = Error::PlanNotFound {
            plan_id: "29d7d4c8".to_string(),
            namespace: "provisor-system".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("29d7d4c8"));
        assert!(text.contains("provisor-system"));
    }

    #[test]
    fn test_kube_error_conversion() {
        let err: Error = api_error(500).into();
        assert!(matches!(err, Error::Kube(_)));
        assert!(err.to_string().contains("Kubernetes API error"));
    }

    #[test]
    fn test_config_error_display() {
        let err = Error::Config("invalid secret location".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: invalid secret location"
        );
    }
}
