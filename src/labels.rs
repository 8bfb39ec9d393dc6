// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across the reconciler.
//!
//! This module defines standard Kubernetes labels and Provisor-specific labels
//! to ensure consistency across all resources touched by the controller.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for a unique name identifying the instance of an application
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Kubernetes Standard Label Values
// ============================================================================

/// Value for `app.kubernetes.io/part-of` indicating a resource belongs to Provisor
pub const PART_OF_PROVISOR: &str = "provisor";

/// Value for `app.kubernetes.io/managed-by` on sub-resources created for instances
pub const MANAGED_BY_SERVICE_INSTANCE: &str = "ServiceInstance";

// ============================================================================
// Provisor-Specific Labels
// ============================================================================

/// Label recording which operation (`in_queue`, `update`, `delete`) put the
/// instance into the `in progress` state
pub const LAST_OPERATION_LABEL: &str = "osb.provisor.io/lastoperation";

/// Label carrying the string-encoded count of consecutive failing reconcile passes
pub const ERROR_COUNT_LABEL: &str = "osb.provisor.io/error";

/// Label on sub-resources naming the owning instance (informational; cleanup
/// never relies on it)
pub const INSTANCE_LABEL: &str = "osb.provisor.io/instance";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer for `ServiceInstance` resources
pub const FINALIZER_SERVICE_INSTANCE: &str = "osb.provisor.io/serviceinstance-finalizer";
