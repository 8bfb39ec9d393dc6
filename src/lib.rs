// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Provisor - Service Instance Operator for Kubernetes
//!
//! Provisor is a Kubernetes operator written in Rust that provisions service
//! instances declared through Custom Resource Definitions (CRDs), rendering
//! each instance into plan-defined sub-resources on a target cluster.
//!
//! ## Overview
//!
//! This library provides the core functionality for the Provisor operator,
//! including:
//!
//! - The `ServiceInstance` Custom Resource Definition and its state machine
//! - Reconciliation logic converging declared instances to sub-resources
//! - Plan-backed resource rendering with server-side apply
//! - Target-cluster resolution for split-cluster deployments
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types for service instances
//! - [`reconcilers`] - Reconciliation engine, status writers and failure
//!   bookkeeping
//! - [`manager`] - The [`manager::ResourceManager`] seam between the engine
//!   and sub-resource materialization
//! - [`plans`] - ConfigMap-backed plan rendering, the shipped manager
//! - [`cluster`] - Target-cluster resolution from kubeconfig Secrets
//! - [`controller`] - Controller wiring, watches and error policy
//! - [`context`] - Shared context handed to every reconcile pass
//!
//! ## Example
//!
//! ```rust,no_run
//! use provisor::crd::ServiceInstanceSpec;
//!
//! // Declare which offering and plan the instance is an occurrence of.
//! let spec = ServiceInstanceSpec {
//!     service_id: "24731fb8-7b84-4f57-914f-c3d55d793dd4".to_string(),
//!     plan_id: "29d7d4c8-6fe2-4c2a-a5ca-b826937d5a88".to_string(),
//!     organization_guid: None,
//!     space_guid: None,
//! };
//! ```
//!
//! ## Features
//!
//! - **Crash-safe state machine** - operation progress survives restarts via
//!   the `lastoperation` label and recorded sub-resource references
//! - **Bounded retries** - every store mutation re-fetches and retries on
//!   conflict; persistent failures are counted and eventually abandoned
//! - **Split-cluster aware** - sub-resources may land on a sister cluster
//!   resolved from a kubeconfig Secret
//! - **Status subresource** - full status tracking with equality-gated writes

pub mod cluster;
pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod crd;
pub mod error;
pub mod labels;
pub mod manager;
pub mod metrics;
pub mod plans;
pub mod reconcilers;
pub mod subresources;

#[cfg(test)]
pub mod test_utils;
