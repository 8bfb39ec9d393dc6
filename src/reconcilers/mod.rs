// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for `ServiceInstance` resources.
//!
//! The engine in [`serviceinstance`] drives one pass of the standard
//! Kubernetes controller pattern:
//!
//! 1. **Watch** - the controller feeds instance and sub-resource events in
//! 2. **Converge** - the request branch applies or tears down sub-resources
//!    through the configured [`crate::manager::ResourceManager`]
//! 3. **Status** - the writers in [`status`] copy the computed aggregate
//!    onto the instance, gated on equality so settled instances stay quiet
//! 4. **Bookkeeping** - [`failures`] turns every outcome into the
//!    consecutive-failure counter and abandons an instance as `failed` once
//!    the threshold is crossed
//!
//! Support modules: [`finalizers`] guards instances against deletion while
//! sub-resources may still exist, and [`retry`] wraps every store mutation
//! in a bounded re-fetching retry.

pub mod failures;
pub mod finalizers;
pub mod retry;
pub mod serviceinstance;
pub mod status;

pub use failures::conclude_pass;
pub use finalizers::{ensure_finalizer, strip_finalizer};
pub use retry::retry_mutation;
pub use serviceinstance::reconcile_service_instance;
pub use status::{apply_deprovision_status, apply_provision_status, set_in_progress};
