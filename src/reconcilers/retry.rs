// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Bounded immediate retry for store mutations.
//!
//! Every write the reconciler makes to a `ServiceInstance` goes through
//! [`retry_mutation`]. The closure owns the whole fetch-mutate-write cycle,
//! so an optimistic-concurrency conflict on one attempt is healed by the
//! next attempt re-fetching the object and reapplying the change to the
//! fresh copy. Retries are immediate rather than backed off: each attempt
//! already starts from the latest state, and the attempt count is bounded
//! so a persistently failing API server surfaces an error instead of
//! spinning forever.

use std::future::Future;

use tracing::{debug, error, warn};

use crate::constants::MUTATION_RETRY_LIMIT;
use crate::error::Result;

/// Run a re-fetching mutation closure, retrying immediately on failure.
///
/// The first failure is followed by up to [`MUTATION_RETRY_LIMIT`] further
/// attempts; the error from the final attempt is returned when all of them
/// fail. The closure must be safe to run repeatedly: it re-fetches the
/// object it mutates, decides whether the change is still needed, and
/// writes with the fetched `resourceVersion` so concurrent writers are
/// detected rather than overwritten.
///
/// # Arguments
///
/// * `operation` - Closure performing one fetch-mutate-write attempt
/// * `operation_name` - Human-readable name for logging and metrics
///   (e.g., "ensure finalizer")
///
/// # Errors
///
/// Returns the last attempt's error once the retry budget is exhausted.
///
/// # Example
///
/// ```no_run
/// use kube::api::PostParams;
/// use kube::{Api, Client, ResourceExt};
/// use provisor::crd::ServiceInstance;
/// use provisor::reconcilers::retry::retry_mutation;
///
/// # async fn example() -> provisor::error::Result<()> {
/// let client = Client::try_default().await?;
/// let api: Api<ServiceInstance> = Api::namespaced(client, "default");
///
/// retry_mutation(
///     || async {
///         let Some(mut latest) = api.get_opt("my-instance").await? else {
///             return Ok(());
///         };
///         latest
///             .labels_mut()
///             .insert("example".to_string(), "value".to_string());
///         api.replace("my-instance", &PostParams::default(), &latest)
///             .await?;
///         Ok(())
///     },
///     "label instance my-instance",
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_mutation<T, F, Fut>(mut operation: F, operation_name: &str) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        "Mutation succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(err) if attempt < MUTATION_RETRY_LIMIT => {
                attempt += 1;
                crate::metrics::record_mutation_retry(operation_name);
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %err,
                    "Mutation failed, retrying with a fresh copy"
                );
            }
            Err(err) => {
                error!(
                    operation = operation_name,
                    attempts = attempt + 1,
                    error = %err,
                    "Mutation retry budget exhausted, giving up"
                );
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
