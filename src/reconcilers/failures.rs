// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Consecutive-failure bookkeeping for reconciliation passes.
//!
//! Every pass ends in [`conclude_pass`]. It persists the outcome into the
//! error-count label: failures increment it, a clean pass resets it, and the
//! failure that pushes the count past [`ERROR_THRESHOLD`] marks the instance
//! `failed` and swallows the error so the controller stops requeueing it.
//! The threshold is deliberately one-sided: an instance only goes terminal
//! after the threshold of *consecutive* failures, since any clean pass in
//! between starts the count over.

use std::sync::atomic::{AtomicBool, Ordering};

use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use tracing::{debug, error};

use crate::constants::{ERROR_THRESHOLD, RETRY_THRESHOLD_DESCRIPTION};
use crate::crd::{InstanceState, ServiceInstance};
use crate::error::Result;
use crate::labels::{ERROR_COUNT_LABEL, LAST_OPERATION_LABEL};
use crate::reconcilers::retry::retry_mutation;
use crate::reconcilers::status::{put_instance, put_status};

/// What the bookkeeping write ended up doing.
enum CounterWrite {
    /// The instance no longer exists; nothing to record
    InstanceGone,
    /// Clean pass with a zero counter; no write was needed
    Unchanged,
    /// Clean pass reset a non-zero counter
    Reset,
    /// Failure recorded below the threshold
    Counted(i64),
    /// Failure pushed the counter past the threshold; the instance was
    /// marked `failed`
    Terminal,
}

/// Record a pass outcome on the instance and decide what the controller
/// returns for it.
///
/// A failing outcome below the threshold is passed through unchanged so the
/// error policy schedules the next attempt. The failure that crosses the
/// threshold instead persists the terminal `failed` state, re-stamps the
/// `lastoperation` label when one is known, and returns a clean
/// [`Action::await_change`] so the instance is left alone until an external
/// actor changes it. A clean outcome resets a non-zero counter and is
/// returned as-is.
///
/// # Arguments
///
/// * `api` - API scoped to the instance's namespace
/// * `name` - Name of the instance
/// * `outcome` - What the pass produced
/// * `last_operation` - Operation to re-stamp on a terminal write, if known
///
/// # Errors
///
/// Never fabricates an error: the returned error is always the pass's own.
/// Bookkeeping failures are logged and the outcome is passed through, except
/// when the terminal write itself cannot be persisted, in which case the
/// pass still ends cleanly and a later event retries the terminal write.
pub async fn conclude_pass(
    api: &Api<ServiceInstance>,
    name: &str,
    outcome: Result<Action>,
    last_operation: Option<InstanceState>,
) -> Result<Action> {
    let error_text = outcome.as_ref().err().map(ToString::to_string);
    let terminal_attempted = AtomicBool::new(false);

    let persisted = retry_mutation(
        || async {
            let Some(mut latest) = api.get_opt(name).await? else {
                return Ok(CounterWrite::InstanceGone);
            };
            let count = latest.error_count();

            match &error_text {
                None if count == 0 => Ok(CounterWrite::Unchanged),
                None => {
                    latest
                        .labels_mut()
                        .insert(ERROR_COUNT_LABEL.to_string(), "0".to_string());
                    put_instance(api, &latest).await?;
                    Ok(CounterWrite::Reset)
                }
                Some(text) => {
                    let next = count + 1;
                    if next > ERROR_THRESHOLD {
                        terminal_attempted.store(true, Ordering::Relaxed);
                        let mut status = latest.status.clone().unwrap_or_default();
                        status.state = InstanceState::Failed;
                        status.error = format!("Retry threshold reached for {name}.\n{text}");
                        status.description = RETRY_THRESHOLD_DESCRIPTION.to_string();
                        latest.status = Some(status);
                        let mut updated = put_status(api, &latest).await?;
                        if let Some(operation) = last_operation {
                            updated.labels_mut().insert(
                                LAST_OPERATION_LABEL.to_string(),
                                operation.to_string(),
                            );
                            put_instance(api, &updated).await?;
                        }
                        Ok(CounterWrite::Terminal)
                    } else {
                        latest
                            .labels_mut()
                            .insert(ERROR_COUNT_LABEL.to_string(), next.to_string());
                        put_instance(api, &latest).await?;
                        Ok(CounterWrite::Counted(next))
                    }
                }
            }
        },
        "update error counter",
    )
    .await;

    match persisted {
        Ok(CounterWrite::Terminal) => {
            error!(
                instance = name,
                error = error_text.as_deref().unwrap_or_default(),
                "Retry threshold reached, ignoring error and abandoning instance"
            );
            crate::metrics::record_terminal_failure();
            Ok(Action::await_change())
        }
        Ok(CounterWrite::Counted(count)) => {
            debug!(instance = name, failures = count, "Recorded failing pass");
            outcome
        }
        Ok(CounterWrite::Reset) => {
            debug!(instance = name, "Error counter reset after clean pass");
            outcome
        }
        Ok(CounterWrite::InstanceGone) => {
            debug!(instance = name, "Instance gone, pass outcome not recorded");
            outcome
        }
        Ok(CounterWrite::Unchanged) => outcome,
        Err(persist_err) => {
            if terminal_attempted.load(Ordering::Relaxed) {
                error!(
                    instance = name,
                    error = %persist_err,
                    "Failed to persist terminal failure state"
                );
                Ok(Action::await_change())
            } else {
                error!(
                    instance = name,
                    error = %persist_err,
                    "Failed to update error counter"
                );
                outcome
            }
        }
    }
}

#[cfg(test)]
#[path = "failures_tests.rs"]
mod failures_tests;
