//! Core business logic - framework-agnostic household workflows.
//!
//! Every function takes the document store, the identity provider and/or
//! the caller's [`crate::identity::Session`] explicitly. Nothing here keeps
//! state between calls.

/// Registration, login, profile updates and child provisioning
pub mod account;
/// Timeframe filtering and category/time-bucket aggregation
pub mod analytics;
/// Budget creation, active-budget selection and spend ratios
pub mod budget;
/// Dashboard data assembly
pub mod dashboard;
/// Expense logging and role-aware loading
pub mod expense;
/// Child-to-parent money requests
pub mod request;

use crate::errors::Result;
use std::future::Future;
use tracing::warn;

/// Runs an idempotent read, retrying once if the first attempt hit a
/// transient upstream failure. Writes must never go through here.
pub(crate) async fn with_read_retry<T, F, Fut>(what: &str, mut read: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match read().await {
        Err(err) if err.is_transient() => {
            warn!("Retrying {what} after transient failure: {err}");
            read().await
        }
        result => result,
    }
}
