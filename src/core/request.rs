//! Money requests from a child to its parent.
//!
//! A request is created `pending` and resolved exactly once. The transition
//! out of `pending` is a conditional write in the store, so two parents'
//! devices racing on the same request cannot both succeed.

use crate::{
    core::with_read_retry,
    errors::{Error, Result},
    identity::Session,
    models::{Decision, MoneyRequest, RequestStatus, Role, validate_amount},
    store::DocumentStore,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

/// Minimum number of characters in a request reason.
pub const MIN_REASON_LENGTH: usize = 5;

/// Display name used when a request's child is no longer a member.
pub const UNKNOWN_CHILD: &str = "Unknown Child";

/// Sends a pending request to the caller's parent.
pub async fn send_request<S: DocumentStore>(
    store: &S,
    session: &Session,
    amount: f64,
    reason: &str,
) -> Result<MoneyRequest> {
    let parent_id = session.linked_parent()?;
    let amount = validate_amount(amount)?;
    let reason = reason.trim();
    if reason.chars().count() < MIN_REASON_LENGTH {
        return Err(Error::validation(
            "reason",
            format!("reason must be at least {MIN_REASON_LENGTH} characters"),
        ));
    }

    let request = MoneyRequest {
        id: Uuid::new_v4().to_string(),
        child_id: session.uid().to_string(),
        parent_id: parent_id.to_string(),
        amount,
        reason: reason.to_string(),
        status: RequestStatus::Pending,
        created_at: Utc::now(),
        updated_at: None,
    };
    store.insert_request(&request).await?;
    info!(
        "Child {} requested {:.2} from parent {parent_id}",
        request.child_id, request.amount
    );
    Ok(request)
}

/// Approves or rejects a pending request addressed to the calling parent.
pub async fn resolve_request<S: DocumentStore>(
    store: &S,
    session: &Session,
    request_id: &str,
    decision: Decision,
) -> Result<MoneyRequest> {
    let parent_id = session.require_parent()?;

    let request = with_read_retry("request lookup", || store.get_request(request_id))
        .await?
        .filter(|r| r.parent_id == parent_id)
        .ok_or_else(|| Error::not_found("money request", request_id))?;

    if request.status != RequestStatus::Pending {
        return Err(already_resolved(&request));
    }

    let status = decision.status();
    let updated_at = Utc::now();
    if !store
        .resolve_pending_request(request_id, status, updated_at)
        .await?
    {
        // Lost a race with another resolution
        warn!("Request {request_id} was resolved concurrently");
        let current = store
            .get_request(request_id)
            .await?
            .ok_or_else(|| Error::not_found("money request", request_id))?;
        return Err(already_resolved(&current));
    }

    info!(
        "Parent {parent_id} {} request {request_id}",
        status.as_str()
    );
    Ok(MoneyRequest {
        status,
        updated_at: Some(updated_at),
        ..request
    })
}

fn already_resolved(request: &MoneyRequest) -> Error {
    Error::InvalidState {
        message: format!(
            "request {} is already {}",
            request.id,
            request.status.as_str()
        ),
    }
}

/// A request together with the requesting child's display name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestView {
    pub request: MoneyRequest,
    pub child_name: String,
}

/// Requests addressed to the calling parent, newest first.
pub async fn list_requests_for_parent<S: DocumentStore>(
    store: &S,
    session: &Session,
) -> Result<Vec<RequestView>> {
    let parent_id = session.require_parent()?;
    let requests =
        with_read_retry("request listing", || store.requests_for_parent(parent_id)).await?;
    let names: HashMap<String, String> =
        with_read_retry("membership listing", || store.list_memberships(parent_id))
            .await?
            .into_iter()
            .map(|m| (m.uid, m.display_name))
            .collect();

    Ok(requests
        .into_iter()
        .map(|request| {
            let child_name = names
                .get(&request.child_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_CHILD.to_string());
            RequestView {
                request,
                child_name,
            }
        })
        .collect())
}

/// The calling child's own requests, newest first.
pub async fn list_requests_for_child<S: DocumentStore>(
    store: &S,
    session: &Session,
) -> Result<Vec<MoneyRequest>> {
    let child_id = session.uid();
    if session.role() == Role::Parent {
        return Err(Error::not_authorized(
            "only child accounts have outgoing requests",
        ));
    }
    with_read_retry("request listing", || store.requests_for_child(child_id)).await
}
