//! Document store interface.
//!
//! The household data lives in five collections: `users`, the per-parent
//! `children` membership records, `expenses`, `budgets` and `money_requests`.
//! Business logic in [`crate::core`] only talks to this trait, which keeps the
//! workflows independent of the backing database and lets tests inject
//! failures.

/// SeaORM-backed implementation
pub mod sea;

pub use sea::SeaOrmStore;

use crate::errors::Result;
use crate::models::{Budget, ChildMembership, Expense, MoneyRequest, RequestStatus, UserProfile};
use chrono::{DateTime, Utc};

/// Query and write operations the workflows need from the document store.
///
/// No operation is transactional across collections, and no write is
/// guarded by versioning except [`DocumentStore::resolve_pending_request`].
#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    /// Reads `users/{uid}`.
    async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>>;

    /// Writes `users/{uid}`, replacing any existing document.
    async fn put_user(&self, profile: &UserProfile) -> Result<()>;

    /// Updates the display name on `users/{uid}`.
    async fn update_display_name(&self, uid: &str, display_name: &str) -> Result<()>;

    /// Removes `users/{uid}`. Missing documents are not an error.
    async fn delete_user(&self, uid: &str) -> Result<()>;

    /// Writes `users/{parent_id}/children/{membership.uid}`.
    async fn put_membership(&self, parent_id: &str, membership: &ChildMembership) -> Result<()>;

    /// Lists `users/{parent_id}/children`, oldest first.
    async fn list_memberships(&self, parent_id: &str) -> Result<Vec<ChildMembership>>;

    /// Reads a single membership record.
    async fn get_membership(&self, parent_id: &str, child_id: &str)
    -> Result<Option<ChildMembership>>;

    /// Writes a new expense.
    async fn insert_expense(&self, expense: &Expense) -> Result<()>;

    /// All expenses whose owner is `owner_id`, in no particular order.
    async fn expenses_by_owner(&self, owner_id: &str) -> Result<Vec<Expense>>;

    /// Writes a new budget.
    async fn insert_budget(&self, budget: &Budget) -> Result<()>;

    /// All budgets for `child_id`, most recent start first.
    async fn budgets_for_child(&self, child_id: &str) -> Result<Vec<Budget>>;

    /// Writes a new money request.
    async fn insert_request(&self, request: &MoneyRequest) -> Result<()>;

    /// Reads `money_requests/{id}`.
    async fn get_request(&self, id: &str) -> Result<Option<MoneyRequest>>;

    /// Moves a request out of `pending`.
    ///
    /// Returns `false` when the request was not pending at write time, so a
    /// request can be resolved at most once even under concurrent callers.
    async fn resolve_pending_request(
        &self,
        id: &str,
        status: RequestStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Requests addressed to `parent_id`, newest first.
    async fn requests_for_parent(&self, parent_id: &str) -> Result<Vec<MoneyRequest>>;

    /// Requests created by `child_id`, newest first.
    async fn requests_for_child(&self, child_id: &str) -> Result<Vec<MoneyRequest>>;
}
