//! Shared test utilities for `RupeeWise`.
//!
//! Fixtures for the domain types, an in-memory store, and wrappers around the
//! store and identity provider that inject failures.

#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_const_for_fn)]

use crate::{
    config::AccountSettings,
    core::account::register_parent,
    entities::User as UserEntity,
    errors::{Error, Result},
    identity::{
        IdentityProvider, LocalIdentityProvider, PrincipalInfo, Session, SessionToken, SignedIn,
    },
    models::{
        Budget, BudgetPeriod, ChildMembership, Expense, ExpenseOwner, MoneyRequest, RequestStatus,
        Role, UserProfile,
    },
    store::{DocumentStore, SeaOrmStore},
};
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::watch;

/// Email used by [`register_test_parent`].
pub const TEST_PARENT_EMAIL: &str = "parent@example.com";
/// Password used by [`register_test_parent`].
pub const TEST_PARENT_PASSWORD: &str = "parent-secret";

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// In-memory document store.
pub async fn setup_test_store() -> Result<SeaOrmStore> {
    Ok(SeaOrmStore::new(setup_test_db().await?))
}

/// Empty store plus an identity provider that switches sessions on create.
pub async fn setup_household() -> Result<(SeaOrmStore, LocalIdentityProvider)> {
    Ok((setup_test_store().await?, LocalIdentityProvider::new()))
}

/// Midnight UTC on the given day.
pub fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

pub fn parent_profile(uid: &str, email: &str) -> UserProfile {
    UserProfile {
        uid: uid.to_string(),
        email: email.to_string(),
        display_name: "Parent".to_string(),
        role: Role::Parent,
        parent_id: None,
        created_at: date(2024, 1, 1),
    }
}

pub fn child_profile(uid: &str, email: &str, parent_id: &str) -> UserProfile {
    UserProfile {
        uid: uid.to_string(),
        email: email.to_string(),
        display_name: "Child".to_string(),
        role: Role::Child,
        parent_id: Some(parent_id.to_string()),
        created_at: date(2024, 1, 1),
    }
}

/// Child profile whose parent link is missing.
pub fn orphan_child_profile(uid: &str, email: &str) -> UserProfile {
    UserProfile {
        parent_id: None,
        ..child_profile(uid, email, "")
    }
}

/// Session for a profile without going through the identity provider.
pub fn test_session(profile: UserProfile) -> Session {
    Session::new(profile, SessionToken::new("test-token".to_string()))
}

pub fn membership(uid: &str, display_name: &str) -> ChildMembership {
    ChildMembership {
        uid: uid.to_string(),
        email: format!("{uid}@example.com"),
        display_name: display_name.to_string(),
        created_at: date(2024, 1, 1),
    }
}

/// Child expense with the given category label.
pub fn expense_on(
    id: &str,
    child_id: &str,
    amount: f64,
    category: &str,
    date: DateTime<Utc>,
) -> Expense {
    Expense {
        id: id.to_string(),
        owner: ExpenseOwner::Child {
            child_id: child_id.to_string(),
            logged_by: None,
        },
        amount,
        category: Some(category.parse().unwrap()),
        description: None,
        date,
        created_at: date,
    }
}

/// Parent-attributed expense with the given category label.
pub fn parent_expense_on(
    id: &str,
    parent_id: &str,
    amount: f64,
    category: &str,
    date: DateTime<Utc>,
) -> Expense {
    Expense {
        owner: ExpenseOwner::Parent {
            parent_id: parent_id.to_string(),
        },
        ..expense_on(id, parent_id, amount, category, date)
    }
}

/// Monthly budget owned by `p1` with an explicit window.
pub fn budget_between(
    id: &str,
    child_id: &str,
    amount: f64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> Budget {
    Budget {
        id: id.to_string(),
        owner_parent_id: "p1".to_string(),
        child_id: child_id.to_string(),
        amount,
        period: BudgetPeriod::Monthly,
        start_date,
        end_date,
        created_at: start_date,
    }
}

pub fn pending_request(
    id: &str,
    child_id: &str,
    parent_id: &str,
    amount: f64,
    created_at: DateTime<Utc>,
) -> MoneyRequest {
    MoneyRequest {
        id: id.to_string(),
        child_id: child_id.to_string(),
        parent_id: parent_id.to_string(),
        amount,
        reason: "pocket money".to_string(),
        status: RequestStatus::Pending,
        created_at,
        updated_at: None,
    }
}

/// Parent `p1` with children `c1` (Asha, ₹500 food on 2024-01-01) and
/// `c2` (Ravi, ₹300 transport on 2024-01-02).
pub async fn seed_two_children<S: DocumentStore>(store: &S) -> Result<()> {
    store.put_membership("p1", &membership("c1", "Asha")).await?;
    store.put_membership("p1", &membership("c2", "Ravi")).await?;
    store
        .insert_expense(&expense_on("e1", "c1", 500.0, "food", date(2024, 1, 1)))
        .await?;
    store
        .insert_expense(&expense_on("e2", "c2", 300.0, "transport", date(2024, 1, 2)))
        .await?;
    Ok(())
}

/// Registers and signs in the standard test parent.
pub async fn register_test_parent<S, I>(store: &S, identity: &I) -> Result<Session>
where
    S: DocumentStore,
    I: IdentityProvider,
{
    register_parent(
        store,
        identity,
        &AccountSettings::default(),
        TEST_PARENT_EMAIL,
        TEST_PARENT_PASSWORD,
        "Test Parent",
    )
    .await
}

fn injected(service: &'static str) -> Error {
    Error::UpstreamUnavailable {
        service,
        message: "injected failure".to_string(),
    }
}

/// Store wrapper that fails selected operations.
#[derive(Debug)]
pub struct FlakyStore<S> {
    inner: S,
    failing_owners: HashSet<String>,
    failing_budget_children: HashSet<String>,
    fail_once: Mutex<HashSet<String>>,
    fail_memberships: bool,
    fail_users: bool,
    expense_queries: Mutex<HashMap<String, usize>>,
}

impl<S: DocumentStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing_owners: HashSet::new(),
            failing_budget_children: HashSet::new(),
            fail_once: Mutex::new(HashSet::new()),
            fail_memberships: false,
            fail_users: false,
            expense_queries: Mutex::new(HashMap::new()),
        }
    }

    /// Every expense query for `owner_id` fails.
    pub fn fail_owner(mut self, owner_id: &str) -> Self {
        self.failing_owners.insert(owner_id.to_string());
        self
    }

    /// Only the first expense query for `owner_id` fails.
    pub fn fail_owner_once(self, owner_id: &str) -> Self {
        self.fail_once.lock().unwrap().insert(owner_id.to_string());
        self
    }

    /// Every budget query for `child_id` fails.
    pub fn fail_budgets_for(mut self, child_id: &str) -> Self {
        self.failing_budget_children.insert(child_id.to_string());
        self
    }

    pub fn fail_membership_writes(mut self) -> Self {
        self.fail_memberships = true;
        self
    }

    pub fn fail_user_writes(mut self) -> Self {
        self.fail_users = true;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of expense queries issued for `owner_id`, retries included.
    pub fn expense_queries_for(&self, owner_id: &str) -> usize {
        self.expense_queries
            .lock()
            .unwrap()
            .get(owner_id)
            .copied()
            .unwrap_or(0)
    }
}

impl FlakyStore<SeaOrmStore> {
    /// Rows in the `users` table.
    pub async fn user_count(&self) -> Result<u64> {
        Ok(UserEntity::find().count(self.inner.connection()).await?)
    }
}

impl<S: DocumentStore> DocumentStore for FlakyStore<S> {
    async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>> {
        self.inner.get_user(uid).await
    }

    async fn put_user(&self, profile: &UserProfile) -> Result<()> {
        if self.fail_users {
            return Err(injected("document store"));
        }
        self.inner.put_user(profile).await
    }

    async fn update_display_name(&self, uid: &str, display_name: &str) -> Result<()> {
        self.inner.update_display_name(uid, display_name).await
    }

    async fn delete_user(&self, uid: &str) -> Result<()> {
        self.inner.delete_user(uid).await
    }

    async fn put_membership(&self, parent_id: &str, membership: &ChildMembership) -> Result<()> {
        if self.fail_memberships {
            return Err(injected("document store"));
        }
        self.inner.put_membership(parent_id, membership).await
    }

    async fn list_memberships(&self, parent_id: &str) -> Result<Vec<ChildMembership>> {
        self.inner.list_memberships(parent_id).await
    }

    async fn get_membership(
        &self,
        parent_id: &str,
        child_id: &str,
    ) -> Result<Option<ChildMembership>> {
        self.inner.get_membership(parent_id, child_id).await
    }

    async fn insert_expense(&self, expense: &Expense) -> Result<()> {
        self.inner.insert_expense(expense).await
    }

    async fn expenses_by_owner(&self, owner_id: &str) -> Result<Vec<Expense>> {
        *self
            .expense_queries
            .lock()
            .unwrap()
            .entry(owner_id.to_string())
            .or_insert(0) += 1;

        if self.failing_owners.contains(owner_id) || self.fail_once.lock().unwrap().remove(owner_id)
        {
            return Err(injected("document store"));
        }
        self.inner.expenses_by_owner(owner_id).await
    }

    async fn insert_budget(&self, budget: &Budget) -> Result<()> {
        self.inner.insert_budget(budget).await
    }

    async fn budgets_for_child(&self, child_id: &str) -> Result<Vec<Budget>> {
        if self.failing_budget_children.contains(child_id) {
            return Err(injected("document store"));
        }
        self.inner.budgets_for_child(child_id).await
    }

    async fn insert_request(&self, request: &MoneyRequest) -> Result<()> {
        self.inner.insert_request(request).await
    }

    async fn get_request(&self, id: &str) -> Result<Option<MoneyRequest>> {
        self.inner.get_request(id).await
    }

    async fn resolve_pending_request(
        &self,
        id: &str,
        status: RequestStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.inner
            .resolve_pending_request(id, status, updated_at)
            .await
    }

    async fn requests_for_parent(&self, parent_id: &str) -> Result<Vec<MoneyRequest>> {
        self.inner.requests_for_parent(parent_id).await
    }

    async fn requests_for_child(&self, child_id: &str) -> Result<Vec<MoneyRequest>> {
        self.inner.requests_for_child(child_id).await
    }
}

/// Identity provider wrapper whose `delete_principal` always fails.
#[derive(Debug)]
pub struct FailingDeleteIdentity<I> {
    inner: I,
}

impl<I: IdentityProvider> FailingDeleteIdentity<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }
}

impl<I: IdentityProvider> IdentityProvider for FailingDeleteIdentity<I> {
    async fn create_principal(&self, email: &str, password: &str) -> Result<String> {
        self.inner.create_principal(email, password).await
    }

    async fn set_display_name(&self, principal_id: &str, display_name: &str) -> Result<()> {
        self.inner.set_display_name(principal_id, display_name).await
    }

    async fn update_password(&self, principal_id: &str, new_password: &str) -> Result<()> {
        self.inner.update_password(principal_id, new_password).await
    }

    async fn delete_principal(&self, _principal_id: &str) -> Result<()> {
        Err(injected("identity provider"))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn> {
        self.inner.sign_in(email, password).await
    }

    async fn resume(&self, token: &SessionToken) -> Result<PrincipalInfo> {
        self.inner.resume(token).await
    }

    async fn sign_out(&self) -> Result<()> {
        self.inner.sign_out().await
    }

    async fn current_principal(&self) -> Result<Option<PrincipalInfo>> {
        self.inner.current_principal().await
    }

    fn subscribe(&self) -> watch::Receiver<Option<PrincipalInfo>> {
        self.inner.subscribe()
    }
}
