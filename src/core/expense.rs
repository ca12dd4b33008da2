//! Expense logging and role-aware loading.
//!
//! A child sees only its own expenses. A parent sees its own parent-attributed
//! expenses plus the expenses of every child in its membership list. The
//! per-owner queries run concurrently, bounded by
//! [`AggregationSettings::max_concurrent_fetches`]; a failing owner does not
//! fail the whole load but is reported as a [`FetchWarning`].

use crate::{
    config::AggregationSettings,
    core::with_read_retry,
    errors::{Error, Result},
    identity::Session,
    models::{Expense, ExpenseCategory, ExpenseOwner, Role, validate_amount},
    store::DocumentStore,
};
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Expense form input.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub amount: f64,
    pub category: ExpenseCategory,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    /// Parent only: log the expense on behalf of this child
    pub for_child: Option<String>,
}

/// Logs an expense for the caller or, for parents, for one of their children.
pub async fn log_expense<S: DocumentStore>(
    store: &S,
    session: &Session,
    input: NewExpense,
) -> Result<Expense> {
    let amount = validate_amount(input.amount)?;

    let owner = match (session.role(), input.for_child) {
        (Role::Child, None) => ExpenseOwner::Child {
            child_id: session.uid().to_string(),
            logged_by: None,
        },
        (Role::Child, Some(child_id)) if child_id == session.uid() => ExpenseOwner::Child {
            child_id,
            logged_by: None,
        },
        (Role::Child, Some(_)) => {
            return Err(Error::not_authorized(
                "children can only log their own expenses",
            ));
        }
        (Role::Parent, None) => ExpenseOwner::Parent {
            parent_id: session.uid().to_string(),
        },
        (Role::Parent, Some(child_id)) => {
            if store.get_membership(session.uid(), &child_id).await?.is_none() {
                return Err(Error::not_found("child", child_id));
            }
            ExpenseOwner::Child {
                child_id,
                logged_by: Some(session.uid().to_string()),
            }
        }
    };

    let expense = Expense {
        id: Uuid::new_v4().to_string(),
        owner,
        amount,
        category: Some(input.category),
        description: input
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        date: input.date,
        created_at: Utc::now(),
    };
    store.insert_expense(&expense).await?;

    info!(
        "Logged expense {} of {:.2} for {} {}",
        expense.id,
        expense.amount,
        expense.owner.attribution(),
        expense.owner.owner_id()
    );
    Ok(expense)
}

/// One per-owner query of a household load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpenseSource {
    Parent(String),
    Child(String),
}

impl ExpenseSource {
    fn owner_id(&self) -> &str {
        match self {
            Self::Parent(id) | Self::Child(id) => id,
        }
    }

    /// Whether an expense returned by this source's query belongs in the view.
    fn admits(&self, expense: &Expense) -> bool {
        match self {
            Self::Parent(_) => expense.owner.is_parent(),
            Self::Child(_) => !expense.owner.is_parent(),
        }
    }
}

impl fmt::Display for ExpenseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parent(id) => write!(f, "parent {id}"),
            Self::Child(id) => write!(f, "child {id}"),
        }
    }
}

/// A source whose query failed during a household load.
#[derive(Debug)]
pub struct FetchWarning {
    pub source: ExpenseSource,
    pub error: Error,
}

/// Result of a role-aware expense load.
#[derive(Debug, Default)]
pub struct ExpenseSet {
    /// Deduplicated, newest first
    pub expenses: Vec<Expense>,
    pub warnings: Vec<FetchWarning>,
}

impl ExpenseSet {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.expenses.iter().map(|e| e.amount).sum()
    }

    /// Summary error describing the failed sources, if any.
    #[must_use]
    pub fn warning(&self) -> Option<Error> {
        if self.warnings.is_empty() {
            return None;
        }
        let sources = self
            .warnings
            .iter()
            .map(|w| format!("{} ({})", w.source, w.error))
            .collect::<Vec<_>>()
            .join(", ");
        Some(Error::PartialAggregationFailure {
            loaded: self.expenses.len(),
            failed: self.warnings.len(),
            sources,
        })
    }

    /// Returns the expenses, or the partial-failure error if any source failed.
    pub fn into_complete(self) -> Result<Vec<Expense>> {
        match self.warning() {
            Some(err) => Err(err),
            None => Ok(self.expenses),
        }
    }
}

/// Loads the expenses visible to the caller.
///
/// Fails outright only when the child's own query or the parent's membership
/// listing fails; individual household sources degrade to warnings.
pub async fn load_expenses<S: DocumentStore>(
    store: &S,
    session: &Session,
    settings: &AggregationSettings,
) -> Result<ExpenseSet> {
    let uid = session.uid();

    if session.role() == Role::Child {
        let source = ExpenseSource::Child(uid.to_string());
        let expenses = fetch_source(store, &source).await?;
        return Ok(ExpenseSet {
            expenses: merge_unique(vec![expenses]),
            warnings: Vec::new(),
        });
    }

    let children = with_read_retry("membership listing", || store.list_memberships(uid)).await?;
    let sources: Vec<ExpenseSource> = std::iter::once(ExpenseSource::Parent(uid.to_string()))
        .chain(children.into_iter().map(|c| ExpenseSource::Child(c.uid)))
        .collect();
    debug!(
        "Loading household expenses for {uid} from {} sources",
        sources.len()
    );

    let results: Vec<(ExpenseSource, Result<Vec<Expense>>)> = stream::iter(sources)
        .map(|source| async move {
            let result = fetch_source(store, &source).await;
            (source, result)
        })
        .buffer_unordered(settings.max_concurrent_fetches.max(1))
        .collect()
        .await;

    let mut batches = Vec::with_capacity(results.len());
    let mut warnings = Vec::new();
    for (source, result) in results {
        match result {
            Ok(expenses) => batches.push(expenses),
            Err(error) => {
                warn!("Failed to load expenses for {source}: {error}");
                warnings.push(FetchWarning { source, error });
            }
        }
    }

    Ok(ExpenseSet {
        expenses: merge_unique(batches),
        warnings,
    })
}

async fn fetch_source<S: DocumentStore>(store: &S, source: &ExpenseSource) -> Result<Vec<Expense>> {
    let expenses =
        with_read_retry("expense query", || store.expenses_by_owner(source.owner_id())).await?;
    Ok(expenses.into_iter().filter(|e| source.admits(e)).collect())
}

/// Unions the batches, keeping the first occurrence of each id, newest first.
fn merge_unique(batches: Vec<Vec<Expense>>) -> Vec<Expense> {
    let mut unique: BTreeMap<String, Expense> = BTreeMap::new();
    for expense in batches.into_iter().flatten() {
        unique.entry(expense.id.clone()).or_insert(expense);
    }
    let mut expenses: Vec<Expense> = unique.into_values().collect();
    sort_newest_first(&mut expenses);
    expenses
}

/// Sorts by date descending, ties broken by id ascending.
pub fn sort_newest_first(expenses: &mut [Expense]) {
    expenses.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
}
