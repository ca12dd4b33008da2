//! Dashboard data for both roles.

use crate::{
    config::AggregationSettings,
    core::{
        analytics::days_before,
        budget::{BudgetUsage, active_budget_for},
        expense::{FetchWarning, load_expenses},
        with_read_retry,
    },
    errors::{Error, Result},
    identity::Session,
    models::{Budget, Expense, Role},
    store::DocumentStore,
};
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use tracing::warn;

/// Spending of one child against its active budget.
#[derive(Debug, Clone, PartialEq)]
pub struct SpendingSummary {
    pub child_id: String,
    pub child_name: String,
    /// Spent inside the active budget window, or the last 30 days without one
    pub spent: f64,
    pub budget: Option<BudgetUsage>,
}

/// A child whose budgets could not be read. Its summary carries no budget.
#[derive(Debug)]
pub struct BudgetWarning {
    pub child_id: String,
    pub error: Error,
}

/// What the dashboard view renders.
#[derive(Debug)]
pub struct Dashboard {
    pub recent_expenses: Vec<Expense>,
    pub total_spent: f64,
    /// One entry per child; a child's dashboard holds only its own
    pub summaries: Vec<SpendingSummary>,
    pub warnings: Vec<FetchWarning>,
    pub budget_warnings: Vec<BudgetWarning>,
}

/// Loads everything the caller's dashboard shows.
pub async fn load_dashboard<S: DocumentStore>(
    store: &S,
    session: &Session,
    settings: &AggregationSettings,
    now: DateTime<Utc>,
) -> Result<Dashboard> {
    let set = load_expenses(store, session, settings).await?;
    let total_spent = set.total();

    let children: Vec<(String, String)> = match session.role() {
        Role::Child => vec![(
            session.uid().to_string(),
            session.profile().display_name.clone(),
        )],
        Role::Parent => {
            with_read_retry("membership listing", || store.list_memberships(session.uid()))
                .await?
                .into_iter()
                .map(|m| (m.uid, m.display_name))
                .collect()
        }
    };

    let fetched: Vec<(String, String, Result<Vec<Budget>>)> = stream::iter(children)
        .map(|(child_id, child_name)| async move {
            let budgets =
                with_read_retry("budget query", || store.budgets_for_child(&child_id)).await;
            (child_id, child_name, budgets)
        })
        .buffered(settings.max_concurrent_fetches.max(1))
        .collect()
        .await;

    let mut summaries = Vec::with_capacity(fetched.len());
    let mut budget_warnings = Vec::new();
    for (child_id, child_name, budgets) in fetched {
        let budgets = budgets.unwrap_or_else(|error| {
            warn!("Failed to load budgets for child {child_id}: {error}");
            budget_warnings.push(BudgetWarning {
                child_id: child_id.clone(),
                error,
            });
            Vec::new()
        });
        summaries.push(summarize(child_id, child_name, &set.expenses, &budgets, now));
    }

    let mut recent_expenses = set.expenses;
    recent_expenses.truncate(settings.recent_expense_limit);

    Ok(Dashboard {
        recent_expenses,
        total_spent,
        summaries,
        warnings: set.warnings,
        budget_warnings,
    })
}

fn summarize(
    child_id: String,
    child_name: String,
    expenses: &[Expense],
    budgets: &[Budget],
    now: DateTime<Utc>,
) -> SpendingSummary {
    let active = active_budget_for(&child_id, budgets, now);
    let (from, to) = active.map_or((days_before(now, 30), now), |b| {
        (b.start_date, b.end_date)
    });

    let spent = expenses
        .iter()
        .filter(|e| !e.owner.is_parent() && e.owner.owner_id() == child_id)
        .filter(|e| from <= e.date && e.date <= to)
        .map(|e| e.amount)
        .sum();

    SpendingSummary {
        budget: active.map(|b| BudgetUsage::new(b.clone(), spent)),
        child_id,
        child_name,
        spent,
    }
}
