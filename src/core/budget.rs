//! Budget business logic - creation, active-budget selection and usage.

use crate::{
    core::with_read_retry,
    errors::{Error, Result},
    identity::Session,
    models::{Budget, BudgetPeriod, Role, validate_amount},
    store::DocumentStore,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Budget form input.
#[derive(Debug, Clone)]
pub struct NewBudget {
    pub child_id: String,
    pub amount: f64,
    pub period: BudgetPeriod,
    pub start_date: DateTime<Utc>,
    /// Defaults to the end of one `period` after `start_date`
    pub end_date: Option<DateTime<Utc>>,
}

/// Creates a budget for one of the caller's children.
///
/// Overlapping budgets are allowed; the most recently started active one wins
/// when the dashboard picks a budget.
pub async fn create_budget<S: DocumentStore>(
    store: &S,
    session: &Session,
    input: NewBudget,
) -> Result<Budget> {
    let parent_id = session.require_parent()?;
    let amount = validate_amount(input.amount)?;
    let end_date = input
        .end_date
        .unwrap_or_else(|| input.period.end_from(input.start_date));
    if input.start_date > end_date {
        return Err(Error::validation(
            "end_date",
            "end date must not be before start date",
        ));
    }

    if store
        .get_membership(parent_id, &input.child_id)
        .await?
        .is_none()
    {
        return Err(Error::not_found("child", input.child_id));
    }

    let budget = Budget {
        id: Uuid::new_v4().to_string(),
        owner_parent_id: parent_id.to_string(),
        child_id: input.child_id,
        amount,
        period: input.period,
        start_date: input.start_date,
        end_date,
        created_at: Utc::now(),
    };
    store.insert_budget(&budget).await?;
    info!(
        "Parent {parent_id} set a {} budget of {:.2} for child {}",
        budget.period.as_str(),
        budget.amount,
        budget.child_id
    );
    Ok(budget)
}

/// Budgets of a child, visible to the child itself and to its parent.
pub async fn budgets_for_child<S: DocumentStore>(
    store: &S,
    session: &Session,
    child_id: &str,
) -> Result<Vec<Budget>> {
    match session.role() {
        Role::Child if session.uid() == child_id => {}
        Role::Child => {
            return Err(Error::not_authorized(
                "children can only view their own budgets",
            ));
        }
        Role::Parent => {
            let membership = with_read_retry("membership lookup", || {
                store.get_membership(session.uid(), child_id)
            })
            .await?;
            if membership.is_none() {
                return Err(Error::not_found("child", child_id));
            }
        }
    }
    with_read_retry("budget query", || store.budgets_for_child(child_id)).await
}

/// First budget for `child_id` whose window contains `now`.
#[must_use]
pub fn active_budget_for<'a>(
    child_id: &str,
    budgets: &'a [Budget],
    now: DateTime<Utc>,
) -> Option<&'a Budget> {
    budgets
        .iter()
        .find(|b| b.child_id == child_id && b.is_active_at(now))
}

/// `total_spent / budget_amount`, or `None` when the budget is not a positive number.
#[must_use]
pub fn spend_ratio(total_spent: f64, budget_amount: f64) -> Option<f64> {
    if !budget_amount.is_finite() || budget_amount <= 0.0 {
        return None;
    }
    Some(total_spent / budget_amount)
}

/// Traffic-light classification of budget usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetHealth {
    Healthy,
    Warning,
    Danger,
}

impl BudgetHealth {
    /// Above 90% is danger, above 70% is a warning.
    #[must_use]
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.9 {
            Self::Danger
        } else if ratio > 0.7 {
            Self::Warning
        } else {
            Self::Healthy
        }
    }
}

/// How much of a budget has been used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetUsage {
    pub budget: Budget,
    pub spent: f64,
    pub ratio: Option<f64>,
    pub health: BudgetHealth,
}

impl BudgetUsage {
    #[must_use]
    pub fn new(budget: Budget, spent: f64) -> Self {
        let ratio = spend_ratio(spent, budget.amount);
        let health = ratio.map_or(BudgetHealth::Healthy, BudgetHealth::from_ratio);
        Self {
            budget,
            spent,
            ratio,
            health,
        }
    }

    /// Amount left before the budget is exhausted; negative when overspent.
    #[must_use]
    pub fn remaining(&self) -> f64 {
        self.budget.amount - self.spent
    }

    /// Whole-number percentage used. Not capped, so overspending shows above 100.
    #[must_use]
    pub fn percent_used(&self) -> f64 {
        self.ratio.map_or(0.0, |r| (r * 100.0).round())
    }

    /// Text bar like `[███████░░░] 70.0%`, the filled part capped at the bar length.
    #[must_use]
    pub fn usage_bar(&self, bar_length: Option<usize>) -> String {
        let length = bar_length.unwrap_or(10);
        let percent = self.percent_used();
        let clamped = percent.clamp(0.0, 100.0);

        // clamped is in [0, 100] and length is small, so the cast cannot overflow
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let filled = ((clamped / 100.0) * length as f64).round() as usize;
        let empty = length.saturating_sub(filled);

        format!("[{}{}] {percent:.1}%", "█".repeat(filled), "░".repeat(empty))
    }
}
