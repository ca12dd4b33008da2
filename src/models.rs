//! Domain types shared by the store, identity and core layers.
//!
//! These are the request-scoped copies the engine works on. Persistence
//! uses the string-typed SeaORM entities in [`crate::entities`]; conversion
//! happens in [`crate::store::sea`].

use crate::errors::{Error, Result};
use chrono::{DateTime, Months, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Household owner, may create children, budgets and resolve requests
    Parent,
    /// Sub-account owned by a parent
    Child,
}

impl Role {
    /// Stored representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Child => "child",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "parent" => Ok(Self::Parent),
            "child" => Ok(Self::Child),
            other => Err(Error::validation("role", format!("unknown role '{other}'"))),
        }
    }
}

/// Profile document stored at `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    /// Owning parent; always set for linked children
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Parent-side membership record stored at `users/{parent}/children/{child}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildMembership {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Fixed set of expense categories offered by the expense forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Food,
    Education,
    Transport,
    Entertainment,
    Clothing,
    Health,
    Gifts,
    Other,
}

impl ExpenseCategory {
    /// All categories in form order
    pub const ALL: [Self; 8] = [
        Self::Food,
        Self::Transport,
        Self::Education,
        Self::Entertainment,
        Self::Clothing,
        Self::Health,
        Self::Gifts,
        Self::Other,
    ];

    /// Stored and displayed label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Education => "education",
            Self::Transport => "transport",
            Self::Entertainment => "entertainment",
            Self::Clothing => "clothing",
            Self::Health => "health",
            Self::Gifts => "gifts",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpenseCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| Error::validation("category", format!("unknown category '{s}'")))
    }
}

/// Who an expense is attributed to.
///
/// Replaces the pair of `isParentExpense`/`isChildExpense` flags so that an
/// expense can never be attributed to both or neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExpenseOwner {
    /// Parent's own household spending
    Parent { parent_id: String },
    /// Child spending, optionally logged by the parent on the child's behalf
    Child {
        child_id: String,
        logged_by: Option<String>,
    },
}

impl ExpenseOwner {
    /// Id of the principal the expense belongs to
    #[must_use]
    pub fn owner_id(&self) -> &str {
        match self {
            Self::Parent { parent_id } => parent_id,
            Self::Child { child_id, .. } => child_id,
        }
    }

    /// Stored attribution tag
    #[must_use]
    pub const fn attribution(&self) -> &'static str {
        match self {
            Self::Parent { .. } => "parent",
            Self::Child { .. } => "child",
        }
    }

    #[must_use]
    pub const fn is_parent(&self) -> bool {
        matches!(self, Self::Parent { .. })
    }
}

/// A single logged expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub owner: ExpenseOwner,
    pub amount: f64,
    /// `None` for legacy records without a recognised category
    pub category: Option<ExpenseCategory>,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    /// Label used for category aggregation; unset categories fall into `"Other"`.
    #[must_use]
    pub fn category_label(&self) -> &'static str {
        self.category.map_or("Other", ExpenseCategory::as_str)
    }
}

/// Budget period length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Weekly,
    Monthly,
    Yearly,
}

impl BudgetPeriod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Last instant of a period starting at `start`.
    #[must_use]
    pub fn end_from(self, start: DateTime<Utc>) -> DateTime<Utc> {
        let next = match self {
            Self::Weekly => start.checked_add_signed(TimeDelta::days(7)),
            Self::Monthly => start.checked_add_months(Months::new(1)),
            Self::Yearly => start.checked_add_months(Months::new(12)),
        };
        next.map_or(DateTime::<Utc>::MAX_UTC, |end| end - TimeDelta::seconds(1))
    }
}

impl FromStr for BudgetPeriod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(Error::validation("period", format!("unknown period '{other}'"))),
        }
    }
}

/// Spending budget a parent sets for one child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub owner_parent_id: String,
    pub child_id: String,
    pub amount: f64,
    pub period: BudgetPeriod,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Budget {
    /// Whether `now` lies inside `[start_date, end_date]`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now && now <= self.end_date
    }
}

/// Money request lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for RequestStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(Error::validation("status", format!("unknown status '{other}'"))),
        }
    }
}

/// Parent's decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    /// Terminal status this decision moves a request to
    #[must_use]
    pub const fn status(self) -> RequestStatus {
        match self {
            Self::Approve => RequestStatus::Approved,
            Self::Reject => RequestStatus::Rejected,
        }
    }
}

/// A child's request for money from their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyRequest {
    pub id: String,
    pub child_id: String,
    pub parent_id: String,
    pub amount: f64,
    pub reason: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Checks that an amount entered on a form is a positive, finite number.
pub fn validate_amount(amount: f64) -> Result<f64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::validation(
            "amount",
            format!("must be a positive number, got {amount}"),
        ));
    }
    Ok(amount)
}
