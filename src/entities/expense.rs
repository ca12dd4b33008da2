//! Expense entity - Represents a single logged expense.
//!
//! `attribution` is `"parent"` or `"child"`; `owner_id` is the principal the
//! expense belongs to and `logged_by` is set when a parent logs on a child's
//! behalf. The domain layer folds these into `ExpenseOwner`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Expense database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Principal the expense belongs to
    pub owner_id: String,
    /// `"parent"` or `"child"`
    pub attribution: String,
    /// Parent uid when logged on a child's behalf
    pub logged_by: Option<String>,
    /// Positive amount in rupees
    pub amount: f64,
    /// Category label, empty for legacy records
    pub category: String,
    pub description: Option<String>,
    /// When the money was spent
    pub date: DateTimeUtc,
    /// When the record was written
    pub created_at: DateTimeUtc,
}

/// Expenses are looked up by owner only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
