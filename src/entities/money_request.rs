//! Money request entity - a child's request for funds addressed to their parent.
//!
//! `status` moves from `"pending"` to `"approved"` or `"rejected"` once.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Money request database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "money_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub child_id: String,
    pub parent_id: String,
    pub amount: f64,
    pub reason: String,
    pub status: String,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
