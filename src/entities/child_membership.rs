//! Child membership entity - the parent-side `users/{parent}/children/{child}` record.
//!
//! Mirrors the child's uid, email and display name. It is written independently
//! of the child's own profile, so the two can drift.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Membership database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "child_memberships")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub parent_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub child_id: String,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTimeUtc,
}

/// Documents reference each other by uid only; no foreign keys
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
