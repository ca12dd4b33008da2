//! User entity - the `users/{uid}` profile document.
//!
//! Holds the role and, for children, the owning parent. Credentials live in
//! the identity provider, never here.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User profile database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Principal id issued by the identity provider
    #[sea_orm(primary_key, auto_increment = false)]
    pub uid: String,
    pub email: String,
    pub display_name: String,
    /// `"parent"` or `"child"`
    pub role: String,
    /// Owning parent's uid, set for child accounts
    pub parent_id: Option<String>,
    pub created_at: DateTimeUtc,
}

/// Documents reference each other by uid only; no foreign keys
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
