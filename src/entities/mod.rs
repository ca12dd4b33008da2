//! Entity module - SeaORM definitions for the household document collections.
//! Each collection is a table; the nested `users/{parent}/children` collection
//! is flattened into `child_memberships` keyed by `(parent_id, child_id)`.

pub mod budget;
pub mod child_membership;
pub mod expense;
pub mod money_request;
pub mod user;

// Re-export specific types to avoid conflicts
pub use budget::{Column as BudgetColumn, Entity as Budget, Model as BudgetModel};
pub use child_membership::{
    Column as ChildMembershipColumn, Entity as ChildMembership, Model as ChildMembershipModel,
};
pub use expense::{Column as ExpenseColumn, Entity as Expense, Model as ExpenseModel};
pub use money_request::{
    Column as MoneyRequestColumn, Entity as MoneyRequest, Model as MoneyRequestModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
