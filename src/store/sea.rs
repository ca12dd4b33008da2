//! `SeaORM` implementation of [`DocumentStore`].
//!
//! Each collection maps to one table from [`crate::entities`]. Enumerated
//! fields are stored as their string labels and parsed back on read; a row
//! that cannot be mapped onto the domain model surfaces as
//! [`Error::InvalidRecord`] instead of being silently dropped.

use crate::{
    config::database,
    entities::{
        Budget as BudgetEntity, ChildMembership as MembershipEntity, Expense as ExpenseEntity,
        MoneyRequest as RequestEntity, User as UserEntity, budget, child_membership, expense,
        money_request, user,
    },
    errors::{Error, Result},
    models::{
        Budget, ChildMembership, Expense, ExpenseCategory, ExpenseOwner, MoneyRequest,
        RequestStatus, UserProfile,
    },
    store::DocumentStore,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    QueryOrder, Set,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use tracing::{debug, warn};

/// Document store backed by a `SeaORM` connection.
#[derive(Debug)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    /// Wraps an existing connection. Tables must already exist.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Connects to `database_url` and creates any missing tables.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = database::create_connection(database_url).await?;
        database::create_tables(&db).await?;
        Ok(Self::new(db))
    }

    /// Underlying connection
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn invalid(collection: &'static str, id: &str, err: &Error) -> Error {
    Error::InvalidRecord {
        collection,
        id: id.to_string(),
        message: err.to_string(),
    }
}

fn user_from_model(model: user::Model) -> Result<UserProfile> {
    let role = model
        .role
        .parse()
        .map_err(|e| invalid("users", &model.uid, &e))?;
    Ok(UserProfile {
        uid: model.uid,
        email: model.email,
        display_name: model.display_name,
        role,
        parent_id: model.parent_id,
        created_at: model.created_at,
    })
}

fn membership_from_model(model: child_membership::Model) -> ChildMembership {
    ChildMembership {
        uid: model.child_id,
        email: model.email,
        display_name: model.display_name,
        created_at: model.created_at,
    }
}

fn expense_from_model(model: expense::Model) -> Result<Expense> {
    let owner = match model.attribution.as_str() {
        "parent" => ExpenseOwner::Parent {
            parent_id: model.owner_id,
        },
        "child" => ExpenseOwner::Child {
            child_id: model.owner_id,
            logged_by: model.logged_by,
        },
        other => {
            return Err(Error::InvalidRecord {
                collection: "expenses",
                id: model.id,
                message: format!("unknown attribution '{other}'"),
            });
        }
    };

    let category = if model.category.trim().is_empty() {
        None
    } else {
        match model.category.parse::<ExpenseCategory>() {
            Ok(category) => Some(category),
            Err(_) => {
                warn!(
                    "Expense {} has unrecognised category '{}', treating as uncategorised",
                    model.id, model.category
                );
                None
            }
        }
    };

    Ok(Expense {
        id: model.id,
        owner,
        amount: model.amount,
        category,
        description: model.description,
        date: model.date,
        created_at: model.created_at,
    })
}

fn budget_from_model(model: budget::Model) -> Result<Budget> {
    let period = model
        .period
        .parse()
        .map_err(|e| invalid("budgets", &model.id, &e))?;
    Ok(Budget {
        id: model.id,
        owner_parent_id: model.owner_parent_id,
        child_id: model.child_id,
        amount: model.amount,
        period,
        start_date: model.start_date,
        end_date: model.end_date,
        created_at: model.created_at,
    })
}

fn request_from_model(model: money_request::Model) -> Result<MoneyRequest> {
    let status = model
        .status
        .parse()
        .map_err(|e| invalid("money_requests", &model.id, &e))?;
    Ok(MoneyRequest {
        id: model.id,
        child_id: model.child_id,
        parent_id: model.parent_id,
        amount: model.amount,
        reason: model.reason,
        status,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

impl DocumentStore for SeaOrmStore {
    async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>> {
        UserEntity::find_by_id(uid.to_string())
            .one(&self.db)
            .await?
            .map(user_from_model)
            .transpose()
    }

    async fn put_user(&self, profile: &UserProfile) -> Result<()> {
        let model = user::ActiveModel {
            uid: Set(profile.uid.clone()),
            email: Set(profile.email.clone()),
            display_name: Set(profile.display_name.clone()),
            role: Set(profile.role.as_str().to_string()),
            parent_id: Set(profile.parent_id.clone()),
            created_at: Set(profile.created_at),
        };

        UserEntity::insert(model)
            .on_conflict(
                OnConflict::column(user::Column::Uid)
                    .update_columns([
                        user::Column::Email,
                        user::Column::DisplayName,
                        user::Column::Role,
                        user::Column::ParentId,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        debug!("Wrote users/{}", profile.uid);
        Ok(())
    }

    async fn update_display_name(&self, uid: &str, display_name: &str) -> Result<()> {
        let result = UserEntity::update_many()
            .col_expr(user::Column::DisplayName, Expr::value(display_name))
            .filter(user::Column::Uid.eq(uid))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(Error::not_found("user", uid));
        }
        Ok(())
    }

    async fn delete_user(&self, uid: &str) -> Result<()> {
        UserEntity::delete_by_id(uid.to_string())
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn put_membership(&self, parent_id: &str, membership: &ChildMembership) -> Result<()> {
        let model = child_membership::ActiveModel {
            parent_id: Set(parent_id.to_string()),
            child_id: Set(membership.uid.clone()),
            email: Set(membership.email.clone()),
            display_name: Set(membership.display_name.clone()),
            created_at: Set(membership.created_at),
        };

        MembershipEntity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    child_membership::Column::ParentId,
                    child_membership::Column::ChildId,
                ])
                .update_columns([
                    child_membership::Column::Email,
                    child_membership::Column::DisplayName,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        debug!("Wrote users/{parent_id}/children/{}", membership.uid);
        Ok(())
    }

    async fn list_memberships(&self, parent_id: &str) -> Result<Vec<ChildMembership>> {
        let models = MembershipEntity::find()
            .filter(child_membership::Column::ParentId.eq(parent_id))
            .order_by_asc(child_membership::Column::CreatedAt)
            .order_by_asc(child_membership::Column::ChildId)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(membership_from_model).collect())
    }

    async fn get_membership(
        &self,
        parent_id: &str,
        child_id: &str,
    ) -> Result<Option<ChildMembership>> {
        let model = MembershipEntity::find_by_id((parent_id.to_string(), child_id.to_string()))
            .one(&self.db)
            .await?;
        Ok(model.map(membership_from_model))
    }

    async fn insert_expense(&self, expense: &Expense) -> Result<()> {
        let logged_by = match &expense.owner {
            ExpenseOwner::Parent { .. } => None,
            ExpenseOwner::Child { logged_by, .. } => logged_by.clone(),
        };
        let model = expense::ActiveModel {
            id: Set(expense.id.clone()),
            owner_id: Set(expense.owner.owner_id().to_string()),
            attribution: Set(expense.owner.attribution().to_string()),
            logged_by: Set(logged_by),
            amount: Set(expense.amount),
            category: Set(expense
                .category
                .map(|c| c.as_str().to_string())
                .unwrap_or_default()),
            description: Set(expense.description.clone()),
            date: Set(expense.date),
            created_at: Set(expense.created_at),
        };

        ExpenseEntity::insert(model)
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn expenses_by_owner(&self, owner_id: &str) -> Result<Vec<Expense>> {
        ExpenseEntity::find()
            .filter(expense::Column::OwnerId.eq(owner_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(expense_from_model)
            .collect()
    }

    async fn insert_budget(&self, budget: &Budget) -> Result<()> {
        let model = budget::ActiveModel {
            id: Set(budget.id.clone()),
            owner_parent_id: Set(budget.owner_parent_id.clone()),
            child_id: Set(budget.child_id.clone()),
            amount: Set(budget.amount),
            period: Set(budget.period.as_str().to_string()),
            start_date: Set(budget.start_date),
            end_date: Set(budget.end_date),
            created_at: Set(budget.created_at),
        };

        BudgetEntity::insert(model)
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn budgets_for_child(&self, child_id: &str) -> Result<Vec<Budget>> {
        BudgetEntity::find()
            .filter(budget::Column::ChildId.eq(child_id))
            .order_by_desc(budget::Column::StartDate)
            .order_by_asc(budget::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(budget_from_model)
            .collect()
    }

    async fn insert_request(&self, request: &MoneyRequest) -> Result<()> {
        let model = money_request::ActiveModel {
            id: Set(request.id.clone()),
            child_id: Set(request.child_id.clone()),
            parent_id: Set(request.parent_id.clone()),
            amount: Set(request.amount),
            reason: Set(request.reason.clone()),
            status: Set(request.status.as_str().to_string()),
            created_at: Set(request.created_at),
            updated_at: Set(request.updated_at),
        };

        RequestEntity::insert(model)
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn get_request(&self, id: &str) -> Result<Option<MoneyRequest>> {
        RequestEntity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .map(request_from_model)
            .transpose()
    }

    async fn resolve_pending_request(
        &self,
        id: &str,
        status: RequestStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        // Conditional update: only a still-pending row is touched
        let result = RequestEntity::update_many()
            .col_expr(money_request::Column::Status, Expr::value(status.as_str()))
            .col_expr(money_request::Column::UpdatedAt, Expr::value(updated_at))
            .filter(money_request::Column::Id.eq(id))
            .filter(money_request::Column::Status.eq(RequestStatus::Pending.as_str()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn requests_for_parent(&self, parent_id: &str) -> Result<Vec<MoneyRequest>> {
        RequestEntity::find()
            .filter(money_request::Column::ParentId.eq(parent_id))
            .order_by_desc(money_request::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(request_from_model)
            .collect()
    }

    async fn requests_for_child(&self, child_id: &str) -> Result<Vec<MoneyRequest>> {
        RequestEntity::find()
            .filter(money_request::Column::ChildId.eq(child_id))
            .order_by_desc(money_request::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(request_from_model)
            .collect()
    }
}
