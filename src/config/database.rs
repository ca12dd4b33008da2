//! Database configuration module for `RupeeWise`.
//!
//! This module handles `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs. Creation is idempotent (`IF NOT EXISTS`) so the bootstrap binary
//! can run against an existing database.

use crate::entities::{Budget, ChildMembership, Expense, MoneyRequest, User};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::path::Path;
use tracing::debug;

/// Default database location when neither the settings file nor the
/// environment provides one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/rupeewise.sqlite?mode=rwc";

/// Establishes a connection to the database at `database_url`.
///
/// For file-backed `SQLite` urls the parent directory is created first.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    if let Some(path) = sqlite_file_path(database_url) {
        if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
    }
    debug!("Connecting to database at {database_url}");
    Database::connect(database_url).await.map_err(Into::into)
}

/// File path of a `sqlite:` url, `None` for in-memory and non-SQLite urls.
fn sqlite_file_path(database_url: &str) -> Option<&str> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.contains(":memory:") || path == "memory" {
        return None;
    }
    Some(path)
}

/// Creates all household tables if they do not exist yet.
pub async fn create_tables<C: ConnectionTrait>(db: &C) -> Result<()> {
    create_table(db, User).await?;
    create_table(db, ChildMembership).await?;
    create_table(db, Expense).await?;
    create_table(db, Budget).await?;
    create_table(db, MoneyRequest).await?;
    Ok(())
}

async fn create_table<C, E>(db: &C, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}
