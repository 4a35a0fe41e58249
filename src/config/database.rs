//! Database configuration module for the loan ledger.
//!
//! This module handles the ledger store connection and table creation using `SeaORM`.
//! Tables are generated with `Schema::create_table_from_entity`, so the schema,
//! including the foreign keys between users, loans, EMIs and transactions, always
//! matches the entity definitions.

use crate::entities::{Emi, Loan, Transaction, User};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityName, EntityTrait, Schema};
use std::path::Path;
use tracing::{debug, info};

/// Fallback store used when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/loan_ledger.sqlite?mode=rwc";

/// Gets the database URL from the environment or returns the default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the ledger store named by `DATABASE_URL`.
///
/// Falls back to a default local `SQLite` file if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    ensure_sqlite_parent_dir(&database_url)?;
    info!("Connecting to ledger store at {database_url}");

    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates all ledger tables that do not exist yet.
///
/// Tables are created parent-first (users, loans, emis, transactions) so the
/// foreign keys always reference an existing table.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    create_table(db, User).await?;
    create_table(db, Loan).await?;
    create_table(db, Emi).await?;
    create_table(db, Transaction).await?;
    Ok(())
}

/// Creates the directory holding a file-backed `SQLite` store.
fn ensure_sqlite_parent_dir(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = rest.split('?').next().unwrap_or(rest);

    match Path::new(file).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)?,
        _ => {}
    }
    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();

    debug!("Ensuring table {} exists", entity.table_name());
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        emi::Model as EmiModel, loan::Model as LoanModel, transaction::Model as TransactionModel,
        user::Model as UserModel,
    };
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<UserModel> = User::find().limit(1).all(&db).await?;
        let _: Vec<LoanModel> = Loan::find().limit(1).all(&db).await?;
        let _: Vec<EmiModel> = Emi::find().limit(1).all(&db).await?;
        let _: Vec<TransactionModel> = Transaction::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[test]
    fn test_ensure_sqlite_parent_dir_ignores_memory_and_other_backends() -> Result<()> {
        ensure_sqlite_parent_dir("sqlite::memory:")?;
        ensure_sqlite_parent_dir("postgres://localhost/ledger")?;
        ensure_sqlite_parent_dir("sqlite://ledger.sqlite?mode=rwc")?;
        Ok(())
    }

    #[test]
    fn test_ensure_sqlite_parent_dir_creates_directory() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("loan_ledger_{}", std::process::id()));
        let url = format!("sqlite://{}/ledger.sqlite?mode=rwc", dir.display());

        ensure_sqlite_parent_dir(&url)?;
        assert!(dir.is_dir());

        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;

        let _: Vec<LoanModel> = Loan::find().limit(1).all(&db).await?;
        Ok(())
    }
}
