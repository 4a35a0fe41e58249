//! Shared test utilities for the loan ledger.
//!
//! This module provides common helper functions for setting up test databases
//! and creating users, loans and payments with sensible defaults.

use crate::{
    config::users::UserConfig,
    core::{
        emi::EmiPayment,
        identity::Identity,
        loan::{self, LoanApplication},
        user,
    },
    entities,
    entities::user::Role,
    errors::Result,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test user with the given email and role.
pub async fn create_test_user(
    db: &DatabaseConnection,
    email: &str,
    role: Role,
) -> Result<entities::user::Model> {
    user::create_user(
        db,
        &UserConfig {
            email: email.to_string(),
            first_name: Some("Test".to_string()),
            last_name: None,
            role,
        },
    )
    .await
}

/// The identity a stored user would authenticate as.
pub fn identity_for(user: &entities::user::Model) -> Identity {
    Identity::new(user.id, user.email.clone(), user.role)
}

/// A `PERSONAL` loan application with sensible defaults.
///
/// # Defaults
/// * `principal`: 100000
/// * `interest_rate`: 7.5
/// * `tenure_months`: 24
pub fn personal_loan(user_id: i64) -> LoanApplication {
    LoanApplication {
        user_id,
        loan_type: "PERSONAL".to_string(),
        principal: dec!(100000),
        interest_rate: dec!(7.5),
        tenure_months: 24,
    }
}

/// A card payment for `amount`, optionally booked against a month and year.
pub fn card_payment(amount: Decimal, month: Option<u32>, year: Option<i32>) -> EmiPayment {
    EmiPayment {
        amount,
        payment_method: "CARD".to_string(),
        month,
        year,
    }
}

/// Applies for the default [`personal_loan`] as `borrower`.
pub async fn apply_test_loan(
    db: &DatabaseConnection,
    borrower: &entities::user::Model,
) -> Result<entities::loan::Model> {
    loan::apply_loan(db, personal_loan(borrower.id), &identity_for(borrower)).await
}

/// Creates a database with one borrower and one admin.
/// Returns (db, borrower, admin).
pub async fn setup_with_users() -> Result<(
    DatabaseConnection,
    entities::user::Model,
    entities::user::Model,
)> {
    let db = setup_test_db().await?;
    let borrower = create_test_user(&db, "borrower@example.com", Role::User).await?;
    let admin = create_test_user(&db, "admin@example.com", Role::Admin).await?;
    Ok((db, borrower, admin))
}

/// Creates a database with a borrower whose default loan is already approved.
/// Returns (db, borrower, admin, loan). The loan has 24 EMIs of 4499.96.
pub async fn setup_with_approved_loan() -> Result<(
    DatabaseConnection,
    entities::user::Model,
    entities::user::Model,
    entities::loan::Model,
)> {
    let (db, borrower, admin) = setup_with_users().await?;
    let pending = apply_test_loan(&db, &borrower).await?;
    let approved = loan::approve_loan(&db, pending.id, &identity_for(&admin)).await?;
    Ok((db, borrower, admin, approved))
}
