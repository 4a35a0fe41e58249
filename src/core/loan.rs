//! Loan lifecycle - application, approval and loan queries.
//!
//! Loans move `PENDING` -> `APPROVED` -> `COMPLETED` and never back. This module
//! owns the first transition and the EMI schedule created with it; the last one
//! happens in [`crate::core::emi::pay_emi`] when no installment is left pending.
//!
//! Every multi-step mutation runs in a single database transaction. Its first
//! statement takes the write lock on the row the operation hinges on, so two
//! concurrent callers are serialized and the later one sees the committed state.

use crate::{
    core::{amortization, identity::Identity, user},
    entities::{
        Emi, Loan, emi,
        emi::{EmiStatus, PaymentStatus},
        loan,
        loan::LoanStatus,
        user::Role,
    },
    errors::{EntityKind, Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// A borrower's request for a new loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanApplication {
    /// Must match the caller applying
    pub user_id: i64,
    /// Free text such as `"PERSONAL"`, one active loan per type
    pub loan_type: String,
    /// At most 13 integer digits and 2 decimals
    pub principal: Decimal,
    /// Annual rate in percent
    pub interest_rate: Decimal,
    /// Number of monthly installments
    pub tenure_months: i32,
}

/// Records a new `PENDING` loan for the calling borrower.
///
/// Only callers with the `USER` role may apply, and only for themselves. A user
/// may hold at most one active (pending or approved) loan per loan type. The
/// loan is stored with zero EMI and zero total repayable; both are fixed at
/// approval.
///
/// # Errors
/// * [`Error::Unauthorized`] - caller is not a `USER` or applies for someone else
/// * [`Error::NotFound`] - the caller has no stored user record
/// * [`Error::DuplicateActiveLoan`] - an active loan of the same type exists
/// * [`Error::InvalidLoanTerms`] - non-positive principal or tenure, negative rate,
///   or blank loan type
#[instrument(skip(db, application, caller), fields(caller = caller.user_id))]
pub async fn apply_loan(
    db: &DatabaseConnection,
    application: LoanApplication,
    caller: &Identity,
) -> Result<loan::Model> {
    caller.require_role(Role::User, "apply for a loan")?;
    if application.user_id != caller.user_id {
        return Err(Error::unauthorized("You can only apply for your own loan"));
    }

    let txn = db.begin().await?;

    let borrower = user::resolve_caller(&txn, caller).await?;
    if borrower.id != application.user_id {
        return Err(Error::unauthorized("You can only apply for your own loan"));
    }
    user::lock_user_row(&txn, borrower.id).await?;

    let loan_type = application.loan_type.trim().to_string();
    if has_active_loan(&txn, borrower.id, &loan_type).await? {
        return Err(Error::DuplicateActiveLoan {
            user_id: borrower.id,
            loan_type,
        });
    }

    validate_terms(&application)?;

    let loan = loan::ActiveModel {
        user_id: Set(borrower.id),
        principal: Set(application.principal),
        interest_rate: Set(application.interest_rate),
        tenure_months: Set(application.tenure_months),
        loan_type: Set(loan_type),
        emi_amount: Set(Decimal::ZERO),
        total_repayable: Set(Decimal::ZERO),
        status: Set(LoanStatus::Pending),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(
        "Loan {} ({}) of {} applied for by user {}",
        loan.id, loan.loan_type, loan.principal, loan.user_id
    );
    Ok(loan)
}

/// Approves a pending loan and materializes its EMI schedule.
///
/// The EMI amount and total repayable are computed, the loan is moved to
/// `APPROVED`, and exactly `tenure_months` EMIs are inserted, due one to
/// `tenure_months` calendar months from now. All of it commits together or not
/// at all.
///
/// # Errors
/// * [`Error::Unauthorized`] - caller is not an `ADMIN`
/// * [`Error::NotFound`] - no loan with this id
/// * [`Error::AlreadyApproved`] - the loan is already approved or completed
/// * [`Error::InvalidTenure`] / [`Error::CalculationError`] - the terms do not
///   produce a positive EMI
#[instrument(skip(db, caller), fields(caller = caller.user_id))]
pub async fn approve_loan(
    db: &DatabaseConnection,
    loan_id: i64,
    caller: &Identity,
) -> Result<loan::Model> {
    caller.require_role(Role::Admin, "approve loans")?;

    let txn = db.begin().await?;

    if !lock_loan_row(&txn, loan_id).await? {
        return Err(Error::not_found(EntityKind::Loan, loan_id));
    }
    let loan = find_loan(&txn, loan_id).await?;

    if loan.status != LoanStatus::Pending {
        return Err(Error::AlreadyApproved {
            loan_id,
            status: loan.status,
        });
    }

    let terms =
        amortization::compute_terms(loan.principal, loan.interest_rate, loan.tenure_months)?;
    if terms.emi_amount <= Decimal::ZERO {
        return Err(Error::CalculationError {
            message: format!(
                "EMI for loan {loan_id} came out as {}. Please check loan details.",
                terms.emi_amount
            ),
        });
    }

    let approved = Loan::update_many()
        .set(loan::ActiveModel {
            status: Set(LoanStatus::Approved),
            emi_amount: Set(terms.emi_amount),
            total_repayable: Set(terms.total_repayable),
            ..Default::default()
        })
        .filter(loan::Column::Id.eq(loan_id))
        .filter(loan::Column::Status.eq(LoanStatus::Pending))
        .exec(&txn)
        .await?;

    if approved.rows_affected == 0 {
        let current = find_loan(&txn, loan_id).await?;
        warn!("Loan {loan_id} changed to {} during approval", current.status);
        return Err(Error::AlreadyApproved {
            loan_id,
            status: current.status,
        });
    }

    let emi_count =
        generate_emi_schedule(&txn, loan_id, terms.emi_amount, loan.tenure_months, Utc::now())
            .await?;

    let loan = find_loan(&txn, loan_id).await?;
    txn.commit().await?;

    info!(
        "Loan {loan_id} approved: EMI {} x {emi_count}, total repayable {}",
        loan.emi_amount, loan.total_repayable
    );
    Ok(loan)
}

/// Inserts one `PENDING`/`DUE` EMI per month of the tenure.
///
/// Returns the number of EMIs inserted.
async fn generate_emi_schedule<C>(
    db: &C,
    loan_id: i64,
    emi_amount: Decimal,
    tenure_months: i32,
    approved_at: DateTime<Utc>,
) -> Result<usize>
where
    C: ConnectionTrait,
{
    let installments: Vec<emi::ActiveModel> =
        amortization::schedule_due_dates(approved_at, tenure_months)?
            .into_iter()
            .map(|due_date| emi::ActiveModel {
                loan_id: Set(loan_id),
                emi_amount: Set(emi_amount),
                due_date: Set(due_date),
                status: Set(EmiStatus::Pending),
                payment_status: Set(PaymentStatus::Due),
                paid_on: Set(None),
                payment_month: Set(None),
                payment_year: Set(None),
                ..Default::default()
            })
            .collect();

    let count = installments.len();
    Emi::insert_many(installments).exec(db).await?;
    Ok(count)
}

/// Retrieves the approved loans, the view open to every caller.
pub async fn get_approved_loans(db: &DatabaseConnection) -> Result<Vec<loan::Model>> {
    get_loans_by_status(db, LoanStatus::Approved).await
}

/// Retrieves every loan whatever its status. Admin only.
pub async fn get_all_loans(db: &DatabaseConnection, caller: &Identity) -> Result<Vec<loan::Model>> {
    caller.require_role(Role::Admin, "view all loans")?;

    Loan::find()
        .order_by_asc(loan::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all loans in one status.
pub async fn get_loans_by_status(
    db: &DatabaseConnection,
    status: LoanStatus,
) -> Result<Vec<loan::Model>> {
    Loan::find()
        .filter(loan::Column::Status.eq(status))
        .order_by_asc(loan::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all loans owned by a user, oldest first.
pub async fn get_loans_by_user(db: &DatabaseConnection, user_id: i64) -> Result<Vec<loan::Model>> {
    Loan::find()
        .filter(loan::Column::UserId.eq(user_id))
        .order_by_asc(loan::Column::CreatedAt)
        .order_by_asc(loan::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a loan by id. Reads are not restricted to the owner.
pub async fn get_loan_by_id(db: &DatabaseConnection, loan_id: i64) -> Result<loan::Model> {
    find_loan(db, loan_id).await
}

/// Finds a user's loan of a given type in a given status, if any.
pub async fn find_loan_by_user_type_and_status(
    db: &DatabaseConnection,
    user_id: i64,
    loan_type: &str,
    status: LoanStatus,
) -> Result<Option<loan::Model>> {
    Loan::find()
        .filter(loan::Column::UserId.eq(user_id))
        .filter(loan::Column::LoanType.eq(loan_type))
        .filter(loan::Column::Status.eq(status))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Whether the user holds a pending or approved loan of this type.
pub async fn has_active_loan<C>(db: &C, user_id: i64, loan_type: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let active = Loan::find()
        .filter(loan::Column::UserId.eq(user_id))
        .filter(loan::Column::LoanType.eq(loan_type))
        .filter(loan::Column::Status.is_in([LoanStatus::Pending, LoanStatus::Approved]))
        .count(db)
        .await?;
    Ok(active > 0)
}

/// Loads a loan or fails with [`Error::NotFound`].
pub(crate) async fn find_loan<C>(db: &C, loan_id: i64) -> Result<loan::Model>
where
    C: ConnectionTrait,
{
    Loan::find_by_id(loan_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(EntityKind::Loan, loan_id))
}

/// Takes the write lock on a loan row by rewriting its status to itself.
///
/// Returns false when the loan does not exist.
pub(crate) async fn lock_loan_row<C>(db: &C, loan_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = Loan::update_many()
        .col_expr(loan::Column::Status, Expr::col(loan::Column::Status).into())
        .filter(loan::Column::Id.eq(loan_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

fn validate_terms(application: &LoanApplication) -> Result<()> {
    if application.principal <= Decimal::ZERO || application.interest_rate < Decimal::ZERO {
        return Err(Error::InvalidLoanTerms {
            message: "Invalid loan amount or interest rate.".to_string(),
        });
    }
    if !amortization::fits_column(
        application.principal,
        amortization::MONEY_PRECISION,
        amortization::MONEY_SCALE,
    ) {
        return Err(Error::InvalidLoanTerms {
            message: format!(
                "Loan amount {} must have at most 13 integer digits and 2 decimals",
                application.principal
            ),
        });
    }
    if !amortization::fits_column(
        application.interest_rate,
        amortization::RATE_PRECISION,
        amortization::RATE_SCALE,
    ) {
        return Err(Error::InvalidLoanTerms {
            message: format!(
                "Interest rate {} must have at most 3 integer digits and 2 decimals",
                application.interest_rate
            ),
        });
    }
    if application.tenure_months <= 0 {
        return Err(Error::InvalidLoanTerms {
            message: format!(
                "Loan tenure must be greater than 0, got {}",
                application.tenure_months
            ),
        });
    }
    if application.loan_type.trim().is_empty() {
        return Err(Error::InvalidLoanTerms {
            message: "Loan type cannot be empty".to_string(),
        });
    }
    Ok(())
}
