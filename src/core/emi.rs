//! EMI processing - paying installments and reading the schedule.
//!
//! Paying an EMI is one unit of work: the installment flips to `PAID`/`COMPLETED`,
//! a `SUCCESS` transaction is appended to the ledger, and the loan is closed when
//! that was its last pending installment. The EMI row is write-locked first, so a
//! concurrent second payment of the same EMI waits and then fails with
//! [`Error::AlreadyPaid`].

use crate::{
    core::{
        amortization,
        identity::Identity,
        loan, transaction, user,
    },
    entities::{
        Emi, Loan, emi,
        emi::{EmiStatus, PaymentStatus},
        loan as loan_entity,
        loan::LoanStatus,
        transaction::TransactionStatus,
    },
    errors::{EntityKind, Error, Result},
};
use chrono::{DateTime, Datelike, Month, Months, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// A borrower's payment against one EMI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmiPayment {
    /// Must equal the EMI amount exactly
    pub amount: Decimal,
    /// Free text such as `"CARD"`
    pub payment_method: String,
    /// Month the payment is booked against, 1-12
    pub month: Option<u32>,
    /// Year the payment is booked against, used only together with `month`
    pub year: Option<i32>,
}

/// Everything a successful EMI payment wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmiPaymentOutcome {
    /// The EMI after payment
    pub emi: emi::Model,
    /// The `SUCCESS` transaction appended to the ledger
    pub transaction: crate::entities::transaction::Model,
    /// Loan status after the payment, `COMPLETED` if this was the last EMI
    pub loan_status: LoanStatus,
}

/// Adds one `PENDING`/`DUE` installment to a loan outside the approval schedule.
///
/// A completed loan is not reopened by this, and paying an installment added
/// to a loan that was never approved does not complete it.
///
/// # Errors
/// * [`Error::InvalidLoanTerms`] - `emi_amount` is not positive
/// * [`Error::NotFound`] - no loan with this id
pub async fn create_emi(
    db: &DatabaseConnection,
    loan_id: i64,
    emi_amount: Decimal,
    due_date: DateTime<Utc>,
) -> Result<emi::Model> {
    if emi_amount <= Decimal::ZERO {
        return Err(Error::InvalidLoanTerms {
            message: format!("EMI amount must be positive, got {emi_amount}"),
        });
    }
    if !amortization::fits_column(
        emi_amount,
        amortization::MONEY_PRECISION,
        amortization::MONEY_SCALE,
    ) {
        return Err(Error::InvalidLoanTerms {
            message: format!("EMI amount {emi_amount} does not fit DECIMAL(15,2)"),
        });
    }

    loan::find_loan(db, loan_id).await?;

    let installment = emi::ActiveModel {
        loan_id: Set(loan_id),
        emi_amount: Set(emi_amount),
        due_date: Set(due_date),
        status: Set(EmiStatus::Pending),
        payment_status: Set(PaymentStatus::Due),
        paid_on: Set(None),
        payment_month: Set(None),
        payment_year: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("EMI {} of {emi_amount} added to loan {loan_id}", installment.id);
    Ok(installment)
}

/// Pays an EMI on behalf of the borrower who owns its loan.
///
/// Checks run in this order: caller exists, EMI exists, caller owns the loan,
/// EMI not already paid, amount matches exactly, payment period is a real month.
/// When `month` and `year` are not both given the current UTC month and year
/// are recorded.
///
/// # Arguments
/// * `emi_id` - The installment to pay
/// * `payment` - Amount, method and optional booking period
/// * `caller` - Must be the loan's owner
///
/// # Errors
/// * [`Error::NotFound`] - caller or EMI does not exist
/// * [`Error::Unauthorized`] - caller does not own the loan
/// * [`Error::AlreadyPaid`] - the EMI is paid or already has a `SUCCESS` transaction
/// * [`Error::InvalidPaymentAmount`] - amount differs from the EMI amount
/// * [`Error::InvalidPaymentPeriod`] - month outside 1-12
#[instrument(skip(db, payment, caller), fields(caller = caller.user_id))]
pub async fn pay_emi(
    db: &DatabaseConnection,
    emi_id: i64,
    payment: EmiPayment,
    caller: &Identity,
) -> Result<EmiPaymentOutcome> {
    let txn = db.begin().await?;

    let payer = user::resolve_caller(&txn, caller).await?;

    if !lock_emi_row(&txn, emi_id).await? {
        return Err(Error::not_found(EntityKind::Emi, emi_id));
    }
    let installment = find_emi(&txn, emi_id).await?;
    let owning_loan = loan::find_loan(&txn, installment.loan_id).await?;

    if owning_loan.user_id != payer.id {
        warn!(
            "User {} tried to pay EMI {emi_id} of loan {} owned by user {}",
            payer.id, owning_loan.id, owning_loan.user_id
        );
        return Err(Error::unauthorized("You can only pay EMIs of your own loans"));
    }

    if installment.status == EmiStatus::Paid
        || transaction::has_successful_transaction(&txn, emi_id).await?
    {
        return Err(Error::AlreadyPaid { emi_id });
    }

    if payment.amount != installment.emi_amount {
        return Err(Error::InvalidPaymentAmount {
            expected: installment.emi_amount,
            provided: payment.amount,
        });
    }

    let now = Utc::now();
    let (month_name, year) = payment_period(&payment, now)?;

    let settled = Emi::update_many()
        .set(emi::ActiveModel {
            status: Set(EmiStatus::Paid),
            payment_status: Set(PaymentStatus::Completed),
            paid_on: Set(Some(now)),
            payment_month: Set(Some(month_name)),
            payment_year: Set(Some(year)),
            ..Default::default()
        })
        .filter(emi::Column::Id.eq(emi_id))
        .filter(emi::Column::Status.eq(EmiStatus::Pending))
        .exec(&txn)
        .await?;

    if settled.rows_affected == 0 {
        return Err(Error::AlreadyPaid { emi_id });
    }

    let receipt = transaction::record_transaction(
        &txn,
        emi_id,
        payment.amount,
        payment.payment_method,
        TransactionStatus::Success,
    )
    .await?;

    // Completion is decided under the loan row lock
    loan::lock_loan_row(&txn, owning_loan.id).await?;
    let remaining = count_pending_emis(&txn, owning_loan.id).await?;

    let mut loan_status = owning_loan.status;
    if remaining == 0 {
        let completed = Loan::update_many()
            .set(loan_entity::ActiveModel {
                status: Set(LoanStatus::Completed),
                ..Default::default()
            })
            .filter(loan_entity::Column::Id.eq(owning_loan.id))
            .filter(loan_entity::Column::Status.eq(LoanStatus::Approved))
            .exec(&txn)
            .await?;
        if completed.rows_affected > 0 {
            loan_status = LoanStatus::Completed;
        }
    }

    let installment = find_emi(&txn, emi_id).await?;
    txn.commit().await?;

    info!(
        "EMI {emi_id} of loan {} paid by user {} ({} pending)",
        owning_loan.id, payer.id, remaining
    );
    if loan_status == LoanStatus::Completed {
        info!("Loan {} completed", owning_loan.id);
    }

    Ok(EmiPaymentOutcome {
        emi: installment,
        transaction: receipt,
        loan_status,
    })
}

/// Retrieves an EMI by id.
pub async fn get_emi_by_id(db: &DatabaseConnection, emi_id: i64) -> Result<emi::Model> {
    find_emi(db, emi_id).await
}

/// Retrieves a loan's EMIs in due-date order.
pub async fn get_emis_by_loan_id(db: &DatabaseConnection, loan_id: i64) -> Result<Vec<emi::Model>> {
    Emi::find()
        .filter(emi::Column::LoanId.eq(loan_id))
        .order_by_asc(emi::Column::DueDate)
        .order_by_asc(emi::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves every EMI of every loan the caller owns.
pub async fn get_emi_history_for_user(
    db: &DatabaseConnection,
    caller: &Identity,
) -> Result<Vec<emi::Model>> {
    let borrower = user::resolve_caller(db, caller).await?;

    Emi::find()
        .inner_join(Loan)
        .filter(loan_entity::Column::UserId.eq(borrower.id))
        .order_by_asc(emi::Column::LoanId)
        .order_by_asc(emi::Column::DueDate)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all EMIs in one status across loans.
pub async fn get_emis_by_status(
    db: &DatabaseConnection,
    status: EmiStatus,
) -> Result<Vec<emi::Model>> {
    Emi::find()
        .filter(emi::Column::Status.eq(status))
        .order_by_asc(emi::Column::DueDate)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves one user's EMIs in one status.
pub async fn get_emis_for_user_by_status(
    db: &DatabaseConnection,
    user_id: i64,
    status: EmiStatus,
) -> Result<Vec<emi::Model>> {
    Emi::find()
        .inner_join(Loan)
        .filter(loan_entity::Column::UserId.eq(user_id))
        .filter(emi::Column::Status.eq(status))
        .order_by_asc(emi::Column::DueDate)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a loan's EMIs falling due within one calendar month (UTC).
///
/// # Errors
/// * [`Error::InvalidPaymentPeriod`] - `month` outside 1-12 or `year` out of range
pub async fn get_emis_due_in_month(
    db: &DatabaseConnection,
    loan_id: i64,
    year: i32,
    month: u32,
) -> Result<Vec<emi::Model>> {
    let first_day =
        NaiveDate::from_ymd_opt(year, month, 1).ok_or(Error::InvalidPaymentPeriod { month })?;
    let next_month = first_day
        .checked_add_months(Months::new(1))
        .ok_or(Error::InvalidPaymentPeriod { month })?;

    let start = first_day.and_time(NaiveTime::MIN).and_utc();
    let end = next_month.and_time(NaiveTime::MIN).and_utc();

    Emi::find()
        .filter(emi::Column::LoanId.eq(loan_id))
        .filter(emi::Column::DueDate.gte(start))
        .filter(emi::Column::DueDate.lt(end))
        .order_by_asc(emi::Column::DueDate)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Counts a loan's EMIs still `PENDING`.
pub async fn count_pending_emis<C>(db: &C, loan_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    Emi::find()
        .filter(emi::Column::LoanId.eq(loan_id))
        .filter(emi::Column::Status.eq(EmiStatus::Pending))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Loads an EMI or fails with [`Error::NotFound`].
pub(crate) async fn find_emi<C>(db: &C, emi_id: i64) -> Result<emi::Model>
where
    C: ConnectionTrait,
{
    Emi::find_by_id(emi_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(EntityKind::Emi, emi_id))
}

/// Takes the write lock on an EMI row by rewriting its status to itself.
///
/// Returns false when the EMI does not exist.
async fn lock_emi_row<C>(db: &C, emi_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = Emi::update_many()
        .col_expr(emi::Column::Status, Expr::col(emi::Column::Status).into())
        .filter(emi::Column::Id.eq(emi_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// English month name and year the payment is booked against.
fn payment_period(payment: &EmiPayment, now: DateTime<Utc>) -> Result<(String, i32)> {
    let (month, year) = match (payment.month, payment.year) {
        (Some(month), Some(year)) => (month, year),
        _ => (now.month(), now.year()),
    };

    let name = u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .ok_or(Error::InvalidPaymentPeriod { month })?;

    Ok((name.name().to_string(), year))
}
