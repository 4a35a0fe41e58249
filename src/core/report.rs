//! Repayment statements.
//!
//! A statement summarizes one loan from its EMI schedule: how many installments
//! are paid, how much money that covers, what is still owed and what falls due
//! next. All functions return structured data. Formatting for display is a
//! separate step.

use crate::{
    core::{emi, loan},
    entities::{emi as emi_entity, emi::EmiStatus, loan as loan_entity},
    errors::Result,
};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::DatabaseConnection;

/// Repayment progress of one loan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanStatement {
    /// The loan being reported on
    pub loan: loan_entity::Model,
    /// Number of EMIs scheduled so far
    pub total_emis: usize,
    pub paid_emis: usize,
    pub pending_emis: usize,
    /// Sum of paid EMI amounts
    pub amount_paid: Decimal,
    /// Sum of pending EMI amounts
    pub amount_outstanding: Decimal,
    /// Earliest pending EMI, None once everything is paid
    pub next_due: Option<emi_entity::Model>,
}

impl LoanStatement {
    /// Paid share of the schedule as a percentage (0-100).
    #[must_use]
    pub fn progress_percent(&self) -> Decimal {
        if self.total_emis == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.paid_emis) * Decimal::ONE_HUNDRED / Decimal::from(self.total_emis))
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
    }
}

/// Builds the statement of a loan from its EMIs.
///
/// # Arguments
/// * `db` - Database connection
/// * `loan_id` - ID of the loan to report on
///
/// # Errors
/// * [`crate::errors::Error::NotFound`] - no loan with this id
pub async fn generate_loan_statement(
    db: &DatabaseConnection,
    loan_id: i64,
) -> Result<LoanStatement> {
    let loan = loan::get_loan_by_id(db, loan_id).await?;
    let emis = emi::get_emis_by_loan_id(db, loan_id).await?;

    let (paid, pending): (Vec<_>, Vec<_>) =
        emis.into_iter().partition(|e| e.status == EmiStatus::Paid);

    let amount_paid = paid.iter().map(|e| e.emi_amount).sum();
    let amount_outstanding = pending.iter().map(|e| e.emi_amount).sum();

    Ok(LoanStatement {
        loan,
        total_emis: paid.len() + pending.len(),
        paid_emis: paid.len(),
        pending_emis: pending.len(),
        amount_paid,
        amount_outstanding,
        next_due: pending.into_iter().min_by_key(|e| e.due_date),
    })
}

/// Generates a progress bar string like `[████░░░░░░] 40.0%`.
#[must_use]
pub fn format_progress_bar(paid: usize, total: usize, bar_length: Option<usize>) -> String {
    let length = bar_length.unwrap_or(10);
    let filled = if total == 0 {
        0
    } else {
        (paid.min(total) * length + total / 2) / total
    };
    let empty = length.saturating_sub(filled);

    let percent = if total == 0 {
        Decimal::ZERO
    } else {
        (Decimal::from(paid) * Decimal::ONE_HUNDRED / Decimal::from(total))
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
    };

    format!("[{}{}] {percent:.1}%", "█".repeat(filled), "░".repeat(empty))
}

/// Renders a statement as plain text.
#[must_use]
pub fn format_loan_statement(statement: &LoanStatement) -> String {
    let loan = &statement.loan;
    let mut out = format!(
        "Loan #{} ({}) - {}\n\
         Principal: {:.2} at {}% for {} months\n\
         EMI: {:.2} | Total repayable: {:.2}\n\
         Paid: {}/{} {}\n\
         Amount paid: {:.2} | Outstanding: {:.2}\n",
        loan.id,
        loan.loan_type,
        loan.status,
        loan.principal,
        loan.interest_rate,
        loan.tenure_months,
        loan.emi_amount,
        loan.total_repayable,
        statement.paid_emis,
        statement.total_emis,
        format_progress_bar(statement.paid_emis, statement.total_emis, None),
        statement.amount_paid,
        statement.amount_outstanding,
    );

    match &statement.next_due {
        Some(next) => out.push_str(&format!(
            "Next EMI: #{} of {:.2} due {}",
            next.id,
            next.emi_amount,
            next.due_date.format("%Y-%m-%d")
        )),
        None => out.push_str("Next EMI: none"),
    }
    out
}
