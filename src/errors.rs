//! Unified error type for the loan ledger.
//!
//! Every domain-rule violation detected by the engine surfaces as its own named
//! variant. Store failures are wrapped unchanged in [`Error::Storage`] and are
//! never retried here.

use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

use crate::entities::loan::LoanStatus;

/// The kind of record a lookup missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A row in `users`
    User,
    /// A row in `loans`
    Loan,
    /// A row in `emis`
    Emi,
    /// A row in `transactions`
    Transaction,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::User => "User",
            Self::Loan => "Loan",
            Self::Emi => "EMI",
            Self::Transaction => "Transaction",
        };
        f.write_str(name)
    }
}

/// Transport-agnostic classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Role or ownership check failed, or no caller identity
    Unauthorized,
    /// Lookup miss
    NotFound,
    /// The request itself is invalid
    BadRequest,
    /// The request conflicts with the current ledger state
    Conflict,
    /// Infrastructure or configuration failure
    ServerError,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Invalid authentication. Please log in again.")]
    Unauthenticated,

    #[error("{entity} not found with ID: {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("User {user_id} already has an active loan of type {loan_type}")]
    DuplicateActiveLoan { user_id: i64, loan_type: String },

    #[error("Loan {loan_id} is already {status}")]
    AlreadyApproved { loan_id: i64, status: LoanStatus },

    #[error("EMI {emi_id} has already been paid")]
    AlreadyPaid { emi_id: i64 },

    #[error("Incorrect payment amount {provided}, the exact EMI amount is {expected}")]
    InvalidPaymentAmount { expected: Decimal, provided: Decimal },

    #[error("Invalid payment month: {month}")]
    InvalidPaymentPeriod { month: u32 },

    #[error("Invalid loan terms: {message}")]
    InvalidLoanTerms { message: String },

    #[error("Loan tenure must be greater than 0, got {tenure}")]
    InvalidTenure { tenure: i32 },

    #[error("EMI calculation failed: {message}")]
    CalculationError { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] sea_orm::DbErr),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Builds a [`Error::NotFound`] for the given entity and id.
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Builds a [`Error::Unauthorized`] with a human-readable reason.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Maps the error onto the status category a transport layer reports.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthorized { .. } | Self::Unauthenticated => ErrorCategory::Unauthorized,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::DuplicateActiveLoan { .. }
            | Self::AlreadyApproved { .. }
            | Self::AlreadyPaid { .. } => ErrorCategory::Conflict,
            Self::InvalidPaymentAmount { .. }
            | Self::InvalidPaymentPeriod { .. }
            | Self::InvalidLoanTerms { .. }
            | Self::InvalidTenure { .. } => ErrorCategory::BadRequest,
            Self::CalculationError { .. }
            | Self::Storage(_)
            | Self::Config { .. }
            | Self::Io(_)
            | Self::EnvVar(_) => ErrorCategory::ServerError,
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_not_found_message_names_entity_and_id() {
        let err = Error::not_found(EntityKind::Emi, 42);
        assert_eq!(err.to_string(), "EMI not found with ID: 42");
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            Error::unauthorized("admins only").category(),
            ErrorCategory::Unauthorized
        );
        assert_eq!(Error::Unauthenticated.category(), ErrorCategory::Unauthorized);
        assert_eq!(
            Error::AlreadyPaid { emi_id: 1 }.category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            Error::AlreadyApproved {
                loan_id: 1,
                status: LoanStatus::Approved
            }
            .category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            Error::InvalidPaymentAmount {
                expected: dec!(4500.00),
                provided: dec!(4500.01)
            }
            .category(),
            ErrorCategory::BadRequest
        );
        assert_eq!(
            Error::CalculationError {
                message: "degenerate".to_string()
            }
            .category(),
            ErrorCategory::ServerError
        );
        assert_eq!(
            Error::Storage(sea_orm::DbErr::Custom("boom".to_string())).category(),
            ErrorCategory::ServerError
        );
    }

    #[test]
    fn test_invalid_payment_amount_message() {
        let err = Error::InvalidPaymentAmount {
            expected: dec!(4500.00),
            provided: dec!(4500.01),
        };
        assert_eq!(
            err.to_string(),
            "Incorrect payment amount 4500.01, the exact EMI amount is 4500.00"
        );
    }
}
