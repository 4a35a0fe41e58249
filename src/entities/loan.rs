//! Loan entity - One borrowing agreement between a user and the lender.
//!
//! A loan is created `PENDING` with zero EMI and zero total repayable. Approval
//! sets both amounts and moves it to `APPROVED`; paying its last EMI moves it to
//! `COMPLETED`. Loans are never deleted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a loan
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "UPPERCASE")]
pub enum LoanStatus {
    /// Applied for, awaiting admin approval
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Approved, EMI schedule generated
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    /// Every EMI has been paid
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
}

impl LoanStatus {
    /// Pending and approved loans block a new application of the same type.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Completed => "COMPLETED",
        })
    }
}

/// Loan database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "loans")]
pub struct Model {
    /// Unique identifier for the loan
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the user who owns the loan
    pub user_id: i64,
    /// Amount borrowed
    #[sea_orm(column_type = "Decimal(Some((15, 2)))")]
    pub principal: Decimal,
    /// Annual interest rate in percent (7.5 means 7.5%)
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub interest_rate: Decimal,
    /// Number of monthly installments
    pub tenure_months: i32,
    /// Free-text category such as `"PERSONAL"` or `"HOME"`
    pub loan_type: String,
    /// Equal monthly installment, zero until approval
    #[sea_orm(column_type = "Decimal(Some((15, 2)))")]
    pub emi_amount: Decimal,
    /// Principal plus interest, zero until approval
    #[sea_orm(column_type = "Decimal(Some((15, 2)))")]
    pub total_repayable: Decimal,
    pub status: LoanStatus,
    /// When the application was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Loan and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each loan belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// One loan has many EMIs
    #[sea_orm(has_many = "super::emi::Entity")]
    Emis,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::emi::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Emis.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
