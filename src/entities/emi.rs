//! EMI entity - One scheduled monthly installment of a loan.
//!
//! EMIs are created in a batch when a loan is approved (or one at a time by an
//! administrator), start `PENDING`/`DUE`, and are mutated exactly once when paid.
//! `PAID` is terminal.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Whether the installment is still owed
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "UPPERCASE")]
pub enum EmiStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "PAID")]
    Paid,
}

/// Settlement state reported alongside [`EmiStatus`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "DUE")]
    Due,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
}

/// EMI database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "emis")]
pub struct Model {
    /// Unique identifier for the EMI
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the loan this installment belongs to
    pub loan_id: i64,
    /// Amount due, equal to the loan's EMI amount when generated at approval
    #[sea_orm(column_type = "Decimal(Some((15, 2)))")]
    pub emi_amount: Decimal,
    pub due_date: DateTimeUtc,
    pub status: EmiStatus,
    pub payment_status: PaymentStatus,
    /// When the installment was paid, None while pending
    pub paid_on: Option<DateTimeUtc>,
    /// English month name the payment was booked against (e.g. `"May"`)
    pub payment_month: Option<String>,
    pub payment_year: Option<i32>,
}

/// Defines relationships between EMI and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each EMI belongs to one loan
    #[sea_orm(
        belongs_to = "super::loan::Entity",
        from = "Column::LoanId",
        to = "super::loan::Column::Id"
    )]
    Loan,
    /// One EMI has many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::loan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Loan.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
