//! Transaction entity - Append-only ledger of money received against EMIs.
//!
//! Each transaction has an `emi_id`, amount, payment method, timestamp and status.
//! Rows are inserted once and never updated or deleted.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Outcome recorded for a transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    /// Written by an EMI payment
    #[sea_orm(string_value = "SUCCESS")]
    Success,
    #[sea_orm(string_value = "FAILED")]
    Failed,
    /// Written by the administrative bookkeeping path
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the EMI this transaction settles
    pub emi_id: i64,
    #[sea_orm(column_type = "Decimal(Some((15, 2)))")]
    pub transaction_amount: Decimal,
    /// Free text such as `"CARD"` or `"BANK_TRANSFER"`
    pub payment_method: String,
    pub transaction_date: DateTimeUtc,
    pub transaction_status: TransactionStatus,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one EMI
    #[sea_orm(
        belongs_to = "super::emi::Entity",
        from = "Column::EmiId",
        to = "super::emi::Column::Id"
    )]
    Emi,
}

impl Related<super::emi::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Emi.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
