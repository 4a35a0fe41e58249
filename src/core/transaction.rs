//! Ledger transactions - the append-only record of money received against EMIs.
//!
//! Rows are only ever inserted. A `SUCCESS` row is written by [`crate::core::emi::pay_emi`]
//! together with the EMI transition. [`process_transaction`] is the bookkeeping
//! path: it records a `COMPLETED` row and leaves the EMI untouched.

use crate::{
    core::emi,
    entities::{Emi, Transaction, emi as emi_entity, transaction, transaction::TransactionStatus},
    errors::{EntityKind, Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{PaginatorTrait, QueryOrder, Set, prelude::*};
use tracing::info;

/// Records a `COMPLETED` transaction against an EMI without changing the EMI.
///
/// The amount is not checked against the EMI amount.
///
/// # Arguments
/// * `emi_id` - The EMI the money is booked against
/// * `amount` - Amount received
/// * `payment_method` - Free text such as `"CARD"`
///
/// # Errors
/// * [`Error::NotFound`] - no EMI with this id
pub async fn process_transaction(
    db: &DatabaseConnection,
    emi_id: i64,
    amount: Decimal,
    payment_method: String,
) -> Result<transaction::Model> {
    emi::find_emi(db, emi_id).await?;

    let recorded =
        record_transaction(db, emi_id, amount, payment_method, TransactionStatus::Completed)
            .await?;

    info!(
        "Transaction {} of {amount} recorded against EMI {emi_id}",
        recorded.id
    );
    Ok(recorded)
}

/// Appends one transaction row stamped with the current time.
pub(crate) async fn record_transaction<C>(
    db: &C,
    emi_id: i64,
    amount: Decimal,
    payment_method: String,
    status: TransactionStatus,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    transaction::ActiveModel {
        emi_id: Set(emi_id),
        transaction_amount: Set(amount),
        payment_method: Set(payment_method),
        transaction_date: Set(Utc::now()),
        transaction_status: Set(status),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Retrieves every transaction recorded against any EMI of a loan, oldest first.
pub async fn get_transactions_by_loan_id(
    db: &DatabaseConnection,
    loan_id: i64,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .inner_join(Emi)
        .filter(emi_entity::Column::LoanId.eq(loan_id))
        .order_by_asc(transaction::Column::TransactionDate)
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the transactions recorded against one EMI, oldest first.
pub async fn get_transactions_by_emi_id(
    db: &DatabaseConnection,
    emi_id: i64,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::EmiId.eq(emi_id))
        .order_by_asc(transaction::Column::TransactionDate)
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a transaction by id.
pub async fn get_transaction_by_id(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<transaction::Model> {
    Transaction::find_by_id(transaction_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(EntityKind::Transaction, transaction_id))
}

/// Retrieves the whole ledger, oldest first.
pub async fn get_all_transactions(db: &DatabaseConnection) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Whether a `SUCCESS` transaction already exists for the EMI.
pub async fn has_successful_transaction<C>(db: &C, emi_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let count = Transaction::find()
        .filter(transaction::Column::EmiId.eq(emi_id))
        .filter(transaction::Column::TransactionStatus.eq(TransactionStatus::Success))
        .count(db)
        .await?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::emi::{get_emi_by_id, get_emis_by_loan_id, pay_emi};
    use crate::entities::emi::EmiStatus;
    use crate::entities::user::Role;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_process_transaction_leaves_emi_pending() -> Result<()> {
        let (db, _borrower, _admin, loan) = setup_with_approved_loan().await?;
        let first = get_emis_by_loan_id(&db, loan.id).await?.remove(0);

        let recorded = process_transaction(&db, first.id, dec!(100.50), "CASH".to_string()).await?;
        assert_eq!(recorded.emi_id, first.id);
        assert_eq!(recorded.transaction_amount, dec!(100.50));
        assert_eq!(recorded.payment_method, "CASH");
        assert_eq!(recorded.transaction_status, TransactionStatus::Completed);

        assert_eq!(get_emi_by_id(&db, first.id).await?.status, EmiStatus::Pending);
        assert_eq!(get_transaction_by_id(&db, recorded.id).await?, recorded);

        // Bookkeeping rows do not count as a settled payment
        assert!(!has_successful_transaction(&db, first.id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_process_transaction_missing_emi() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<emi_entity::Model>::new()])
            .into_connection();

        let result = process_transaction(&db, 404, dec!(10), "CARD".to_string()).await;
        assert!(matches!(
            result,
            Err(Error::NotFound {
                entity: EntityKind::Emi,
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_get_transaction_by_id_not_found() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<transaction::Model>::new()])
            .into_connection();

        let result = get_transaction_by_id(&db, 999).await;
        assert!(matches!(
            result,
            Err(Error::NotFound {
                entity: EntityKind::Transaction,
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_transactions_by_loan_only_cover_that_loan() -> Result<()> {
        let (db, borrower, admin, loan) = setup_with_approved_loan().await?;
        let other = create_test_user(&db, "second@example.com", Role::User).await?;
        let other_loan = apply_test_loan(&db, &other).await?;
        let other_loan = crate::core::loan::approve_loan(&db, other_loan.id, &identity_for(&admin))
            .await?;

        let ours = get_emis_by_loan_id(&db, loan.id).await?;
        let theirs = get_emis_by_loan_id(&db, other_loan.id).await?;

        let paid = pay_emi(
            &db,
            ours[0].id,
            card_payment(ours[0].emi_amount, None, None),
            &identity_for(&borrower),
        )
        .await?;
        process_transaction(&db, ours[1].id, dec!(5), "CASH".to_string()).await?;
        process_transaction(&db, theirs[0].id, dec!(7), "CASH".to_string()).await?;

        let ledger = get_transactions_by_loan_id(&db, loan.id).await?;
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0], paid.transaction);
        assert!(ledger.iter().all(|t| t.emi_id == ours[0].id || t.emi_id == ours[1].id));

        assert_eq!(get_transactions_by_loan_id(&db, other_loan.id).await?.len(), 1);
        assert_eq!(get_transactions_by_emi_id(&db, ours[1].id).await?.len(), 1);
        assert_eq!(get_all_transactions(&db).await?.len(), 3);
        assert!(has_successful_transaction(&db, ours[0].id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_ledger() -> Result<()> {
        let (db, _borrower, _admin, loan) = setup_with_approved_loan().await?;

        assert!(get_transactions_by_loan_id(&db, loan.id).await?.is_empty());
        assert!(get_all_transactions(&db).await?.is_empty());
        Ok(())
    }
}
