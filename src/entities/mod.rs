//! Entity module - Contains all SeaORM entity definitions for the ledger store.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod emi;
pub mod loan;
pub mod transaction;
pub mod user;

// Re-export specific types to avoid conflicts
pub use emi::{Column as EmiColumn, Entity as Emi, Model as EmiModel};
pub use loan::{Column as LoanColumn, Entity as Loan, Model as LoanModel};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
