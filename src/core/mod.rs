/// EMI amount, total repayable and due-date schedule calculations
pub mod amortization;

/// EMI creation, payment and queries
pub mod emi;

/// Caller identity passed into every ledger operation
pub mod identity;

/// Loan application, approval and loan queries
pub mod loan;

/// Per-loan repayment statements
pub mod report;

/// Ledger transactions recorded against EMIs
pub mod transaction;

/// User lookups and seeding
pub mod user;
