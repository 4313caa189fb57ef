//! Domain module
//!
//! Core ledger types and business rules.

pub mod amount;
pub mod context;
pub mod error;
pub mod transaction;

pub use amount::{Amount, AmountError, Balance};
pub use context::OperationContext;
pub use error::LedgerError;
pub use transaction::{
    Account, AccountId, IdempotencyKey, OperationPage, PageRequest, Transaction,
    TransactionDraft, TransactionType, MAX_PAGE_LIMIT,
};
