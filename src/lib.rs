//! wallet_ledger Library
//!
//! Idempotent deposit/transfer ledger with paginated operation history.
//! Re-exports modules for integration testing and external use.

pub mod api;
pub mod domain;
pub mod handlers;
pub mod idempotency;
pub mod store;

pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use domain::{
    Amount, AmountError, Balance, IdempotencyKey, LedgerError, OperationContext, Transaction,
};
pub use error::{AppError, AppResult};
pub use store::{InMemoryStore, LedgerStore, PgLedgerStore, StoreError};
