//! Store module
//!
//! The single persistence capability the ledger depends on, with a
//! PostgreSQL implementation for production and an in-memory one for
//! deterministic tests.

mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, IdempotencyKey, LedgerError, OperationContext, PageRequest, Transaction,
    TransactionDraft,
};

pub use memory::{FailPoint, InMemoryStore};
pub use postgres::PgLedgerStore;

/// Persistence failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A transaction with this idempotency key was committed concurrently
    #[error("Idempotency key already exists: {0}")]
    DuplicateKey(Uuid),

    /// A stored row could not be mapped back into a domain value
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error("Store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Check if this error is a uniqueness conflict on the idempotency key
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey(_))
    }
}

/// Ledger persistence capability.
///
/// `deposit` and `transfer` each run as one atomic unit: the pending record,
/// the row locks, the balance changes and the finalization commit together
/// or not at all.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Check whether an account exists
    async fn account_exists(
        &self,
        account_id: AccountId,
        ctx: &OperationContext,
    ) -> Result<bool, StoreError>;

    /// Read an account with its current balance
    async fn get_account(
        &self,
        account_id: AccountId,
        ctx: &OperationContext,
    ) -> Result<Option<Account>, StoreError>;

    /// Check whether a transaction with this key has been committed
    async fn idempotency_key_exists(
        &self,
        key: &IdempotencyKey,
        ctx: &OperationContext,
    ) -> Result<bool, StoreError>;

    /// Fetch a committed transaction by its idempotency key
    async fn get_transaction(
        &self,
        key: &IdempotencyKey,
        ctx: &OperationContext,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Credit one account and record the deposit
    async fn deposit(
        &self,
        draft: TransactionDraft,
        ctx: &OperationContext,
    ) -> Result<Transaction, LedgerError>;

    /// Move funds between two accounts and record the transfer
    async fn transfer(
        &self,
        draft: TransactionDraft,
        ctx: &OperationContext,
    ) -> Result<Transaction, LedgerError>;

    /// Transactions involving the account, newest first
    async fn list_operations(
        &self,
        account_id: AccountId,
        page: PageRequest,
        ctx: &OperationContext,
    ) -> Result<Vec<Transaction>, StoreError>;
}
