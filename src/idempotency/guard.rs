//! Idempotency Guard
//!
//! Decides whether a request key has already been applied. The backing
//! check is the uniqueness of `idempotency_key` on stored transactions, so
//! there is no separate key table to keep in sync.

use std::sync::Arc;

use crate::domain::{IdempotencyKey, LedgerError, OperationContext, Transaction};
use crate::store::LedgerStore;

/// Outcome of a guard lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyCheck {
    /// Key never seen; the caller should apply the request
    Fresh,
    /// Key already applied; return this transaction verbatim
    Applied(Transaction),
}

impl IdempotencyCheck {
    pub fn already_applied(&self) -> bool {
        matches!(self, IdempotencyCheck::Applied(_))
    }
}

/// Guard in front of every mutating ledger operation
#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn LedgerStore>,
}

impl IdempotencyGuard {
    /// Create a new IdempotencyGuard
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    // =========================================================================
    // check_and_fetch
    // =========================================================================

    /// Look up `key` and, on a hit, fetch the transaction it produced.
    ///
    /// Runs before any row lock is taken.
    pub async fn check_and_fetch(
        &self,
        key: &IdempotencyKey,
        ctx: &OperationContext,
    ) -> Result<IdempotencyCheck, LedgerError> {
        if !self.store.idempotency_key_exists(key, ctx).await? {
            return Ok(IdempotencyCheck::Fresh);
        }

        let existing = self
            .store
            .get_transaction(key, ctx)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("transaction for key {}", key)))?;

        tracing::info!(
            idempotency_key = %key,
            transaction_id = existing.id,
            "idempotency key already applied, returning stored transaction"
        );
        Ok(IdempotencyCheck::Applied(existing))
    }

    /// Settle a lost race on the same key.
    ///
    /// When the store reports `DuplicateKey`, a concurrent request with the
    /// same key committed first; its transaction is returned instead of the
    /// error. Any other outcome passes through untouched.
    pub async fn resolve_race(
        &self,
        key: &IdempotencyKey,
        result: Result<Transaction, LedgerError>,
        ctx: &OperationContext,
    ) -> Result<Transaction, LedgerError> {
        match result {
            Err(LedgerError::Store(e)) if e.is_duplicate_key() => {
                tracing::info!(idempotency_key = %key, "concurrent request won the key, replaying");
                match self.check_and_fetch(key, ctx).await? {
                    IdempotencyCheck::Applied(existing) => Ok(existing),
                    IdempotencyCheck::Fresh => Err(LedgerError::Store(e)),
                }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Amount, TransactionDraft};
    use crate::store::{InMemoryStore, StoreError};
    use uuid::Uuid;

    fn setup() -> (Arc<InMemoryStore>, IdempotencyGuard) {
        let store = Arc::new(InMemoryStore::new().with_account(1, "Alice", 0));
        let guard = IdempotencyGuard::new(store.clone());
        (store, guard)
    }

    #[tokio::test]
    async fn test_fresh_key() {
        let (_store, guard) = setup();
        let key = IdempotencyKey::new(Uuid::new_v4());

        let check = guard
            .check_and_fetch(&key, &OperationContext::new())
            .await
            .unwrap();
        assert_eq!(check, IdempotencyCheck::Fresh);
        assert!(!check.already_applied());
    }

    #[tokio::test]
    async fn test_applied_key_returns_transaction() {
        let (store, guard) = setup();
        let ctx = OperationContext::new();
        let key = IdempotencyKey::new(Uuid::new_v4());
        let amount = Amount::from_minor_units(100).unwrap();

        let tx = store
            .deposit(TransactionDraft::deposit(key, 1, amount), &ctx)
            .await
            .unwrap();

        match guard.check_and_fetch(&key, &ctx).await.unwrap() {
            IdempotencyCheck::Applied(existing) => assert_eq!(existing, tx),
            IdempotencyCheck::Fresh => panic!("expected applied key"),
        }
    }

    #[tokio::test]
    async fn test_resolve_race_replays_winner() {
        let (store, guard) = setup();
        let ctx = OperationContext::new();
        let key = IdempotencyKey::new(Uuid::new_v4());
        let amount = Amount::from_minor_units(100).unwrap();

        let winner = store
            .deposit(TransactionDraft::deposit(key, 1, amount), &ctx)
            .await
            .unwrap();
        let lost: Result<Transaction, LedgerError> = Err(StoreError::DuplicateKey(key.as_uuid()).into());

        let resolved = guard.resolve_race(&key, lost, &ctx).await.unwrap();
        assert_eq!(resolved, winner);
    }

    #[tokio::test]
    async fn test_resolve_race_passes_other_errors() {
        let (_store, guard) = setup();
        let key = IdempotencyKey::new(Uuid::new_v4());

        let result = guard
            .resolve_race(
                &key,
                Err(LedgerError::insufficient_funds(100, 0)),
                &OperationContext::new(),
            )
            .await;
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
    }
}
