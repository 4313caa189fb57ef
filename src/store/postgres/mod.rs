//! PostgreSQL ledger store
//!
//! Each mutation is one database transaction. Rows are locked with
//! `SELECT ... FOR UPDATE` in ascending account-id order so that opposite
//! transfers between the same pair of accounts cannot deadlock.
//!
//! The pending record is inserted only after the row locks are held. Its
//! foreign keys take `FOR KEY SHARE` locks on the referenced `users` rows,
//! which would otherwise be held ahead of the `FOR UPDATE` locks and
//! deadlock two units touching the same account.

pub mod history;
pub mod ledger;
pub mod recorder;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::Instrument;

use crate::domain::{
    Account, AccountId, Balance, IdempotencyKey, LedgerError, OperationContext, PageRequest,
    Transaction, TransactionDraft, TransactionType,
};

use super::{LedgerStore, StoreError};

/// PostgreSQL-backed ledger store
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Create a new PgLedgerStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn account_exists(
        &self,
        account_id: AccountId,
        _ctx: &OperationContext,
    ) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn get_account(
        &self,
        account_id: AccountId,
        _ctx: &OperationContext,
    ) -> Result<Option<Account>, StoreError> {
        let row: Option<(i64, String, i64)> =
            sqlx::query_as("SELECT id, name, balance FROM users WHERE id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(id, name, balance)| {
            let balance = Balance::new(balance)
                .map_err(|e| StoreError::CorruptRow(format!("account {}: {}", id, e)))?;
            Ok(Account { id, name, balance })
        })
        .transpose()
    }

    async fn idempotency_key_exists(
        &self,
        key: &IdempotencyKey,
        _ctx: &OperationContext,
    ) -> Result<bool, StoreError> {
        recorder::exists(&self.pool, key).await
    }

    async fn get_transaction(
        &self,
        key: &IdempotencyKey,
        _ctx: &OperationContext,
    ) -> Result<Option<Transaction>, StoreError> {
        recorder::get(&self.pool, key).await
    }

    // =========================================================================
    // deposit
    // =========================================================================

    async fn deposit(
        &self,
        draft: TransactionDraft,
        ctx: &OperationContext,
    ) -> Result<Transaction, LedgerError> {
        if draft.kind != TransactionType::Deposit {
            return Err(LedgerError::validation("deposit requires a deposit draft"));
        }

        async move {
            let mut tx = self.pool.begin().await?;

            let account = ledger::lock_account(&mut tx, draft.sender_id)
                .await?
                .ok_or_else(|| LedgerError::account_not_found(draft.sender_id))?;

            recorder::create(&mut tx, &draft).await?;

            account.balance.credit(&draft.amount)?;
            let balance =
                ledger::apply_delta(&mut tx, account.id, draft.amount.minor_units()).await?;

            let record = recorder::finalize(&mut tx, &draft.idempotency_key, true, None).await?;

            if let Err(e) = tx.commit().await {
                tracing::error!(error = %e, "failed to commit deposit");
                return Err(e.into());
            }

            tracing::info!(
                transaction_id = record.id,
                account_id = account.id,
                amount = %draft.amount,
                balance,
                "deposit committed"
            );
            Ok(record)
        }
        .instrument(ctx.span("store.deposit"))
        .await
    }

    // =========================================================================
    // transfer
    // =========================================================================

    async fn transfer(
        &self,
        draft: TransactionDraft,
        ctx: &OperationContext,
    ) -> Result<Transaction, LedgerError> {
        let receiver_id = match (draft.kind, draft.receiver_id) {
            (TransactionType::Transfer, Some(receiver_id)) => receiver_id,
            _ => return Err(LedgerError::validation("transfer requires a receiver")),
        };
        if receiver_id == draft.sender_id {
            return Err(LedgerError::validation("sender and receiver must differ"));
        }

        async move {
            let amount = draft.amount;
            let mut tx = self.pool.begin().await?;

            // Lock in ascending id order regardless of sender/receiver roles
            let mut sender = None;
            let mut receiver = None;
            for account_id in draft.lock_order() {
                let account = ledger::lock_account(&mut tx, account_id)
                    .await?
                    .ok_or_else(|| LedgerError::account_not_found(account_id))?;
                tracing::debug!(account_id, "row lock acquired");

                if account_id == draft.sender_id {
                    sender = Some(account);
                } else {
                    receiver = Some(account);
                }
            }
            let (sender, receiver) = match (sender, receiver) {
                (Some(s), Some(r)) => (s, r),
                _ => return Err(LedgerError::account_not_found(receiver_id)),
            };

            recorder::create(&mut tx, &draft).await?;

            if !sender.balance.is_sufficient_for(&amount) {
                tracing::warn!(
                    sender_id = sender.id,
                    balance = %sender.balance,
                    amount = %amount,
                    "insufficient account balance"
                );
                tx.rollback().await?;
                return Err(LedgerError::insufficient_funds(
                    amount.minor_units(),
                    sender.balance.minor_units(),
                ));
            }

            receiver.balance.credit(&amount)?;

            let sender_after = ledger::apply_delta(&mut tx, sender.id, -amount.minor_units()).await?;
            let receiver_after =
                ledger::apply_delta(&mut tx, receiver.id, amount.minor_units()).await?;

            if sender_after < 0 {
                tracing::error!(
                    sender_id = sender.id,
                    before = sender.balance.minor_units(),
                    after = sender_after,
                    amount = amount.minor_units(),
                    "INVARIANT VIOLATION: sender balance negative after debit"
                );
                tx.rollback().await?;
                return Err(LedgerError::InvariantViolation(format!(
                    "sender {} balance {} after debit",
                    sender.id, sender_after
                )));
            }

            let record = recorder::finalize(
                &mut tx,
                &draft.idempotency_key,
                true,
                Some((sender.name.as_str(), receiver.name.as_str())),
            )
            .await?;

            if let Err(e) = tx.commit().await {
                tracing::error!(error = %e, "failed to commit transfer");
                return Err(e.into());
            }

            tracing::info!(
                transaction_id = record.id,
                sender_id = sender.id,
                receiver_id = receiver.id,
                amount = %amount,
                sender_balance = sender_after,
                receiver_balance = receiver_after,
                "transfer committed"
            );
            Ok(record)
        }
        .instrument(ctx.span("store.transfer"))
        .await
    }

    async fn list_operations(
        &self,
        account_id: AccountId,
        page: PageRequest,
        ctx: &OperationContext,
    ) -> Result<Vec<Transaction>, StoreError> {
        history::list(&self.pool, account_id, page)
            .instrument(ctx.span("store.list_operations"))
            .await
    }
}
