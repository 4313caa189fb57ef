//! In-memory ledger store
//!
//! Deterministic `LedgerStore` used by handler and API tests. Atomic units
//! are emulated with per-account async row locks taken in ascending id order
//! and balance changes staged locally until commit. Dropping a unit before
//! commit leaves no trace.
//!
//! Fail points let tests force a failure at a given step of a unit.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::Instrument;

use crate::domain::{
    Account, AccountId, Balance, IdempotencyKey, LedgerError, OperationContext, PageRequest,
    Transaction, TransactionDraft, TransactionType,
};

use super::{LedgerStore, StoreError};

/// Step of an atomic unit at which an injected failure fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// Creating the pending transaction record
    CreateRecord,
    /// Setting the success flag after balances were changed
    Finalize,
    /// Committing the unit
    Commit,
    /// Skip the sufficient-funds check so the post-debit invariant trips
    BypassFundsCheck,
}

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<AccountId, Account>,
    transactions: Vec<Transaction>,
}

/// In-memory ledger store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    row_locks: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
    next_id: AtomicI64,
    latency: Option<Duration>,
    fail_point: Mutex<Option<FailPoint>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account with a balance in minor units
    ///
    /// # Panics
    ///
    /// Panics if `balance` is negative.
    pub fn with_account(mut self, id: AccountId, name: &str, balance: i64) -> Self {
        let balance = Balance::new(balance).expect("seed balance must not be negative");
        self.state.get_mut().accounts.insert(
            id,
            Account {
                id,
                name: name.to_string(),
                balance,
            },
        );
        self
    }

    /// Sleep this long inside every unit, after the row locks are held
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Arm a fail point; it fires once, on the next unit that reaches it
    pub async fn fail_on(&self, point: FailPoint) {
        *self.fail_point.lock().await = Some(point);
    }

    /// Current balance in minor units, if the account exists
    pub async fn balance_of(&self, account_id: AccountId) -> Option<i64> {
        self.state
            .read()
            .await
            .accounts
            .get(&account_id)
            .map(|a| a.balance.minor_units())
    }

    /// Sum of all balances in minor units
    pub async fn total_balance(&self) -> i64 {
        self.state
            .read()
            .await
            .accounts
            .values()
            .map(|a| a.balance.minor_units())
            .sum()
    }

    /// Number of committed transaction records
    pub async fn transaction_count(&self) -> usize {
        self.state.read().await.transactions.len()
    }

    async fn take(&self, point: FailPoint) -> bool {
        let mut armed = self.fail_point.lock().await;
        if *armed == Some(point) {
            *armed = None;
            true
        } else {
            false
        }
    }

    async fn trip(&self, point: FailPoint) -> Result<(), StoreError> {
        if self.take(point).await {
            tracing::warn!(?point, "injected store failure");
            return Err(StoreError::Backend(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }

    /// Acquire row locks for `ids` (already in ascending order)
    async fn lock_rows(&self, ids: &[AccountId]) -> Vec<OwnedMutexGuard<()>> {
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            let lock = {
                let mut locks = self.row_locks.lock().await;
                locks.entry(*id).or_default().clone()
            };
            guards.push(lock.lock_owned().await);
            tracing::debug!(account_id = id, "row lock acquired");
        }
        guards
    }

    async fn read_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.state
            .read()
            .await
            .accounts
            .get(&account_id)
            .cloned()
            .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    async fn begin(&self, draft: &TransactionDraft) -> Result<Transaction, StoreError> {
        self.trip(FailPoint::CreateRecord).await?;

        let key = draft.idempotency_key;
        let state = self.state.read().await;
        if state.transactions.iter().any(|t| t.idempotency_key == key) {
            return Err(StoreError::DuplicateKey(key.as_uuid()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(transaction_id = id, idempotency_key = %key, "pending transaction created");
        Ok(Transaction::pending(draft, id, Utc::now()))
    }

    /// Apply staged balances and the finalized record in one step
    async fn commit(
        &self,
        record: Transaction,
        balances: &[(AccountId, Balance)],
    ) -> Result<Transaction, LedgerError> {
        self.trip(FailPoint::Commit).await?;

        let mut state = self.state.write().await;
        if state
            .transactions
            .iter()
            .any(|t| t.idempotency_key == record.idempotency_key)
        {
            return Err(StoreError::DuplicateKey(record.idempotency_key.as_uuid()).into());
        }

        for (account_id, balance) in balances {
            let account = state
                .accounts
                .get_mut(account_id)
                .ok_or_else(|| LedgerError::account_not_found(*account_id))?;
            account.balance = *balance;
        }
        state.transactions.push(record.clone());

        Ok(record)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn account_exists(
        &self,
        account_id: AccountId,
        _ctx: &OperationContext,
    ) -> Result<bool, StoreError> {
        Ok(self.state.read().await.accounts.contains_key(&account_id))
    }

    async fn get_account(
        &self,
        account_id: AccountId,
        _ctx: &OperationContext,
    ) -> Result<Option<Account>, StoreError> {
        Ok(self.state.read().await.accounts.get(&account_id).cloned())
    }

    async fn idempotency_key_exists(
        &self,
        key: &IdempotencyKey,
        _ctx: &OperationContext,
    ) -> Result<bool, StoreError> {
        let state = self.state.read().await;
        Ok(state.transactions.iter().any(|t| t.idempotency_key == *key))
    }

    async fn get_transaction(
        &self,
        key: &IdempotencyKey,
        _ctx: &OperationContext,
    ) -> Result<Option<Transaction>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .iter()
            .find(|t| t.idempotency_key == *key)
            .cloned())
    }

    async fn deposit(
        &self,
        draft: TransactionDraft,
        ctx: &OperationContext,
    ) -> Result<Transaction, LedgerError> {
        if draft.kind != TransactionType::Deposit {
            return Err(LedgerError::validation("deposit requires a deposit draft"));
        }

        async move {
            let _rows = self.lock_rows(&draft.lock_order()).await;
            let pending = self.begin(&draft).await?;
            self.simulate_latency().await;

            let account = self.read_account(draft.sender_id).await?;
            let balance = account.balance.credit(&draft.amount)?;

            self.trip(FailPoint::Finalize).await?;
            let record = Transaction {
                success: true,
                ..pending
            };

            let record = self.commit(record, &[(account.id, balance)]).await?;
            tracing::info!(
                transaction_id = record.id,
                account_id = account.id,
                amount = %draft.amount,
                balance = balance.minor_units(),
                "deposit committed"
            );
            Ok(record)
        }
        .instrument(ctx.span("store.deposit"))
        .await
    }

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
            let _rows = self.lock_rows(&draft.lock_order()).await;
            let pending = self.begin(&draft).await?;
            self.simulate_latency().await;

            let sender = self.read_account(draft.sender_id).await?;
            let receiver = self.read_account(receiver_id).await?;

            let bypass = self.take(FailPoint::BypassFundsCheck).await;
            if !bypass && !sender.balance.is_sufficient_for(&amount) {
                tracing::warn!(
                    sender_id = sender.id,
                    balance = %sender.balance,
                    amount = %amount,
                    "insufficient account balance"
                );
                return Err(LedgerError::insufficient_funds(
                    amount.minor_units(),
                    sender.balance.minor_units(),
                ));
            }

            let sender_after = sender.balance.minor_units() - amount.minor_units();
            if sender_after < 0 {
                tracing::error!(
                    sender_id = sender.id,
                    before = sender.balance.minor_units(),
                    after = sender_after,
                    amount = amount.minor_units(),
                    "INVARIANT VIOLATION: sender balance negative after debit"
                );
                return Err(LedgerError::InvariantViolation(format!(
                    "sender {} balance {} after debit",
                    sender.id, sender_after
                )));
            }
            let sender_balance = sender.balance.debit(&amount)?;
            let receiver_balance = receiver.balance.credit(&amount)?;

            self.trip(FailPoint::Finalize).await?;
            let record = Transaction {
                success: true,
                sender_name: Some(sender.name.clone()),
                receiver_name: Some(receiver.name.clone()),
                ..pending
            };

            let record = self
                .commit(
                    record,
                    &[(sender.id, sender_balance), (receiver.id, receiver_balance)],
                )
                .await?;
            tracing::info!(
                transaction_id = record.id,
                sender_id = sender.id,
                receiver_id = receiver.id,
                amount = %amount,
                sender_balance = sender_balance.minor_units(),
                receiver_balance = receiver_balance.minor_units(),
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
        _ctx: &OperationContext,
    ) -> Result<Vec<Transaction>, StoreError> {
        let state = self.state.read().await;
        let mut operations: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| t.involves(account_id))
            .cloned()
            .collect();
        operations.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        Ok(operations
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }
}
