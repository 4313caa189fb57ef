//! Deposit Handler
//!
//! Credits a single account through the idempotency guard.

use std::sync::Arc;

use tracing::Instrument;

use crate::domain::{Amount, LedgerError, OperationContext, Transaction, TransactionDraft};
use crate::idempotency::{IdempotencyCheck, IdempotencyGuard};
use crate::store::LedgerStore;

use super::DepositCommand;

/// Handler for deposits
pub struct DepositHandler {
    store: Arc<dyn LedgerStore>,
    guard: IdempotencyGuard,
}

impl DepositHandler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            guard: IdempotencyGuard::new(store.clone()),
            store,
        }
    }

    /// Execute the deposit command within the context deadline
    pub async fn execute(
        &self,
        command: DepositCommand,
        context: &OperationContext,
    ) -> Result<Transaction, LedgerError> {
        let amount = Amount::from_decimal(command.amount)?;

        context
            .within_deadline(self.apply(command, amount, context))
            .instrument(context.span("deposit"))
            .await
    }

    async fn apply(
        &self,
        command: DepositCommand,
        amount: Amount,
        context: &OperationContext,
    ) -> Result<Transaction, LedgerError> {
        let key = command.idempotency_key;

        if let IdempotencyCheck::Applied(existing) =
            self.guard.check_and_fetch(&key, context).await?
        {
            return Ok(existing);
        }

        if !self.store.account_exists(command.account_id, context).await? {
            return Err(LedgerError::account_not_found(command.account_id));
        }

        let draft = TransactionDraft::deposit(key, command.account_id, amount);
        let result = self.store.deposit(draft, context).await;

        self.guard.resolve_race(&key, result, context).await
    }
}
