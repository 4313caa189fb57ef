//! Transfer Handler
//!
//! Orchestrates a transfer: guard lookup, validation, existence checks,
//! then one atomic unit in the store.

use std::sync::Arc;

use tracing::Instrument;

use crate::domain::{Amount, LedgerError, OperationContext, Transaction, TransactionDraft};
use crate::idempotency::{IdempotencyCheck, IdempotencyGuard};
use crate::store::LedgerStore;

use super::TransferCommand;

/// Handler for transfers between accounts
pub struct TransferHandler {
    store: Arc<dyn LedgerStore>,
    guard: IdempotencyGuard,
}

impl TransferHandler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            guard: IdempotencyGuard::new(store.clone()),
            store,
        }
    }

    /// Execute the transfer command within the context deadline
    pub async fn execute(
        &self,
        command: TransferCommand,
        context: &OperationContext,
    ) -> Result<Transaction, LedgerError> {
        let amount = Amount::from_decimal(command.amount)?;

        context
            .within_deadline(self.apply(command, amount, context))
            .instrument(context.span("transfer"))
            .await
    }

    async fn apply(
        &self,
        command: TransferCommand,
        amount: Amount,
        context: &OperationContext,
    ) -> Result<Transaction, LedgerError> {
        let key = command.idempotency_key;

        if let IdempotencyCheck::Applied(existing) =
            self.guard.check_and_fetch(&key, context).await?
        {
            return Ok(existing);
        }

        if command.sender_id == command.receiver_id {
            return Err(LedgerError::validation(
                "Cannot transfer to the same account",
            ));
        }

        for account_id in [command.sender_id, command.receiver_id] {
            if !self.store.account_exists(account_id, context).await? {
                return Err(LedgerError::account_not_found(account_id));
            }
        }

        let draft = TransactionDraft::transfer(key, command.sender_id, command.receiver_id, amount);
        let result = self.store.transfer(draft, context).await;

        self.guard.resolve_race(&key, result, context).await
    }
}
