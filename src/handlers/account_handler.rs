//! Account lookup

use std::sync::Arc;

use crate::domain::{Account, AccountId, LedgerError, OperationContext};
use crate::store::LedgerStore;

/// Handler for reading a single account
pub struct GetAccountHandler {
    store: Arc<dyn LedgerStore>,
}

impl GetAccountHandler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        account_id: AccountId,
        context: &OperationContext,
    ) -> Result<Account, LedgerError> {
        context
            .within_deadline(async {
                self.store
                    .get_account(account_id, context)
                    .await?
                    .ok_or_else(|| LedgerError::account_not_found(account_id))
            })
            .await
    }
}
