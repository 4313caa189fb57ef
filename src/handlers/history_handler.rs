//! Operation History Handler
//!
//! Read path: bypasses the guard and never opens an atomic unit.

use std::sync::Arc;

use tracing::Instrument;

use crate::domain::{LedgerError, OperationContext, OperationPage, PageRequest};
use crate::store::LedgerStore;

use super::ListOperationsQuery;

/// Handler for paginated history reads
pub struct ListOperationsHandler {
    store: Arc<dyn LedgerStore>,
}

impl ListOperationsHandler {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Newest-first page of the account's operations.
    /// An existing account without history yields an empty page.
    pub async fn execute(
        &self,
        query: ListOperationsQuery,
        context: &OperationContext,
    ) -> Result<OperationPage, LedgerError> {
        let page = PageRequest::new(query.limit, query.offset)?;

        context
            .within_deadline(async {
                if !self.store.account_exists(query.account_id, context).await? {
                    return Err(LedgerError::account_not_found(query.account_id));
                }

                let operations = self
                    .store
                    .list_operations(query.account_id, page, context)
                    .await?;

                tracing::debug!(
                    account_id = query.account_id,
                    limit = page.limit,
                    offset = page.offset,
                    count = operations.len(),
                    "operations listed"
                );

                Ok(OperationPage {
                    account_id: query.account_id,
                    limit: page.limit,
                    offset: page.offset,
                    operations,
                })
            })
            .instrument(context.span("list_operations"))
            .await
    }
}
