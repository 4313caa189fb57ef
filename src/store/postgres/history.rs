//! Operation History Reader (SQL side)

use sqlx::PgPool;

use crate::domain::{AccountId, PageRequest, Transaction};
use crate::store::StoreError;

use super::recorder::{into_transaction, TransactionRow};

/// Transactions where the account is sender or receiver, newest first
pub async fn list(
    pool: &PgPool,
    account_id: AccountId,
    page: PageRequest,
) -> Result<Vec<Transaction>, StoreError> {
    let rows: Vec<TransactionRow> = sqlx::query_as(
        r#"
        SELECT id, idempotency_key, type_operation, sender_id, receiver_id,
               amount, success, sender_name, receiver_name, date_operation
        FROM transactions
        WHERE sender_id = $1 OR receiver_id = $1
        ORDER BY date_operation DESC, id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(account_id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(into_transaction).collect()
}
