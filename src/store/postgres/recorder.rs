//! Transaction Recorder
//!
//! Creates, finalizes and looks up rows of the `transactions` table.
//! `create` and `finalize` run on the caller's database transaction so the
//! record shares the fate of the balance change it documents.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction as DbTransaction};
use uuid::Uuid;

use crate::domain::{Amount, IdempotencyKey, LedgerError, Transaction, TransactionDraft};
use crate::store::StoreError;

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Raw `transactions` row as selected by this module
pub(super) type TransactionRow = (
    i64,
    Uuid,
    String,
    i64,
    Option<i64>,
    i64,
    bool,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
);

/// Map a selected row back into a domain transaction
pub(super) fn into_transaction(row: TransactionRow) -> Result<Transaction, StoreError> {
    let (
        id,
        idempotency_key,
        type_operation,
        sender_id,
        receiver_id,
        amount,
        success,
        sender_name,
        receiver_name,
        created_at,
    ) = row;

    let kind = type_operation
        .parse()
        .map_err(|e: String| StoreError::CorruptRow(format!("transaction {}: {}", id, e)))?;
    let amount = Amount::from_minor_units(amount)
        .map_err(|e| StoreError::CorruptRow(format!("transaction {}: {}", id, e)))?;

    Ok(Transaction {
        id,
        idempotency_key: IdempotencyKey::new(idempotency_key),
        kind,
        sender_id,
        receiver_id,
        amount,
        success,
        sender_name,
        receiver_name,
        created_at,
    })
}

pub(super) fn is_sqlstate(err: &sqlx::Error, code: &str) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(code))
}

// =========================================================================
// create
// =========================================================================

/// Insert a pending record and return it with its id and timestamp
pub async fn create(
    tx: &mut DbTransaction<'_, Postgres>,
    draft: &TransactionDraft,
) -> Result<Transaction, StoreError> {
    let key = draft.idempotency_key;

    let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
        r#"
        INSERT INTO transactions
            (idempotency_key, type_operation, sender_id, receiver_id, amount)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, date_operation
        "#,
    )
    .bind(key.as_uuid())
    .bind(draft.kind.as_str())
    .bind(draft.sender_id)
    .bind(draft.receiver_id)
    .bind(draft.amount.minor_units())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| {
        if is_sqlstate(&e, UNIQUE_VIOLATION) {
            StoreError::DuplicateKey(key.as_uuid())
        } else {
            StoreError::Database(e)
        }
    })?;

    tracing::debug!(transaction_id = id, idempotency_key = %key, "pending transaction created");

    Ok(Transaction::pending(draft, id, created_at))
}

// =========================================================================
// finalize
// =========================================================================

/// Set the terminal success flag (once) and attach display names
pub async fn finalize(
    tx: &mut DbTransaction<'_, Postgres>,
    key: &IdempotencyKey,
    success: bool,
    names: Option<(&str, &str)>,
) -> Result<Transaction, LedgerError> {
    let (sender_name, receiver_name) = names.unzip();

    let row: Option<TransactionRow> = sqlx::query_as(
        r#"
        UPDATE transactions
        SET success = $2, sender_name = $3, receiver_name = $4
        WHERE idempotency_key = $1 AND success = false
        RETURNING id, idempotency_key, type_operation, sender_id, receiver_id,
                  amount, success, sender_name, receiver_name, date_operation
        "#,
    )
    .bind(key.as_uuid())
    .bind(success)
    .bind(sender_name)
    .bind(receiver_name)
    .fetch_optional(&mut **tx)
    .await?;

    let row = row
        .ok_or_else(|| LedgerError::NotFound(format!("pending transaction for key {}", key)))?;

    Ok(into_transaction(row)?)
}

// =========================================================================
// get / exists
// =========================================================================

/// Fetch a committed transaction by idempotency key
pub async fn get(pool: &PgPool, key: &IdempotencyKey) -> Result<Option<Transaction>, StoreError> {
    let row: Option<TransactionRow> = sqlx::query_as(
        r#"
        SELECT id, idempotency_key, type_operation, sender_id, receiver_id,
               amount, success, sender_name, receiver_name, date_operation
        FROM transactions
        WHERE idempotency_key = $1
        "#,
    )
    .bind(key.as_uuid())
    .fetch_optional(pool)
    .await?;

    row.map(into_transaction).transpose()
}

/// Check whether a transaction with this key exists
pub async fn exists(pool: &PgPool, key: &IdempotencyKey) -> Result<bool, StoreError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM transactions WHERE idempotency_key = $1)",
    )
    .bind(key.as_uuid())
    .fetch_one(pool)
    .await?;

    Ok(exists)
}
