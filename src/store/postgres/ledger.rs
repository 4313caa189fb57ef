//! Balance Ledger
//!
//! Row-locking and balance mutation on the `users` table. Every function
//! here runs on the caller's database transaction.

use sqlx::{Postgres, Transaction as DbTransaction};

use crate::domain::{Account, AccountId, Balance, LedgerError};
use crate::store::StoreError;

use super::recorder::is_sqlstate;

/// Postgres SQLSTATE for check_violation (`balance >= 0`)
const CHECK_VIOLATION: &str = "23514";

/// Take an exclusive row lock on the account and read it.
/// Returns `None` when the account does not exist.
pub async fn lock_account(
    tx: &mut DbTransaction<'_, Postgres>,
    account_id: AccountId,
) -> Result<Option<Account>, StoreError> {
    let row: Option<(i64, String, i64)> = sqlx::query_as(
        r#"
        SELECT id, name, balance
        FROM users
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(account_id)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(|(id, name, balance)| {
        let balance = Balance::new(balance)
            .map_err(|e| StoreError::CorruptRow(format!("account {}: {}", id, e)))?;
        Ok(Account { id, name, balance })
    })
    .transpose()
}

/// Add `delta` minor units to a locked account and return the new raw balance.
///
/// The raw value is returned unchecked so callers can run their own
/// post-condition check on it.
pub async fn apply_delta(
    tx: &mut DbTransaction<'_, Postgres>,
    account_id: AccountId,
    delta: i64,
) -> Result<i64, LedgerError> {
    let balance: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE users
        SET balance = balance + $2
        WHERE id = $1
        RETURNING balance
        "#,
    )
    .bind(account_id)
    .bind(delta)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| {
        if is_sqlstate(&e, CHECK_VIOLATION) {
            tracing::error!(
                account_id,
                delta,
                error = %e,
                "INVARIANT VIOLATION: balance check constraint rejected update"
            );
            LedgerError::InvariantViolation(format!(
                "balance of account {} would become negative",
                account_id
            ))
        } else {
            LedgerError::from(e)
        }
    })?;

    balance.ok_or_else(|| LedgerError::account_not_found(account_id))
}
