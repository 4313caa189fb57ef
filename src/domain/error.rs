//! Ledger Error Types
//!
//! The error taxonomy surfaced by every core ledger operation.

use thiserror::Error;

use crate::store::StoreError;

use super::AmountError;

/// Errors produced by deposits, transfers and history reads.
///
/// Every variant is returned only after the in-flight unit of work (if any)
/// has been rolled back; `Validation` is raised before one is opened.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed input or a request that can never succeed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Account (or an expected transaction) is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Sender balance does not cover the amount
    #[error("Insufficient funds: required {required}, available {available} (minor units)")]
    InsufficientFunds { required: i64, available: i64 },

    /// A post-condition that should be unreachable failed
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The caller-supplied deadline expired mid-operation
    #[error("Operation timed out")]
    Timeout,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn account_not_found(account_id: i64) -> Self {
        Self::NotFound(format!("account {}", account_id))
    }

    pub fn insufficient_funds(required: i64, available: i64) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }

    /// Check if this is a client error (caller's input or business rule)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound(_) | Self::InsufficientFunds { .. }
        )
    }

    /// Check if this error signals a defect that must be escalated
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(StoreError::Database(err))
    }
}

impl From<AmountError> for LedgerError {
    fn from(err: AmountError) -> Self {
        match err {
            AmountError::NegativeBalance(value) => {
                Self::InvariantViolation(format!("balance would become {}", value))
            }
            other => Self::Validation(other.to_string()),
        }
    }
}
